//! Archive Writer Port - analytics row for a finished conversation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserKey};
use crate::domain::intake::{transcript, ConversationRecord, Judgement};

/// One archived conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRow {
    /// `"{user_key}-{unix_millis}"`.
    pub conversation_id: String,
    pub user_key: String,
    pub created_at: Timestamp,
    /// Possibility label, e.g. `있음`.
    pub final_judgement: String,
    pub judgement_reason: String,
    /// Extracted data as a JSON document.
    pub extracted_entities: String,
    /// History rendered as `사용자: …` / `챗봇: …` lines.
    pub raw_conversation: String,
}

impl ArchiveRow {
    /// Builds the row for a record about to be deleted.
    pub fn from_record(
        record: &ConversationRecord,
        judgement: &Judgement,
        archived_at: Timestamp,
    ) -> Result<Self, ArchiveError> {
        let extracted_entities = serde_json::to_string(&record.extracted_data)
            .map_err(|e| ArchiveError::Serialization(e.to_string()))?;

        Ok(Self {
            conversation_id: format!("{}-{}", record.user_key, archived_at.as_unix_millis()),
            user_key: record.user_key.to_string(),
            created_at: archived_at,
            final_judgement: judgement.possibility.label().to_string(),
            judgement_reason: judgement.reason.clone(),
            extracted_entities,
            raw_conversation: transcript(&record.history),
        })
    }

    pub fn user_key(&self) -> Option<UserKey> {
        UserKey::new(self.user_key.clone()).ok()
    }
}

/// Archive errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to serialize archive row: {0}")]
    Serialization(String),

    #[error("archive backend error: {0}")]
    Backend(String),
}

/// Port for the analytics warehouse.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    async fn insert(&self, row: &ArchiveRow) -> Result<(), ArchiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intake::{
        judge, ExtractedData, IntakeState, RecordPatch, SymptomField, SymptomValue, Turn,
    };

    #[test]
    fn row_carries_judgement_and_transcript() {
        let key = UserKey::new("kakao-7").unwrap();
        let mut record = ConversationRecord::new(key);
        let data = ExtractedData::empty().with(SymptomField::Fever, SymptomValue::Yes);
        record.apply(
            &RecordPatch::new()
                .with_state(IntakeState::PostAnalysis)
                .append(Turn::user("열이 나요"))
                .append(Turn::bot("언제부터요?"))
                .with_extracted_data(data.clone()),
        );
        let judgement = judge(&data);
        let at = Timestamp::now();

        let row = ArchiveRow::from_record(&record, &judgement, at).unwrap();

        assert_eq!(row.conversation_id, format!("kakao-7-{}", at.as_unix_millis()));
        assert_eq!(row.final_judgement, "낮음");
        assert_eq!(row.judgement_reason, judgement.reason);
        assert_eq!(row.raw_conversation, "사용자: 열이 나요\n챗봇: 언제부터요?");
        assert!(row.extracted_entities.contains("\"발열\":\"Y\""));
        assert_eq!(row.user_key().unwrap().as_str(), "kakao-7");
    }
}
