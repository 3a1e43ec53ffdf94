//! Conversation record - one per user key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{StateMachine, Timestamp, UserKey, ValidationError};

use super::judgement::Judgement;
use super::state::IntakeState;
use super::symptoms::ExtractedData;

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

impl Speaker {
    /// Transcript prefix, as shown to the model and archived.
    pub fn prefix(&self) -> &'static str {
        match self {
            Speaker::User => "사용자",
            Speaker::Bot => "챗봇",
        }
    }
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Bot,
            text: text.into(),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker.prefix(), self.text)
    }
}

/// Renders a history as newline-joined transcript lines.
pub fn transcript(history: &[Turn]) -> String {
    history
        .iter()
        .map(Turn::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Persisted state of one user's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_key: UserKey,
    pub state: IntakeState,
    /// Append-only within a conversation.
    pub history: Vec<Turn>,
    pub extracted_data: ExtractedData,
    pub last_judgement: Option<Judgement>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ConversationRecord {
    /// The implicit record of a user we have never seen.
    pub fn new(user_key: UserKey) -> Self {
        let now = Timestamp::now();
        Self {
            user_key,
            state: IntakeState::Init,
            history: Vec::new(),
            extracted_data: ExtractedData::empty(),
            last_judgement: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update the same way every store does.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        self.history.extend(patch.append_turns.iter().cloned());
        if let Some(ref data) = patch.extracted_data {
            self.extracted_data = data.clone();
        }
        if let Some(ref judgement) = patch.last_judgement {
            self.last_judgement = Some(judgement.clone());
        }
        self.updated_at = Timestamp::now();
    }
}

/// Partial update of a conversation record.
///
/// Each write touches only the fields it carries. History is only ever
/// appended to, so a stale read followed by a write cannot drop turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub state: Option<IntakeState>,
    pub append_turns: Vec<Turn>,
    pub extracted_data: Option<ExtractedData>,
    pub last_judgement: Option<Judgement>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch moving a record from `from` to `to`.
    ///
    /// Refused when the state table has no such edge.
    pub fn transition(from: IntakeState, to: IntakeState) -> Result<Self, ValidationError> {
        Ok(Self::new().with_state(from.transition_to(to)?))
    }

    pub fn with_state(mut self, state: IntakeState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn append(mut self, turn: Turn) -> Self {
        self.append_turns.push(turn);
        self
    }

    pub fn with_extracted_data(mut self, data: ExtractedData) -> Self {
        self.extracted_data = Some(data);
        self
    }

    pub fn with_judgement(mut self, judgement: Judgement) -> Self {
        self.last_judgement = Some(judgement);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intake::symptoms::{SymptomField, SymptomValue};

    fn key() -> UserKey {
        UserKey::new("user-1").unwrap()
    }

    #[test]
    fn new_record_is_init_and_empty() {
        let record = ConversationRecord::new(key());
        assert_eq!(record.state, IntakeState::Init);
        assert!(record.history.is_empty());
        assert!(record.extracted_data.is_empty());
        assert!(record.last_judgement.is_none());
    }

    #[test]
    fn turn_renders_with_speaker_prefix() {
        assert_eq!(Turn::user("기침이 심해요").to_string(), "사용자: 기침이 심해요");
        assert_eq!(Turn::bot("언제부터요?").to_string(), "챗봇: 언제부터요?");
    }

    #[test]
    fn transcript_joins_lines() {
        let history = vec![Turn::user("a"), Turn::bot("b")];
        assert_eq!(transcript(&history), "사용자: a\n챗봇: b");
    }

    #[test]
    fn apply_touches_only_patched_fields() {
        let mut record = ConversationRecord::new(key());
        record.apply(
            &RecordPatch::new()
                .with_state(IntakeState::Collecting)
                .append(Turn::user("hi"))
                .with_extracted_data(
                    ExtractedData::empty().with(SymptomField::Fever, SymptomValue::No),
                ),
        );

        record.apply(&RecordPatch::new().with_state(IntakeState::ConfirmAnalysis));

        assert_eq!(record.state, IntakeState::ConfirmAnalysis);
        assert_eq!(record.history, vec![Turn::user("hi")]);
        assert!(record.extracted_data.get(SymptomField::Fever).is_some());
    }

    #[test]
    fn history_is_appended_in_order() {
        let mut record = ConversationRecord::new(key());
        record.apply(&RecordPatch::new().append(Turn::user("1")).append(Turn::bot("2")));
        record.apply(&RecordPatch::new().append(Turn::user("3")));

        let texts: Vec<_> = record.history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn transition_patch_follows_state_table() {
        let patch = RecordPatch::transition(IntakeState::Collecting, IntakeState::ConfirmAnalysis)
            .unwrap();
        assert_eq!(patch.state, Some(IntakeState::ConfirmAnalysis));
        assert!(patch.append_turns.is_empty());

        assert!(RecordPatch::transition(IntakeState::Init, IntakeState::PostAnalysis).is_err());
        assert!(RecordPatch::transition(IntakeState::PostAnalysis, IntakeState::ConfirmAnalysis)
            .is_err());
    }
}
