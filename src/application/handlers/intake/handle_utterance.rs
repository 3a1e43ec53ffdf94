//! HandleUtteranceHandler - the synchronous conversation state machine.
//!
//! One call per inbound utterance. Loads the record, dispatches on its
//! state tag, talks to the assistant at most once, writes one patch and
//! returns the reply for the platform.
//!
//! Failed turns persist nothing: a turn is written only after the
//! assistant produced its answer.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserKey, ValidationError};
use crate::domain::intake::prompts::{
    ANALYSIS_APOLOGY, CALLBACK_UNAVAILABLE_MESSAGE, CONFIRM_ANALYSIS_CHOICES,
    CONFIRM_ANALYSIS_MESSAGE, RESUME_COLLECTING_MESSAGE, STILL_ANALYZING_MESSAGE,
    TERMINATED_MESSAGE, TERMINATION_APOLOGY, TURN_APOLOGY,
};
use crate::domain::intake::{
    judge, ConversationRecord, ExtractedData, IntakeState, Intent, RecordPatch, Reply, Turn,
};
use crate::ports::{
    AnalysisJob, AnalysisQueue, ArchiveRow, ArchiveWriter, ConversationStore, IntakeAssistant,
    StoreError,
};

/// One inbound utterance.
#[derive(Debug, Clone)]
pub struct HandleUtteranceCommand {
    pub user_key: UserKey,
    pub utterance: String,
    /// Platform-supplied target for a deferred reply, when it offers one.
    pub callback_url: Option<String>,
}

/// Errors that abort a turn.
///
/// Collaborator failures the flow can recover from never surface here;
/// only storage failures and patches the state table refuses do.
#[derive(Debug, thiserror::Error)]
pub enum HandleUtteranceError {
    #[error("conversation store failure: {0}")]
    Store(#[from] StoreError),

    #[error("illegal state transition: {0}")]
    Transition(#[from] ValidationError),
}

/// Handler driving one conversation turn.
pub struct HandleUtteranceHandler {
    store: Arc<dyn ConversationStore>,
    assistant: Arc<dyn IntakeAssistant>,
    queue: Arc<dyn AnalysisQueue>,
    archive: Arc<dyn ArchiveWriter>,
}

impl HandleUtteranceHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        assistant: Arc<dyn IntakeAssistant>,
        queue: Arc<dyn AnalysisQueue>,
        archive: Arc<dyn ArchiveWriter>,
    ) -> Self {
        Self {
            store,
            assistant,
            queue,
            archive,
        }
    }

    pub async fn handle(&self, cmd: HandleUtteranceCommand) -> Result<Reply, HandleUtteranceError> {
        let record = self
            .store
            .get(&cmd.user_key)
            .await?
            .unwrap_or_else(|| ConversationRecord::new(cmd.user_key.clone()));

        tracing::info!(
            user_key = %cmd.user_key,
            state = %record.state,
            "handling utterance"
        );

        match record.state {
            IntakeState::Init => {
                self.continue_collecting(&record, &cmd.utterance, ExtractedData::empty())
                    .await
            }
            IntakeState::Collecting if Intent::RequestAnalysis.matches(&cmd.utterance) => {
                self.request_confirmation(&record).await
            }
            IntakeState::Collecting => {
                let data = record.extracted_data.clone();
                self.continue_collecting(&record, &cmd.utterance, data).await
            }
            IntakeState::ConfirmAnalysis if Intent::Affirm.matches(&cmd.utterance) => {
                self.dispatch_analysis(&record, cmd.callback_url.as_deref())
                    .await
            }
            IntakeState::ConfirmAnalysis => self.resume_collecting(&record, &cmd.utterance).await,
            IntakeState::Analyzing => Ok(Reply::text(STILL_ANALYZING_MESSAGE)),
            IntakeState::PostAnalysis if Intent::Terminate.matches(&cmd.utterance) => {
                self.terminate(&record).await
            }
            IntakeState::PostAnalysis => {
                let data = record.extracted_data.clone();
                self.continue_collecting(&record, &cmd.utterance, data).await
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Transitions
    // ════════════════════════════════════════════════════════════════════════

    /// Appends the user turn, asks the next question and moves to COLLECTING.
    async fn continue_collecting(
        &self,
        record: &ConversationRecord,
        utterance: &str,
        extracted_data: ExtractedData,
    ) -> Result<Reply, HandleUtteranceError> {
        let user_turn = Turn::user(utterance);
        let mut history = record.history.clone();
        history.push(user_turn.clone());

        let question = match self
            .assistant
            .ask_next_question(&record.user_key, &history, &extracted_data)
            .await
        {
            Ok(question) => question,
            Err(e) if e.is_timeout() => {
                tracing::warn!(user_key = %record.user_key, error = %e, "next question timed out");
                return Ok(Reply::text(TURN_APOLOGY));
            }
            Err(e) => {
                tracing::error!(user_key = %record.user_key, error = %e, "next question failed");
                return Ok(Reply::text(TURN_APOLOGY));
            }
        };

        let mut patch = RecordPatch::transition(record.state, IntakeState::Collecting)?
            .append(user_turn)
            .append(Turn::bot(question.clone()));
        if record.state == IntakeState::Init {
            patch = patch.with_extracted_data(extracted_data);
        }
        self.store.merge(&record.user_key, &patch).await?;

        Ok(Reply::text(question))
    }

    /// COLLECTING + analysis request: ask before spending a deep analysis.
    async fn request_confirmation(
        &self,
        record: &ConversationRecord,
    ) -> Result<Reply, HandleUtteranceError> {
        let patch = RecordPatch::transition(record.state, IntakeState::ConfirmAnalysis)?;
        self.store.merge(&record.user_key, &patch).await?;

        Ok(Reply::text_with_replies(
            CONFIRM_ANALYSIS_MESSAGE,
            CONFIRM_ANALYSIS_CHOICES,
        ))
    }

    /// CONFIRM_ANALYSIS + affirmative: enqueue the job and defer the reply.
    ///
    /// The state stays CONFIRM_ANALYSIS; the deferred job moves it on.
    async fn dispatch_analysis(
        &self,
        record: &ConversationRecord,
        callback_url: Option<&str>,
    ) -> Result<Reply, HandleUtteranceError> {
        let Some(callback_url) = callback_url else {
            tracing::warn!(user_key = %record.user_key, "analysis confirmed without a callback target");
            return Ok(Reply::text(CALLBACK_UNAVAILABLE_MESSAGE));
        };

        let wait_message = self
            .assistant
            .generate_wait_message(&record.user_key, &record.history)
            .await;

        let job = AnalysisJob::new(
            record.user_key.clone(),
            record.history.clone(),
            record.extracted_data.clone(),
            callback_url,
        );

        if let Err(e) = self.queue.enqueue(&job).await {
            tracing::error!(
                user_key = %record.user_key,
                job_id = %job.job_id,
                error = %e,
                "failed to enqueue analysis job"
            );
            let patch = RecordPatch::transition(record.state, IntakeState::Collecting)?;
            self.store.merge(&record.user_key, &patch).await?;
            return Ok(Reply::text(ANALYSIS_APOLOGY));
        }

        tracing::info!(user_key = %record.user_key, job_id = %job.job_id, "analysis job enqueued");
        Ok(Reply::deferred(wait_message))
    }

    /// CONFIRM_ANALYSIS + anything else: back to collecting.
    async fn resume_collecting(
        &self,
        record: &ConversationRecord,
        utterance: &str,
    ) -> Result<Reply, HandleUtteranceError> {
        let patch = RecordPatch::transition(record.state, IntakeState::Collecting)?
            .append(Turn::user(utterance));
        self.store.merge(&record.user_key, &patch).await?;

        Ok(Reply::text(RESUME_COLLECTING_MESSAGE))
    }

    /// POST_ANALYSIS + termination: archive, then delete.
    ///
    /// The record is deleted only after the archive accepted the row.
    async fn terminate(&self, record: &ConversationRecord) -> Result<Reply, HandleUtteranceError> {
        let judgement = record
            .last_judgement
            .clone()
            .unwrap_or_else(|| judge(&record.extracted_data));

        let archived = match ArchiveRow::from_record(record, &judgement, Timestamp::now()) {
            Ok(row) => self.archive.insert(&row).await,
            Err(e) => Err(e),
        };
        if let Err(e) = archived {
            tracing::error!(user_key = %record.user_key, error = %e, "failed to archive conversation");
            return Ok(Reply::text(TERMINATION_APOLOGY));
        }

        self.store.delete(&record.user_key).await?;
        tracing::info!(
            user_key = %record.user_key,
            judgement = %judgement.possibility,
            "conversation terminated"
        );

        Ok(Reply::text(TERMINATED_MESSAGE))
    }
}
