//! Intake Assistant Port - the extraction and generation collaborator.
//!
//! Three calls, each with its own failure contract:
//!
//! - `ask_next_question` may fail or time out; the caller apologises.
//! - `analyze` may fail or time out; the caller delivers an error reply.
//! - `generate_wait_message` never fails; it degrades to a fixed text.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::UserKey;
use crate::domain::intake::{ExtractedData, Turn};

use super::ai_provider::AIError;

/// Errors surfaced by the intake assistant.
///
/// `Timeout` is kept apart from `Provider` so callers can pick a
/// fallback instead of treating a slow model like a broken one.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant call exceeded its {deadline_ms}ms deadline")]
    Timeout { deadline_ms: u64 },

    #[error("provider failure: {0}")]
    Provider(#[from] AIError),

    #[error("could not parse analysis output: {0}")]
    Parse(String),
}

impl AssistantError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AssistantError::Timeout { .. })
    }
}

/// Port for the model-backed parts of the intake conversation.
#[async_trait]
pub trait IntakeAssistant: Send + Sync {
    /// Generates the next question for the user.
    ///
    /// # Errors
    ///
    /// `AssistantError::Timeout` when the synchronous turn budget runs out.
    async fn ask_next_question(
        &self,
        user_key: &UserKey,
        history: &[Turn],
        extracted_data: &ExtractedData,
    ) -> Result<String, AssistantError>;

    /// Runs the full extraction over the conversation.
    ///
    /// Returns the raw JSON the model produced; shape validation is left
    /// to the caller so malformed output degrades to an insufficient
    /// judgement instead of an error.
    async fn analyze(&self, user_key: &UserKey, history: &[Turn]) -> Result<Value, AssistantError>;

    /// Short "please wait" text. Falls back to a fixed default.
    async fn generate_wait_message(&self, user_key: &UserKey, history: &[Turn]) -> String;
}
