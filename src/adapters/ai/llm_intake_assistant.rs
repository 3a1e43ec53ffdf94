//! AI-powered IntakeAssistant implementation
//!
//! Two providers: a fast one for the synchronous turn (next question,
//! wait message) and a stronger one for the deferred full analysis.
//! Synchronous calls are wrapped in `tokio::time::timeout`, which drops
//! the in-flight request future, and with it the connection, at the
//! deadline.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::domain::foundation::UserKey;
use crate::domain::intake::prompts::{
    system_prompt_analysis, DEFAULT_WAIT_MESSAGE, SYSTEM_PROMPT_NEXT_QUESTION,
    SYSTEM_PROMPT_WAIT_MESSAGE,
};
use crate::domain::intake::{transcript, ExtractedData, Turn};
use crate::ports::{
    AIProvider, AssistantError, CompletionRequest, CompletionResponse, FinishReason,
    IntakeAssistant, MessageRole, RequestMetadata,
};

const TRANSCRIPT_START: &str = "---대화 기록 시작---";
const TRANSCRIPT_END: &str = "---대화 기록 끝---";

/// Intake assistant backed by generative models.
pub struct LlmIntakeAssistant {
    question_provider: Arc<dyn AIProvider>,
    analysis_provider: Arc<dyn AIProvider>,
    turn_deadline: Duration,
    wait_message_deadline: Duration,
}

impl LlmIntakeAssistant {
    pub fn new(
        question_provider: Arc<dyn AIProvider>,
        analysis_provider: Arc<dyn AIProvider>,
    ) -> Self {
        Self {
            question_provider,
            analysis_provider,
            turn_deadline: Duration::from_millis(4000),
            wait_message_deadline: Duration::from_millis(2500),
        }
    }

    pub fn with_turn_deadline(mut self, deadline: Duration) -> Self {
        self.turn_deadline = deadline;
        self
    }

    pub fn with_wait_message_deadline(mut self, deadline: Duration) -> Self {
        self.wait_message_deadline = deadline;
        self
    }

    /// Context for the next question: transcript plus current data.
    fn question_context(history: &[Turn], extracted_data: &ExtractedData) -> String {
        let data = serde_json::to_string_pretty(extracted_data).unwrap_or_else(|_| "{}".into());
        format!(
            "{TRANSCRIPT_START}\n{}\n{TRANSCRIPT_END}\n\n[현재까지 분석된 환자 정보]\n{data}",
            transcript(history)
        )
    }

    async fn complete_within(
        &self,
        provider: &dyn AIProvider,
        request: CompletionRequest,
        deadline: Duration,
    ) -> Result<String, AssistantError> {
        match timeout(deadline, provider.complete(request)).await {
            Ok(result) => finished_content(result?),
            Err(_) => Err(AssistantError::Timeout {
                deadline_ms: deadline.as_millis() as u64,
            }),
        }
    }
}

/// Content of a completion that ended naturally.
///
/// A cut-off or filtered answer is never shown to the user.
fn finished_content(response: CompletionResponse) -> Result<String, AssistantError> {
    match response.finish_reason {
        FinishReason::Stop => Ok(response.content),
        other => Err(AssistantError::Parse(format!(
            "completion did not finish: {:?}",
            other
        ))),
    }
}

/// Removes a surrounding Markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[async_trait]
impl IntakeAssistant for LlmIntakeAssistant {
    async fn ask_next_question(
        &self,
        user_key: &UserKey,
        history: &[Turn],
        extracted_data: &ExtractedData,
    ) -> Result<String, AssistantError> {
        let request = CompletionRequest::new(RequestMetadata::new(user_key.clone(), "next_question"))
            .with_system_prompt(SYSTEM_PROMPT_NEXT_QUESTION)
            .with_message(
                MessageRole::User,
                Self::question_context(history, extracted_data),
            )
            .with_max_tokens(256)
            .with_temperature(0.4);

        let question = self
            .complete_within(self.question_provider.as_ref(), request, self.turn_deadline)
            .await?;

        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::Parse("empty question".to_string()));
        }
        Ok(question.to_string())
    }

    async fn analyze(&self, user_key: &UserKey, history: &[Turn]) -> Result<Value, AssistantError> {
        let request = CompletionRequest::new(RequestMetadata::new(user_key.clone(), "analysis"))
            .with_system_prompt(system_prompt_analysis())
            .with_message(MessageRole::User, transcript(history))
            .with_temperature(0.0)
            .expecting_json();

        let content = finished_content(self.analysis_provider.complete(request).await?)?;

        serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| AssistantError::Parse(format!("Failed to parse AI response: {}", e)))
    }

    async fn generate_wait_message(&self, user_key: &UserKey, history: &[Turn]) -> String {
        let request = CompletionRequest::new(RequestMetadata::new(user_key.clone(), "wait_message"))
            .with_system_prompt(SYSTEM_PROMPT_WAIT_MESSAGE)
            .with_message(MessageRole::User, transcript(history))
            .with_max_tokens(128)
            .with_temperature(0.7);

        match self
            .complete_within(
                self.question_provider.as_ref(),
                request,
                self.wait_message_deadline,
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => DEFAULT_WAIT_MESSAGE.to_string(),
            Err(err) => {
                tracing::warn!(user_key = %user_key, error = %err, "wait message fell back to default");
                DEFAULT_WAIT_MESSAGE.to_string()
            }
        }
    }
}
