//! AI provider configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// AI provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Which model vendor serves both calls
    #[serde(default = "default_provider")]
    pub provider: AiProvider,

    /// GCP project hosting the Vertex AI models
    pub gcp_project_id: Option<String>,

    /// Vertex AI region
    #[serde(default = "default_region")]
    pub region: String,

    /// Static bearer token; fetched from the metadata server when unset
    pub access_token: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Model for next questions and wait messages
    pub question_model: Option<String>,

    /// Model for the deferred analysis
    pub analysis_model: Option<String>,

    /// Budget for one synchronous next-question call
    #[serde(default = "default_turn_deadline")]
    pub turn_deadline_ms: u64,

    /// Budget for the wait message before the default text is used
    #[serde(default = "default_wait_message_deadline")]
    pub wait_message_deadline_ms: u64,

    /// Timeout of every provider HTTP call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum retries on retryable provider errors
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

/// AI provider type
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Gemini,
    OpenAI,
}

impl AiConfig {
    pub fn question_model(&self) -> &str {
        self.question_model
            .as_deref()
            .unwrap_or(match self.provider {
                AiProvider::Gemini => "gemini-1.5-flash",
                AiProvider::OpenAI => "gpt-4o-mini",
            })
    }

    pub fn analysis_model(&self) -> &str {
        self.analysis_model
            .as_deref()
            .unwrap_or(match self.provider {
                AiProvider::Gemini => "gemini-1.5-pro",
                AiProvider::OpenAI => "gpt-4o",
            })
    }

    pub fn turn_deadline(&self) -> Duration {
        Duration::from_millis(self.turn_deadline_ms)
    }

    pub fn wait_message_deadline(&self) -> Duration {
        Duration::from_millis(self.wait_message_deadline_ms)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check if OpenAI is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// Check if a GCP project is configured
    pub fn has_gcp_project(&self) -> bool {
        self.gcp_project_id.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Validate AI configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.provider {
            AiProvider::Gemini if !self.has_gcp_project() => {
                return Err(ValidationError::MissingRequired("AI__GCP_PROJECT_ID"));
            }
            AiProvider::OpenAI if !self.has_openai() => {
                return Err(ValidationError::MissingRequired("AI__OPENAI_API_KEY"));
            }
            _ => {}
        }

        // The platform drops a skill call after five seconds.
        if self.turn_deadline_ms == 0 || self.turn_deadline_ms >= 5000 {
            return Err(ValidationError::InvalidDeadline("turn_deadline_ms"));
        }
        if self.wait_message_deadline_ms == 0 || self.wait_message_deadline_ms >= 5000 {
            return Err(ValidationError::InvalidDeadline("wait_message_deadline_ms"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gcp_project_id: None,
            region: default_region(),
            access_token: None,
            openai_api_key: None,
            question_model: None,
            analysis_model: None,
            turn_deadline_ms: default_turn_deadline(),
            wait_message_deadline_ms: default_wait_message_deadline(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_retries(),
        }
    }
}

fn default_provider() -> AiProvider {
    AiProvider::Gemini
}

fn default_region() -> String {
    "asia-northeast3".to_string()
}

fn default_turn_deadline() -> u64 {
    4000
}

fn default_wait_message_deadline() -> u64 {
    2500
}

fn default_request_timeout() -> u64 {
    25
}

fn default_retries() -> u32 {
    2
}
