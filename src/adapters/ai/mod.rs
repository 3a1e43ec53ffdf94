//! AI Provider Adapters.
//!
//! Implementations of the AIProvider and IntakeAssistant ports.
//!
//! ## Available Adapters
//!
//! - `GeminiProvider` - Vertex AI Gemini models (default)
//! - `OpenAIProvider` - OpenAI chat models
//! - `MockAIProvider` - Configurable mock for testing
//! - `LlmIntakeAssistant` - Next question, analysis and wait message on top of providers

mod gemini_provider;
mod llm_intake_assistant;
mod mock_provider;
mod openai_provider;

pub use gemini_provider::{GeminiConfig, GeminiProvider, METADATA_TOKEN_URL};
pub use llm_intake_assistant::{strip_code_fence, LlmIntakeAssistant};
pub use mock_provider::{MockAIProvider, MockError, MockResponse};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};
