//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the intake domain and the outside world. Adapters implement these ports.
//!
//! ## AI Ports
//!
//! - `AIProvider` - Raw completion calls against a generative model
//! - `IntakeAssistant` - Next question, full analysis and wait message
//!
//! ## Persistence Ports
//!
//! - `ConversationStore` - One record per user key, merged field by field
//! - `ArchiveWriter` - Analytics row written when a conversation ends
//!
//! ## Delivery Ports
//!
//! - `AnalysisQueue` - Durable, at-least-once scheduling of analysis jobs
//! - `CallbackSender` - The single outbound reply of a deferred job

mod ai_provider;
mod analysis_queue;
mod archive_writer;
mod callback_sender;
mod conversation_store;
mod intake_assistant;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, RequestMetadata, ResponseFormat, TokenUsage,
};
pub use analysis_queue::{AnalysisJob, AnalysisQueue, AnalysisQueueConsumer, QueueError, ReservedJob};
pub use archive_writer::{ArchiveError, ArchiveRow, ArchiveWriter};
pub use callback_sender::{CallbackError, CallbackSender};
pub use conversation_store::{ConversationStore, StoreError};
pub use intake_assistant::{AssistantError, IntakeAssistant};
