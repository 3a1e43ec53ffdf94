//! Intake handlers - the two entry points of a conversation.
//!
//! - `HandleUtteranceHandler` answers each inbound utterance
//! - `ProcessAnalysisHandler` runs a deferred analysis job

mod handle_utterance;
mod process_analysis;

pub use handle_utterance::{HandleUtteranceCommand, HandleUtteranceError, HandleUtteranceHandler};
pub use process_analysis::{
    ProcessAnalysisCommand, ProcessAnalysisError, ProcessAnalysisHandler, ProcessAnalysisOutcome,
    ResultCardImages,
};
