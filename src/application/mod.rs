//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    HandleUtteranceCommand, HandleUtteranceError, HandleUtteranceHandler, ProcessAnalysisCommand,
    ProcessAnalysisError, ProcessAnalysisHandler, ProcessAnalysisOutcome, ResultCardImages,
};
