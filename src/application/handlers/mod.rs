//! Application handlers.
//!
//! Command handlers that orchestrate domain operations through the ports.

pub mod intake;

pub use intake::{
    HandleUtteranceCommand, HandleUtteranceError, HandleUtteranceHandler, ProcessAnalysisCommand,
    ProcessAnalysisError, ProcessAnalysisHandler, ProcessAnalysisOutcome, ResultCardImages,
};
