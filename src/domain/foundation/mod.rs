//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait and
//! validation errors that the intake domain is built on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{JobId, UserKey};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
