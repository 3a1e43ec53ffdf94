//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine trait)
//! - `intake` - Symptom intake: extracted data, conversation record, screening rule, reports

pub mod foundation;
pub mod intake;
