//! Intake domain - symptom collection, screening and reporting.
//!
//! Pure logic only: no I/O happens in this module. The application layer
//! drives it through the ports.

pub mod intent;
pub mod judgement;
pub mod prompts;
pub mod record;
pub mod reply;
pub mod report;
pub mod state;
pub mod symptoms;

pub use intent::Intent;
pub use judgement::{judge, judge_value, Judgement, Possibility};
pub use record::{transcript, ConversationRecord, RecordPatch, Speaker, Turn};
pub use reply::Reply;
pub use report::{format_report, Report};
pub use state::IntakeState;
pub use symptoms::{ExtractedData, SymptomField, SymptomValue};
