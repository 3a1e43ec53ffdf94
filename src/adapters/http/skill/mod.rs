//! Skill webhook HTTP adapter.
//!
//! Exposes the messaging platform's skill endpoint, the deferred-job
//! endpoint and the health probe.

mod dto;
mod handlers;
mod routes;

pub use dto::{CallbackAck, SkillRequest, SkillResponse, ENVELOPE_VERSION};
pub use handlers::{SkillHandlers, HEALTH_MESSAGE};
pub use routes::{skill_routes, ANALYSIS_CALLBACK_PATH};
