//! HTTP adapters - webhook endpoints.

pub mod skill;

pub use skill::{skill_routes, SkillHandlers};
