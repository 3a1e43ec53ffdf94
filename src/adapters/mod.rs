//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Model providers and the intake assistant
//! - `archive` - Conversation archive (PostgreSQL, in-memory)
//! - `callback` - Deferred reply delivery (HTTP, recording)
//! - `http` - Skill webhook endpoints
//! - `queue` - Analysis queue and dispatcher (Redis, in-memory)
//! - `storage` - Conversation store (Redis, in-memory)

pub mod ai;
pub mod archive;
pub mod callback;
pub mod http;
pub mod queue;
pub mod storage;
