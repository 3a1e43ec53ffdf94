//! Storage Adapters
//!
//! Implementations of the ConversationStore port.
//!
//! ## Available Adapters
//!
//! - **RedisConversationStore** - Hash plus append-only history list per user
//! - **InMemoryConversationStore** - Stores records in memory (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{InMemoryConversationStore, RedisConversationStore};
//!
//! // Production: Redis
//! let store = RedisConversationStore::new(conn, "conversations").with_ttl_secs(604_800);
//!
//! // Testing: in-memory storage
//! let store = InMemoryConversationStore::new();
//! ```

mod in_memory_conversation_store;
mod redis_conversation_store;

pub use in_memory_conversation_store::InMemoryConversationStore;
pub use redis_conversation_store::RedisConversationStore;
