//! Analysis queue adapters.
//!
//! - `RedisAnalysisQueue` - Redis lists (production)
//! - `InMemoryAnalysisQueue` - Same lifecycle in memory (testing)
//! - `AnalysisDispatcher` - Worker delivering jobs to the deferred-job endpoint

mod dispatcher;
mod in_memory_queue;
mod redis_queue;

pub use dispatcher::{
    AnalysisDispatcher, AnalysisDispatcherConfig, DeliveryError, HttpJobTarget, JobTarget,
    PollOutcome,
};
pub use in_memory_queue::InMemoryAnalysisQueue;
pub use redis_queue::RedisAnalysisQueue;
