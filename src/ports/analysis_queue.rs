//! Analysis Queue Port - durable scheduling of deferred analysis jobs.
//!
//! A job is delivered at least once to the deferred-job entry point.
//! Duplicate delivery is expected and handled there.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::{JobId, UserKey};
use crate::domain::intake::{ExtractedData, Turn};

/// Payload of one deferred analysis.
///
/// Only the user, history and callback target are required on the wire;
/// a job without an id gets a fresh one and missing data reads as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    #[serde(default)]
    pub job_id: JobId,
    pub user_key: UserKey,
    pub history: Vec<Turn>,
    #[serde(default)]
    pub extracted_data: ExtractedData,
    /// Where the single reply of this job goes.
    pub callback_url: String,
    /// Delivery attempts already made.
    #[serde(default)]
    pub attempts: u32,
}

impl AnalysisJob {
    pub fn new(
        user_key: UserKey,
        history: Vec<Turn>,
        extracted_data: ExtractedData,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            user_key,
            history,
            extracted_data,
            callback_url: callback_url.into(),
            attempts: 0,
        }
    }

    /// The same job, one delivery attempt later.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self.clone()
        }
    }
}

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to encode job: {0}")]
    Encode(String),

    #[error("failed to decode job: {0}")]
    Decode(String),

    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Port for enqueueing analysis jobs.
#[async_trait]
pub trait AnalysisQueue: Send + Sync {
    /// Durably schedule a job. Returns once the job is accepted.
    async fn enqueue(&self, job: &AnalysisJob) -> Result<(), QueueError>;
}

/// A job taken off the queue but not yet acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedJob {
    /// Payload exactly as stored; used to acknowledge it.
    pub raw: String,
    /// `None` when the payload does not decode.
    pub job: Option<AnalysisJob>,
}

impl ReservedJob {
    pub fn from_raw(raw: String) -> Self {
        let job = serde_json::from_str(&raw).ok();
        Self { raw, job }
    }
}

/// Consumer side of the queue, driven by the dispatcher.
///
/// A reserved job sits in a processing area until it is acknowledged,
/// re-queued or dead-lettered, so a crash between reserve and ack loses
/// nothing.
#[async_trait]
pub trait AnalysisQueueConsumer: Send + Sync {
    /// Moves everything left in the processing area back to the queue.
    async fn recover(&self) -> Result<usize, QueueError>;

    /// Waits up to `timeout` for the next job.
    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>, QueueError>;

    /// Drops a delivered job.
    async fn ack(&self, reserved: &ReservedJob) -> Result<(), QueueError>;

    /// Puts the job back with its attempt counter incremented.
    async fn retry(&self, reserved: &ReservedJob, job: &AnalysisJob) -> Result<(), QueueError>;

    /// Parks a job that will not be delivered.
    async fn dead_letter(&self, reserved: &ReservedJob) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_labels_and_attempts() {
        let job = AnalysisJob::new(
            UserKey::new("u1").unwrap(),
            vec![Turn::user("기침")],
            ExtractedData::empty(),
            "https://callback.example/1",
        );
        let json = serde_json::to_value(&job).unwrap();

        assert_eq!(json["user_key"], "u1");
        assert_eq!(json["attempts"], 0);
        assert!(json["extracted_data"].get("기침").is_some());
    }

    #[test]
    fn missing_attempts_defaults_to_zero() {
        let job = AnalysisJob::new(
            UserKey::new("u1").unwrap(),
            Vec::new(),
            ExtractedData::empty(),
            "https://cb",
        );
        let mut json = serde_json::to_value(&job).unwrap();
        json.as_object_mut().unwrap().remove("attempts");

        let decoded: AnalysisJob = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.attempts, 0);
        assert_eq!(decoded.job_id, job.job_id);
    }

    #[test]
    fn job_with_only_user_history_and_target_decodes() {
        let decoded: AnalysisJob = serde_json::from_value(serde_json::json!({
            "user_key": "u1",
            "history": [{"speaker": "user", "text": "기침"}],
            "callback_url": "https://cb"
        }))
        .unwrap();

        assert_eq!(decoded.history, vec![Turn::user("기침")]);
        assert!(decoded.extracted_data.is_empty());
        assert_eq!(decoded.attempts, 0);
    }

    #[test]
    fn reserved_job_keeps_undecodable_payload() {
        let reserved = ReservedJob::from_raw("not json".to_string());
        assert!(reserved.job.is_none());
        assert_eq!(reserved.raw, "not json");
    }

    #[test]
    fn next_attempt_increments_only_attempts() {
        let job = AnalysisJob::new(
            UserKey::new("u1").unwrap(),
            Vec::new(),
            ExtractedData::empty(),
            "https://cb",
        );
        let next = job.next_attempt();
        assert_eq!(next.attempts, 1);
        assert_eq!(next.job_id, job.job_id);
    }
}
