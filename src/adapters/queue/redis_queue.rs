//! Redis list-backed analysis queue.
//!
//! Producer: `LPUSH {queue}`. Consumer: `BRPOPLPUSH {queue} {queue}:processing`,
//! then `LREM` on acknowledgment. Undeliverable jobs go to `{queue}:dead`.
//!
//! The consumer blocks its connection while waiting, so the dispatcher
//! should be given a connection of its own. With deliveries in flight,
//! `with_blocking_connection` keeps their acks off that blocked connection.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::ports::{AnalysisJob, AnalysisQueue, AnalysisQueueConsumer, QueueError, ReservedJob};

/// Redis-backed analysis queue.
#[derive(Clone)]
pub struct RedisAnalysisQueue {
    conn: MultiplexedConnection,
    blocking_conn: Option<MultiplexedConnection>,
    queue_key: String,
    processing_key: String,
    dead_key: String,
}

impl RedisAnalysisQueue {
    pub fn new(conn: MultiplexedConnection, queue_name: impl Into<String>) -> Self {
        let queue_key = queue_name.into();
        Self {
            processing_key: format!("{}:processing", queue_key),
            dead_key: format!("{}:dead", queue_key),
            queue_key,
            conn,
            blocking_conn: None,
        }
    }

    /// Connection used only by `reserve`.
    pub fn with_blocking_connection(mut self, conn: MultiplexedConnection) -> Self {
        self.blocking_conn = Some(conn);
        self
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }
}

fn backend(e: redis::RedisError) -> QueueError {
    QueueError::Backend(e.to_string())
}

#[async_trait]
impl AnalysisQueue for RedisAnalysisQueue {
    async fn enqueue(&self, job: &AnalysisJob) -> Result<(), QueueError> {
        let raw = serde_json::to_string(job).map_err(|e| QueueError::Encode(e.to_string()))?;
        let mut conn = self.conn.clone();

        conn.lpush::<_, _, ()>(&self.queue_key, raw)
            .await
            .map_err(backend)?;

        tracing::debug!(job_id = %job.job_id, user_key = %job.user_key, "analysis job enqueued");
        Ok(())
    }
}

#[async_trait]
impl AnalysisQueueConsumer for RedisAnalysisQueue {
    async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut moved = 0;
        loop {
            let raw: Option<String> = conn
                .rpoplpush(&self.processing_key, &self.queue_key)
                .await
                .map_err(backend)?;
            if raw.is_none() {
                return Ok(moved);
            }
            moved += 1;
        }
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>, QueueError> {
        let mut conn = self.blocking_conn.as_ref().unwrap_or(&self.conn).clone();
        // BRPOPLPUSH treats 0 as "block forever"; never pass it.
        let secs = timeout.as_secs().max(1);

        let raw: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(&self.queue_key)
            .arg(&self.processing_key)
            .arg(secs)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        Ok(raw.map(ReservedJob::from_raw))
    }

    async fn ack(&self, reserved: &ReservedJob) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(&self.processing_key, 1, &reserved.raw)
            .await
            .map_err(backend)
    }

    async fn retry(&self, reserved: &ReservedJob, job: &AnalysisJob) -> Result<(), QueueError> {
        let raw = serde_json::to_string(&job.next_attempt())
            .map_err(|e| QueueError::Encode(e.to_string()))?;
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .lrem(&self.processing_key, 1, &reserved.raw)
            .ignore()
            .lpush(&self.queue_key, raw)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn dead_letter(&self, reserved: &ReservedJob) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .lrem(&self.processing_key, 1, &reserved.raw)
            .ignore()
            .lpush(&self.dead_key, &reserved.raw)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)
    }
}

impl std::fmt::Debug for RedisAnalysisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisAnalysisQueue")
            .field("queue_key", &self.queue_key)
            .finish_non_exhaustive()
    }
}
