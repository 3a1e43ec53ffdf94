//! In-memory analysis queue for tests and single-process development.
//!
//! Same lifecycle as the Redis queue: pending, processing, dead.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::ports::{AnalysisJob, AnalysisQueue, AnalysisQueueConsumer, QueueError, ReservedJob};

#[derive(Debug, Default)]
struct Lists {
    pending: VecDeque<String>,
    processing: Vec<String>,
    dead: Vec<String>,
}

/// In-memory queue.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnalysisQueue {
    lists: Arc<Mutex<Lists>>,
    notify: Arc<Notify>,
    fail_enqueue: Arc<AtomicBool>,
}

impl InMemoryAnalysisQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue fail
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Jobs waiting for delivery, oldest first.
    pub async fn pending_jobs(&self) -> Vec<AnalysisJob> {
        let lists = self.lists.lock().await;
        lists
            .pending
            .iter()
            .rev()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    pub async fn processing_count(&self) -> usize {
        self.lists.lock().await.processing.len()
    }

    pub async fn dead_count(&self) -> usize {
        self.lists.lock().await.dead.len()
    }

    /// Push a raw payload, bypassing encoding (tests of malformed jobs).
    pub async fn push_raw(&self, raw: impl Into<String>) {
        self.lists.lock().await.pending.push_front(raw.into());
        self.notify.notify_one();
    }

    fn remove_processing(lists: &mut Lists, raw: &str) {
        if let Some(pos) = lists.processing.iter().position(|r| r == raw) {
            lists.processing.remove(pos);
        }
    }
}

#[async_trait]
impl AnalysisQueue for InMemoryAnalysisQueue {
    async fn enqueue(&self, job: &AnalysisJob) -> Result<(), QueueError> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(QueueError::Backend("enqueue disabled".to_string()));
        }
        let raw = serde_json::to_string(job).map_err(|e| QueueError::Encode(e.to_string()))?;
        self.push_raw(raw).await;
        Ok(())
    }
}

#[async_trait]
impl AnalysisQueueConsumer for InMemoryAnalysisQueue {
    async fn recover(&self) -> Result<usize, QueueError> {
        let mut lists = self.lists.lock().await;
        let stranded: Vec<String> = lists.processing.drain(..).collect();
        let count = stranded.len();
        for raw in stranded {
            lists.pending.push_back(raw);
        }
        Ok(count)
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a push in between is not missed.
            let notified = self.notify.notified();
            {
                let mut lists = self.lists.lock().await;
                if let Some(raw) = lists.pending.pop_back() {
                    lists.processing.push(raw.clone());
                    return Ok(Some(ReservedJob::from_raw(raw)));
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, reserved: &ReservedJob) -> Result<(), QueueError> {
        let mut lists = self.lists.lock().await;
        Self::remove_processing(&mut lists, &reserved.raw);
        Ok(())
    }

    async fn retry(&self, reserved: &ReservedJob, job: &AnalysisJob) -> Result<(), QueueError> {
        let raw = serde_json::to_string(&job.next_attempt())
            .map_err(|e| QueueError::Encode(e.to_string()))?;
        let mut lists = self.lists.lock().await;
        Self::remove_processing(&mut lists, &reserved.raw);
        lists.pending.push_front(raw);
        drop(lists);
        self.notify.notify_one();
        Ok(())
    }

    async fn dead_letter(&self, reserved: &ReservedJob) -> Result<(), QueueError> {
        let mut lists = self.lists.lock().await;
        Self::remove_processing(&mut lists, &reserved.raw);
        lists.dead.push(reserved.raw.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserKey;
    use crate::domain::intake::ExtractedData;

    fn job(user: &str) -> AnalysisJob {
        AnalysisJob::new(
            UserKey::new(user).unwrap(),
            Vec::new(),
            ExtractedData::empty(),
            "https://cb",
        )
    }

    #[tokio::test]
    async fn jobs_are_reserved_in_fifo_order() {
        let queue = InMemoryAnalysisQueue::new();
        queue.enqueue(&job("a")).await.unwrap();
        queue.enqueue(&job("b")).await.unwrap();

        let first = queue.reserve(Duration::from_millis(10)).await.unwrap().unwrap();
        let second = queue.reserve(Duration::from_millis(10)).await.unwrap().unwrap();

        assert_eq!(first.job.unwrap().user_key.as_str(), "a");
        assert_eq!(second.job.unwrap().user_key.as_str(), "b");
        assert_eq!(queue.processing_count().await, 2);
    }

    #[tokio::test]
    async fn reserve_times_out_when_empty() {
        let queue = InMemoryAnalysisQueue::new();
        assert!(queue.reserve(Duration::from_millis(20)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reserve_wakes_on_enqueue() {
        let queue = InMemoryAnalysisQueue::new();
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(&job("late")).await.unwrap();
        });

        let reserved = queue.reserve(Duration::from_secs(2)).await.unwrap();
        assert!(reserved.is_some());
    }

    #[tokio::test]
    async fn ack_retry_and_dead_letter_empty_processing() {
        let queue = InMemoryAnalysisQueue::new();
        for user in ["a", "b", "c"] {
            queue.enqueue(&job(user)).await.unwrap();
        }

        let a = queue.reserve(Duration::ZERO).await.unwrap().unwrap();
        queue.ack(&a).await.unwrap();

        let b = queue.reserve(Duration::ZERO).await.unwrap().unwrap();
        let b_job = b.job.clone().unwrap();
        queue.retry(&b, &b_job).await.unwrap();

        let c = queue.reserve(Duration::ZERO).await.unwrap().unwrap();
        queue.dead_letter(&c).await.unwrap();

        assert_eq!(queue.processing_count().await, 0);
        assert_eq!(queue.dead_count().await, 1);
        let pending = queue.pending_jobs().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn recover_requeues_stranded_jobs() {
        let queue = InMemoryAnalysisQueue::new();
        queue.enqueue(&job("a")).await.unwrap();
        queue.reserve(Duration::ZERO).await.unwrap();

        assert_eq!(queue.recover().await.unwrap(), 1);
        assert_eq!(queue.processing_count().await, 0);
        assert_eq!(queue.pending_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn failing_enqueue_reports_backend_error() {
        let queue = InMemoryAnalysisQueue::new();
        queue.set_fail_enqueue(true);
        assert!(matches!(
            queue.enqueue(&job("a")).await,
            Err(QueueError::Backend(_))
        ));
        assert!(queue.pending_jobs().await.is_empty());
    }
}
