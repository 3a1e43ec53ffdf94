//! AnalysisDispatcher - Background worker delivering queued analysis jobs.
//!
//! Takes jobs off the queue and POSTs each one to the deferred-job entry
//! point of this service:
//!
//! 1. On start, jobs stranded in the processing area are re-queued
//! 2. A reserved job is delivered; a 2xx acknowledges it
//! 3. A failed delivery is re-queued with its attempt counter bumped
//! 4. After `max_attempts` failed deliveries the job is dead-lettered
//!
//! Up to `max_in_flight` deliveries run at once; the worker reserves a new
//! job only while a slot is free, so one slow analysis never holds up the
//! jobs queued behind it.
//!
//! Delivery is at-least-once: a crash after the POST but before the
//! acknowledgment re-delivers the job on the next start.
//!
//! ## Graceful Shutdown
//!
//! The worker listens on a watch channel. Deliveries cut short by shutdown
//! stay in the processing area and are recovered on the next start.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time;

use crate::adapters::http::skill::ANALYSIS_CALLBACK_PATH;
use crate::ports::{AnalysisJob, AnalysisQueueConsumer, QueueError, ReservedJob};

/// Where a reserved job is sent.
#[async_trait]
pub trait JobTarget: Send + Sync {
    async fn deliver(&self, job: &AnalysisJob) -> Result<(), DeliveryError>;
}

/// Why a delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("endpoint answered {status}")]
    Status { status: u16 },

    #[error("network error: {0}")]
    Network(String),
}

/// POSTs jobs as JSON to the deferred-job endpoint.
pub struct HttpJobTarget {
    client: Client,
    endpoint: String,
}

impl HttpJobTarget {
    /// `base_url` is the public base of this service.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Backend(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                ANALYSIS_CALLBACK_PATH
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl JobTarget for HttpJobTarget {
    async fn deliver(&self, job: &AnalysisJob) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(job)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
            })
        }
    }
}

/// Configuration for the AnalysisDispatcher.
#[derive(Debug, Clone)]
pub struct AnalysisDispatcherConfig {
    /// How long one reserve call waits for a job.
    pub poll_timeout: Duration,

    /// Deliveries tried before a job is dead-lettered.
    pub max_attempts: u32,

    /// Pause after a failed delivery, multiplied by the attempt number.
    pub retry_backoff: Duration,

    /// Deliveries running at once.
    pub max_in_flight: usize,
}

impl Default for AnalysisDispatcherConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(5),
            max_attempts: 5,
            retry_backoff: Duration::from_millis(500),
            max_in_flight: 4,
        }
    }
}

impl AnalysisDispatcherConfig {
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Zero is raised to one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived within the poll timeout.
    Idle,
    Delivered,
    Retried,
    DeadLettered,
}

/// Background worker delivering analysis jobs.
pub struct AnalysisDispatcher {
    queue: Arc<dyn AnalysisQueueConsumer>,
    target: Arc<dyn JobTarget>,
    config: AnalysisDispatcherConfig,
}

impl AnalysisDispatcher {
    pub fn new(
        queue: Arc<dyn AnalysisQueueConsumer>,
        target: Arc<dyn JobTarget>,
        config: AnalysisDispatcherConfig,
    ) -> Self {
        Self {
            queue,
            target,
            config,
        }
    }

    /// Run the delivery loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        let recovered = self.queue.recover().await?;
        if recovered > 0 {
            tracing::info!(recovered, "re-queued jobs left in processing");
        }

        let slots = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut in_flight: JoinSet<Result<PollOutcome, QueueError>> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Wait for a free slot, reaping finished deliveries meanwhile.
            let permit = tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_settled(joined);
                    continue;
                }

                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                reserved = self.queue.reserve(self.config.poll_timeout) => match reserved {
                    Ok(Some(reserved)) => {
                        in_flight.spawn(self.settle_holding(reserved, permit));
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(error = %err, "analysis queue unavailable");
                        time::sleep(Duration::from_secs(1)).await;
                    }
                },
            }
        }

        if !in_flight.is_empty() {
            tracing::info!(
                in_flight = in_flight.len(),
                "abandoning deliveries in flight; they are recovered on next start"
            );
        }
        in_flight.shutdown().await;
        tracing::info!("analysis dispatcher stopping");
        Ok(())
    }

    /// Run exactly one poll cycle.
    pub async fn poll_once(&self) -> Result<PollOutcome, QueueError> {
        let Some(reserved) = self.queue.reserve(self.config.poll_timeout).await? else {
            return Ok(PollOutcome::Idle);
        };

        settle(
            self.queue.clone(),
            self.target.clone(),
            self.config.clone(),
            reserved,
        )
        .await
    }

    /// Settles `reserved` while holding a delivery slot.
    fn settle_holding(
        &self,
        reserved: ReservedJob,
        permit: OwnedSemaphorePermit,
    ) -> impl std::future::Future<Output = Result<PollOutcome, QueueError>> + Send + 'static {
        let queue = self.queue.clone();
        let target = self.target.clone();
        let config = self.config.clone();
        async move {
            let outcome = settle(queue, target, config, reserved).await;
            drop(permit);
            outcome
        }
    }
}

/// Delivers one reserved job, then acks, retries or dead-letters it.
async fn settle(
    queue: Arc<dyn AnalysisQueueConsumer>,
    target: Arc<dyn JobTarget>,
    config: AnalysisDispatcherConfig,
    reserved: ReservedJob,
) -> Result<PollOutcome, QueueError> {
    let Some(ref job) = reserved.job else {
        tracing::error!(payload = %reserved.raw, "undecodable analysis job dead-lettered");
        queue.dead_letter(&reserved).await?;
        return Ok(PollOutcome::DeadLettered);
    };

    match target.deliver(job).await {
        Ok(()) => {
            queue.ack(&reserved).await?;
            tracing::info!(job_id = %job.job_id, user_key = %job.user_key, "analysis job delivered");
            Ok(PollOutcome::Delivered)
        }
        Err(err) => {
            let attempts = job.attempts + 1;
            if attempts >= config.max_attempts {
                tracing::error!(
                    job_id = %job.job_id,
                    user_key = %job.user_key,
                    attempts,
                    error = %err,
                    "analysis job dead-lettered"
                );
                queue.dead_letter(&reserved).await?;
                return Ok(PollOutcome::DeadLettered);
            }

            tracing::warn!(
                job_id = %job.job_id,
                attempts,
                error = %err,
                "analysis job delivery failed, re-queueing"
            );
            time::sleep(config.retry_backoff * attempts).await;
            queue.retry(&reserved, job).await?;
            Ok(PollOutcome::Retried)
        }
    }
}

fn log_settled(joined: Result<Result<PollOutcome, QueueError>, JoinError>) {
    match joined {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "analysis job could not be settled"),
        Err(err) => tracing::error!(error = %err, "analysis delivery task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::queue::InMemoryAnalysisQueue;
    use crate::domain::foundation::UserKey;
    use crate::domain::intake::ExtractedData;
    use crate::ports::AnalysisQueue;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Target answering with scripted outcomes, then success.
    #[derive(Default)]
    struct ScriptedTarget {
        failures: Mutex<VecDeque<DeliveryError>>,
        delivered: Mutex<Vec<AnalysisJob>>,
    }

    impl ScriptedTarget {
        fn failing(times: usize) -> Self {
            let failures = (0..times)
                .map(|_| DeliveryError::Status { status: 503 })
                .collect();
            Self {
                failures: Mutex::new(failures),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JobTarget for ScriptedTarget {
        async fn deliver(&self, job: &AnalysisJob) -> Result<(), DeliveryError> {
            if let Some(err) = self.failures.lock().await.pop_front() {
                return Err(err);
            }
            self.delivered.lock().await.push(job.clone());
            Ok(())
        }
    }

    /// Target that takes a while per job and records peak overlap.
    #[derive(Default)]
    struct SlowTarget {
        running: AtomicUsize,
        peak: AtomicUsize,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl JobTarget for SlowTarget {
        async fn deliver(&self, _job: &AnalysisJob) -> Result<(), DeliveryError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            time::sleep(Duration::from_millis(200)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn run_slow_jobs(jobs: usize, max_in_flight: usize) -> Arc<SlowTarget> {
        let queue = InMemoryAnalysisQueue::new();
        for _ in 0..jobs {
            queue.enqueue(&job()).await.unwrap();
        }

        let target = Arc::new(SlowTarget::default());
        let dispatcher = AnalysisDispatcher::new(
            Arc::new(queue.clone()),
            target.clone(),
            AnalysisDispatcherConfig::default()
                .with_poll_timeout(Duration::from_millis(10))
                .with_max_in_flight(max_in_flight),
        );
        let (tx, rx) = watch::channel(false);
        let worker = tokio::spawn(async move { dispatcher.run(rx).await });

        for _ in 0..200 {
            if target.delivered.load(Ordering::SeqCst) == jobs {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        worker.await.unwrap().unwrap();

        target
    }

    fn job() -> AnalysisJob {
        AnalysisJob::new(
            UserKey::new("user-1").unwrap(),
            Vec::new(),
            ExtractedData::empty(),
            "https://cb",
        )
    }

    fn dispatcher(
        queue: &InMemoryAnalysisQueue,
        target: Arc<ScriptedTarget>,
        max_attempts: u32,
    ) -> AnalysisDispatcher {
        AnalysisDispatcher::new(
            Arc::new(queue.clone()),
            target,
            AnalysisDispatcherConfig::default()
                .with_poll_timeout(Duration::from_millis(10))
                .with_max_attempts(max_attempts)
                .with_retry_backoff(Duration::ZERO),
        )
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        let target = HttpJobTarget::new("https://bot.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(target.endpoint(), "https://bot.example/process-analysis-callback");
    }

    #[tokio::test]
    async fn idle_when_queue_is_empty() {
        let queue = InMemoryAnalysisQueue::new();
        let dispatcher = dispatcher(&queue, Arc::new(ScriptedTarget::default()), 3);

        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::Idle);
    }

    #[tokio::test]
    async fn delivered_job_is_acknowledged() {
        let queue = InMemoryAnalysisQueue::new();
        let target = Arc::new(ScriptedTarget::default());
        let dispatcher = dispatcher(&queue, target.clone(), 3);
        let job = job();
        queue.enqueue(&job).await.unwrap();

        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::Delivered);
        assert_eq!(target.delivered.lock().await[0].job_id, job.job_id);
        assert_eq!(queue.processing_count().await, 0);
        assert!(queue.pending_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_then_delivered() {
        let queue = InMemoryAnalysisQueue::new();
        let target = Arc::new(ScriptedTarget::failing(1));
        let dispatcher = dispatcher(&queue, target.clone(), 3);
        queue.enqueue(&job()).await.unwrap();

        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::Retried);
        assert_eq!(queue.pending_jobs().await[0].attempts, 1);

        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::Delivered);
        assert_eq!(target.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_job_is_dead_lettered() {
        let queue = InMemoryAnalysisQueue::new();
        let dispatcher = dispatcher(&queue, Arc::new(ScriptedTarget::failing(10)), 2);
        queue.enqueue(&job()).await.unwrap();

        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::Retried);
        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::DeadLettered);
        assert_eq!(queue.dead_count().await, 1);
        assert_eq!(queue.processing_count().await, 0);
    }

    #[tokio::test]
    async fn undecodable_job_is_dead_lettered() {
        let queue = InMemoryAnalysisQueue::new();
        let target = Arc::new(ScriptedTarget::default());
        let dispatcher = dispatcher(&queue, target.clone(), 3);
        queue.push_raw("{broken").await;

        assert_eq!(dispatcher.poll_once().await.unwrap(), PollOutcome::DeadLettered);
        assert!(target.delivered.lock().await.is_empty());
    }

    #[tokio::test]
    async fn run_recovers_and_stops_on_shutdown() {
        let queue = InMemoryAnalysisQueue::new();
        queue.enqueue(&job()).await.unwrap();
        // Strand the job in processing, as after a crash.
        queue.reserve(Duration::ZERO).await.unwrap();

        let target = Arc::new(ScriptedTarget::default());
        let dispatcher = Arc::new(dispatcher(&queue, target.clone(), 3));
        let (tx, rx) = watch::channel(false);

        let worker = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.run(rx).await })
        };

        for _ in 0..100 {
            if !target.delivered.lock().await.is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();

        worker.await.unwrap().unwrap();
        assert_eq!(target.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn slow_deliveries_overlap() {
        let target = run_slow_jobs(2, 2).await;

        assert_eq!(target.delivered.load(Ordering::SeqCst), 2);
        assert_eq!(target.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deliveries_never_exceed_max_in_flight() {
        let target = run_slow_jobs(3, 1).await;

        assert_eq!(target.delivered.load(Ordering::SeqCst), 3);
        assert_eq!(target.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_max_in_flight_is_raised_to_one() {
        let config = AnalysisDispatcherConfig::default().with_max_in_flight(0);
        assert_eq!(config.max_in_flight, 1);
    }
}
