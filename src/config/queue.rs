//! Analysis queue configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Analysis queue and dispatcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Redis list holding pending jobs
    #[serde(default = "default_name")]
    pub name: String,

    /// Public base URL of this service; jobs are delivered to
    /// `{base}/process-analysis-callback`
    #[serde(default)]
    pub callback_base_url: String,

    /// Delivery attempts before a job is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How long one reserve blocks, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Pause after a failed delivery, multiplied by the attempt number
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Deliveries the dispatcher runs at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Timeout of one job delivery, which spans the whole analysis
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Run the dispatcher in this process
    #[serde(default = "default_dispatcher_enabled")]
    pub dispatcher_enabled: bool,
}

impl QueueConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    /// Validate queue configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__NAME"));
        }
        if self.callback_base_url.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__CALLBACK_BASE_URL"));
        }
        let is_https = self.callback_base_url.starts_with("https://");
        if !is_https && !self.callback_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidUrl("queue.callback_base_url"));
        }
        if production && !is_https {
            return Err(ValidationError::CallbackBaseMustBeHttps);
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.max_in_flight == 0 {
            return Err(ValidationError::InvalidMaxInFlight);
        }
        if self.delivery_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            callback_base_url: String::new(),
            max_attempts: default_max_attempts(),
            poll_timeout_secs: default_poll_timeout(),
            retry_backoff_ms: default_retry_backoff(),
            max_in_flight: default_max_in_flight(),
            delivery_timeout_secs: default_delivery_timeout(),
            dispatcher_enabled: default_dispatcher_enabled(),
        }
    }
}

fn default_name() -> String {
    "analysis-jobs".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_poll_timeout() -> u64 {
    5
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_max_in_flight() -> usize {
    4
}

fn default_delivery_timeout() -> u64 {
    120
}

fn default_dispatcher_enabled() -> bool {
    true
}
