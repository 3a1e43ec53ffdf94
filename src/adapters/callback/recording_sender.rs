//! Recording callback sender for tests and development.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::intake::Reply;
use crate::ports::{CallbackError, CallbackSender};

/// One recorded delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub callback_url: String,
    pub reply: Reply,
}

/// Records every delivery instead of sending it.
///
/// Failed attempts are recorded too, so tests can count attempts
/// whether or not the target accepted them.
#[derive(Debug, Clone, Default)]
pub struct RecordingCallbackSender {
    deliveries: Arc<RwLock<Vec<Delivery>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingCallbackSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail with a 500 rejection
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.read().await.clone()
    }

    pub async fn delivery_count(&self) -> usize {
        self.deliveries.read().await.len()
    }
}

#[async_trait]
impl CallbackSender for RecordingCallbackSender {
    async fn deliver(&self, callback_url: &str, reply: &Reply) -> Result<(), CallbackError> {
        self.deliveries.write().await.push(Delivery {
            callback_url: callback_url.to_string(),
            reply: reply.clone(),
        });

        if self.fail.load(Ordering::SeqCst) {
            return Err(CallbackError::Rejected { status: 500 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_successful_and_failed_attempts() {
        let sender = RecordingCallbackSender::new();
        sender.deliver("https://cb/1", &Reply::text("a")).await.unwrap();

        sender.set_fail(true);
        let err = sender.deliver("https://cb/2", &Reply::text("b")).await.unwrap_err();
        assert!(matches!(err, CallbackError::Rejected { status: 500 }));

        let deliveries = sender.deliveries().await;
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].callback_url, "https://cb/1");
        assert_eq!(deliveries[1].reply, Reply::text("b"));
    }
}
