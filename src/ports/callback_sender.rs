//! Callback Sender Port - the single outbound reply of a deferred job.

use async_trait::async_trait;

use crate::domain::intake::Reply;

/// Callback delivery errors
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("callback target rejected the reply with status {status}")]
    Rejected { status: u16 },

    #[error("network error: {0}")]
    Network(String),
}

/// Port for delivering a reply to a platform-supplied callback target.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    /// POST the reply, encoded in the platform envelope, to `callback_url`.
    async fn deliver(&self, callback_url: &str, reply: &Reply) -> Result<(), CallbackError>;
}
