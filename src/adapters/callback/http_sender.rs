//! HTTP implementation of CallbackSender.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::adapters::http::skill::SkillResponse;
use crate::domain::intake::Reply;
use crate::ports::{CallbackError, CallbackSender};

/// Delivers deferred replies to the platform's callback URL.
#[derive(Debug, Clone)]
pub struct HttpCallbackSender {
    client: Client,
}

impl HttpCallbackSender {
    /// Creates a sender whose every POST is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, CallbackError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallbackError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn deliver(&self, callback_url: &str, reply: &Reply) -> Result<(), CallbackError> {
        let envelope = SkillResponse::from(reply);

        let response = self
            .client
            .post(callback_url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| CallbackError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "callback target rejected reply");
            return Err(CallbackError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(status = status.as_u16(), "callback delivered");
        Ok(())
    }
}
