//! Gemini Provider - Implementation of AIProvider for Vertex AI Gemini.
//!
//! Calls `generateContent` on the regional Vertex AI endpoint. Access
//! tokens come either from configuration or from the GCE metadata
//! server, cached until shortly before they expire.
//!
//! # Configuration
//!
//! ```ignore
//! let config = GeminiConfig::new("my-project", "asia-northeast3")
//!     .with_model("gemini-1.5-flash");
//!
//! let provider = GeminiProvider::new(config)?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, MessageRole,
    ProviderInfo, ResponseFormat, TokenUsage,
};

/// GCE metadata endpoint issuing tokens for the default service account.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the metadata token expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub project_id: String,
    pub region: String,
    /// Model to use (e.g., "gemini-1.5-flash", "gemini-1.5-pro").
    pub model: String,
    /// Static bearer token; when absent the metadata server is asked.
    access_token: Option<Secret<String>>,
    /// Overrides the regional endpoint (tests, proxies).
    pub base_url: Option<String>,
    pub metadata_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl GeminiConfig {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            model: "gemini-1.5-flash".to_string(),
            access_token: None,
            base_url: None,
            metadata_url: METADATA_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(25),
            max_retries: 1,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(Secret::new(token.into()));
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.region));
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            base, self.project_id, self.region, self.model
        )
    }
}

struct CachedToken {
    value: Secret<String>,
    refresh_at: Instant,
}

/// Vertex AI Gemini provider implementation.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
    token: RwLock<Option<CachedToken>>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::InvalidRequest(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
        })
    }

    /// Returns a bearer token, fetching one from the metadata server if needed.
    async fn access_token(&self) -> Result<String, AIError> {
        if let Some(ref token) = self.config.access_token {
            return Ok(token.expose_secret().clone());
        }

        {
            let cached = self.token.read().await;
            if let Some(ref token) = *cached {
                if Instant::now() < token.refresh_at {
                    return Ok(token.value.expose_secret().clone());
                }
            }
        }

        let response = self
            .client
            .get(&self.config.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AIError::network(format!("metadata server: {}", e)))?;

        if !response.status().is_success() {
            return Err(AIError::AuthenticationFailed);
        }

        let body: MetadataToken = response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("metadata token: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in);
        let token = body.access_token.clone();
        *self.token.write().await = Some(CachedToken {
            value: Secret::new(body.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });

        Ok(token)
    }

    /// Converts our request to Gemini's format.
    fn to_gemini_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|msg| GeminiContent {
                role: match msg.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                }
                .to_string(),
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: request.system_prompt.as_ref().map(|prompt| GeminiInstruction {
                parts: vec![GeminiPart {
                    text: prompt.clone(),
                }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
                response_mime_type: match request.response_format {
                    ResponseFormat::Json => Some("application/json"),
                    ResponseFormat::Text => None,
                },
            },
        }
    }

    async fn send_request(&self, request: &CompletionRequest) -> Result<Response, AIError> {
        let token = self.access_token().await?;
        let body = self.to_gemini_request(request);

        self.client
            .post(self.config.endpoint())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AIError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    AIError::network(format!("Connection failed: {}", e))
                } else {
                    AIError::network(e.to_string())
                }
            })
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, AIError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => {
                // A revoked or expired cached token must not be reused.
                *self.token.write().await = None;
                Err(AIError::AuthenticationFailed)
            }
            429 => Err(AIError::rate_limited(30)),
            400 => Err(AIError::InvalidRequest(error_body)),
            500..=599 => Err(AIError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(AIError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    async fn parse_response(&self, response: Response) -> Result<CompletionResponse, AIError> {
        let response = self.handle_response_status(response).await?;

        let gemini: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse response: {}", e)))?;

        self.into_completion(gemini)
    }

    fn into_completion(&self, gemini: GeminiResponse) -> Result<CompletionResponse, AIError> {
        let candidate = gemini
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AIError::parse("No candidates in response"))?;

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
                return Err(AIError::content_filtered("candidate blocked by safety filters"))
            }
            _ => FinishReason::Other,
        };

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = gemini
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: gemini
                .model_version
                .unwrap_or_else(|| self.config.model.clone()),
            finish_reason,
        })
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let mut last_error = AIError::network("No attempts made");
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            let attempt = match self.send_request(&request).await {
                Ok(response) => self.parse_response(response).await,
                Err(err) => Err(err),
            };

            match attempt {
                Ok(completion) => {
                    tracing::debug!(
                        model = %completion.model,
                        operation = request.metadata.operation,
                        total_tokens = completion.usage.total_tokens,
                        "gemini completion"
                    );
                    return Ok(completion);
                }
                Err(err) => {
                    if !err.is_retryable() || retry_count >= self.config.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(
                        error = %err,
                        attempt = retry_count + 1,
                        operation = request.metadata.operation,
                        "gemini call failed, retrying"
                    );
                    last_error = err;
                }
            }

            sleep(Duration::from_secs(1 << retry_count)).await;
            retry_count += 1;
        }

        Err(last_error)
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("gemini", &self.config.model)
    }
}

// ----- Vertex AI API Types -----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserKey;
    use crate::ports::RequestMetadata;
    use serde_json::json;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(
            GeminiConfig::new("proj", "asia-northeast3")
                .with_model("gemini-1.5-pro")
                .with_access_token("tok"),
        )
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(UserKey::new("u").unwrap(), "test"))
    }

    #[test]
    fn endpoint_is_regional_vertex_url() {
        let config = GeminiConfig::new("proj", "asia-northeast3").with_model("gemini-1.5-pro");
        assert_eq!(
            config.endpoint(),
            "https://asia-northeast3-aiplatform.googleapis.com/v1/projects/proj/locations/asia-northeast3/publishers/google/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn base_url_override_keeps_path() {
        let config = GeminiConfig::new("p", "r").with_base_url("http://localhost:9000");
        assert!(config
            .endpoint()
            .starts_with("http://localhost:9000/v1/projects/p/locations/r/"));
    }

    #[test]
    fn request_maps_roles_and_json_mode() {
        let body = provider().to_gemini_request(
            &request()
                .with_system_prompt("sys")
                .with_message(MessageRole::User, "기침")
                .with_message(MessageRole::Assistant, "언제부터요?")
                .expecting_json(),
        );
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn text_mode_omits_mime_type() {
        let body = provider().to_gemini_request(&request().with_message(MessageRole::User, "x"));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["generationConfig"].get("responseMimeType").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn response_parts_are_joined() {
        let gemini: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "열이 "}, {"text": "나나요?"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        }))
        .unwrap();

        let completion = provider().into_completion(gemini).unwrap();
        assert_eq!(completion.content, "열이 나나요?");
        assert_eq!(completion.usage.total_tokens, 16);
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.model, "gemini-1.5-pro");
    }

    #[test]
    fn safety_block_is_content_filtered() {
        let gemini: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();

        assert!(matches!(
            provider().into_completion(gemini),
            Err(AIError::ContentFiltered { .. })
        ));
    }

    #[test]
    fn empty_candidates_is_parse_error() {
        let gemini: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(provider().into_completion(gemini), Err(AIError::Parse(_))));
    }

    #[tokio::test]
    async fn static_token_is_used_without_metadata_call() {
        assert_eq!(provider().access_token().await.unwrap(), "tok");
    }
}
