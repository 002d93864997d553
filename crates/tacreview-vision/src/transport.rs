//! Vision model transport.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{VisionError, VisionResult};
use crate::metrics::record_request;
use crate::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part};

/// Default Gemini endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default analysis model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// An image attached to a request.
#[derive(Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One prompt plus one image.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub prompt: String,
    pub image: InlineImage,
}

/// The single network primitive of the vision client.
///
/// Returns the model's raw text output. Implementations do not retry.
#[async_trait]
pub trait VisionTransport: Send + Sync {
    async fn generate(&self, request: &VisionRequest) -> VisionResult<String>;
}

#[async_trait]
impl<T: VisionTransport + ?Sized> VisionTransport for Arc<T> {
    async fn generate(&self, request: &VisionRequest) -> VisionResult<String> {
        (**self).generate(request).await
    }
}

/// Configuration for the Gemini transport.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Transport calling the Gemini `generateContent` endpoint.
pub struct GeminiTransport {
    http: Client,
    config: GeminiConfig,
}

impl GeminiTransport {
    pub fn new(config: GeminiConfig) -> VisionResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(VisionError::config("Gemini API key is empty"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VisionError::Network)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_request(&self, request: &VisionRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: request.prompt.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: BASE64.encode(&request.image.data),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json",
            },
        }
    }
}

#[async_trait]
impl VisionTransport for GeminiTransport {
    async fn generate(&self, request: &VisionRequest) -> VisionResult<String> {
        let url = self.config.endpoint();
        let body = self.build_request(request);
        debug!(model = %self.config.model, bytes = request.image.data.len(), "Sending vision request");

        let started = Instant::now();
        let response = match self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                record_request("network", started.elapsed().as_secs_f64() * 1000.0);
                return Err(VisionError::Network(e));
            }
        };

        let status = response.status();
        record_request(status.as_str(), started.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_ms);
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Vision API returned an error");
            return Err(VisionError::from_http_status(
                status.as_u16(),
                message,
                retry_after_ms,
            ));
        }

        // A body cut off mid-read is a network fault, not a bad payload
        let bytes = response.bytes().await.map_err(VisionError::Network)?;
        let payload: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|e| VisionError::invalid_response(format!("Failed to parse Gemini response: {}", e)))?;

        payload.text().ok_or_else(|| {
            VisionError::invalid_response(format!(
                "No content in Gemini response (finish reason: {})",
                payload.finish_reason().unwrap_or("unknown")
            ))
        })
    }
}

/// Delay-seconds form of `Retry-After`, in milliseconds.
fn parse_retry_after_ms(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}
