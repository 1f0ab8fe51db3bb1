//! OpenAI-compatible inference client.
//!
//! Sends one non-streaming chat completion request per call and returns the
//! first choice's text, or a parsed JSON object when structured output was
//! requested. The client never invents answers: every failure is returned to
//! the caller, which owns the fallback decision.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::config::PipelineSettings;
use super::errors::InferenceError;
use super::response_parser;
use super::types::{
    ApiErrorEnvelope, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Completion,
    ResponseMode,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// System instruction for structured (JSON) asks.
pub const STRUCTURED_SYSTEM_PROMPT: &str = "You are a helpful assistant that responds only \
    with a single valid JSON object. Do not add explanations, markdown or code fences.";

/// System instruction for natural-language asks.
pub const NATURAL_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Respond naturally and conversationally.";

// ─── Backend seam ────────────────────────────────────────────────────────────

/// Transport for a single chat completion call.
///
/// Returns the first choice's message content. Implemented by
/// [`OpenAiBackend`] for real endpoints and by scripted stubs in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, InferenceError>;
}

/// `POST {endpoint}/chat/completions` with a bearer credential.
pub struct OpenAiBackend {
    http: HttpClient,
    endpoint: String,
    request_timeout: Duration,
}

impl OpenAiBackend {
    /// Build a backend with connect and per-request timeouts.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, InferenceError> {
        Self::new(
            &settings.endpoint,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn send(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, InferenceError> {
        let url = self.completions_url();

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_secs: self.request_timeout.as_secs(),
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body_text)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!(status = status.as_u16(), %message, "model endpoint returned an error");
            return Err(InferenceError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.request_timeout.as_secs(),
                }
            } else {
                InferenceError::InvalidResponse {
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body_text).map_err(|e| InferenceError::InvalidResponse {
                reason: format!("not a chat completion: {e}"),
            })?;

        Ok(parsed.first_content())
    }
}

// ─── ModelClient ─────────────────────────────────────────────────────────────

/// Per-run model client: a backend, the sampling settings and the caller's
/// credential.
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn ChatBackend>,
    settings: PipelineSettings,
    credential: Option<String>,
}

impl ModelClient {
    /// Create a client. A blank credential is treated as absent; that only
    /// surfaces as [`InferenceError::Auth`] once a call is attempted.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        settings: PipelineSettings,
        credential: Option<String>,
    ) -> Self {
        let credential = credential
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self {
            backend,
            settings,
            credential,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Send `prompt` and post-process the answer according to `mode`.
    pub async fn complete(
        &self,
        prompt: &str,
        mode: ResponseMode,
    ) -> Result<Completion, InferenceError> {
        let text = self.fetch(prompt, mode).await?;
        Ok(match mode {
            ResponseMode::Structured => Completion::Structured(response_parser::parse(&text)),
            ResponseMode::Natural => Completion::Text(text),
        })
    }

    /// Natural-language completion.
    pub async fn complete_text(&self, prompt: &str) -> Result<String, InferenceError> {
        self.fetch(prompt, ResponseMode::Natural).await
    }

    /// Structured completion, run through the response parser.
    ///
    /// Unparsable output yields the parser sentinel, not an error.
    pub async fn complete_structured(
        &self,
        prompt: &str,
    ) -> Result<serde_json::Value, InferenceError> {
        let text = self.fetch(prompt, ResponseMode::Structured).await?;
        Ok(response_parser::parse(&text))
    }

    async fn fetch(&self, prompt: &str, mode: ResponseMode) -> Result<String, InferenceError> {
        let api_key = self.credential.as_deref().ok_or(InferenceError::Auth)?;
        let request = self.build_request(prompt, mode);

        // Metadata only: prompts can be large and may contain user data.
        tracing::info!(
            model = %request.model,
            mode = ?mode,
            temperature = request.temperature,
            prompt_chars = prompt.chars().count(),
            "=== LLM REQUEST ==="
        );

        let text = self.backend.send(api_key, &request).await?;

        tracing::debug!(response_chars = text.chars().count(), "=== LLM RESPONSE ===");
        Ok(text)
    }

    fn build_request(&self, prompt: &str, mode: ResponseMode) -> ChatCompletionRequest {
        let (system, temperature) = match mode {
            ResponseMode::Structured => {
                (STRUCTURED_SYSTEM_PROMPT, self.settings.structured_temperature)
            }
            ResponseMode::Natural => (NATURAL_SYSTEM_PROMPT, self.settings.natural_temperature),
        };

        ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
