//! HTTP client for OpenAI-compatible model servers
//!
//! Used both for the hosted provider and for a model server running on the
//! loopback interface. Maps transport and status failures onto the provider
//! error taxonomy so the fallback chains can advance on any of them.

use std::time::Duration;

use reqwest::Client as HttpClient;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, LlmResponse, Message,
};

/// Default hosted API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default per-request timeout when the builder is not given one
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for chat completion and embedding endpoints
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    /// Name used in errors and logs ("hosted", "local", ...)
    provider: String,
    /// Bearer token; local servers usually run without one
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Builder for creating an LlmClient
pub struct LlmClientBuilder {
    provider: String,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: f32,
    max_tokens: usize,
    timeout: Option<Duration>,
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new("hosted")
    }
}

impl LlmClientBuilder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key: None,
            base_url: None,
            model: None,
            temperature: 0.7,
            max_tokens: 100,
            timeout: None,
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the hosted API)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Transport-level timeout; callers still bound each call themselves
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let model = self
            .model
            .ok_or_else(|| Error::ConfigError(format!("{}: model is required", self.provider)))?;

        let http_client = HttpClient::builder()
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            )
            .build()
            .map_err(|e| Error::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(LlmClient {
            http_client,
            provider: self.provider,
            api_key: self.api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

impl LlmClient {
    pub fn builder(provider: impl Into<String>) -> LlmClientBuilder {
        LlmClientBuilder::new(provider)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a chat completion request
    pub async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let request = ChatRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            provider = %self.provider,
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self.post(&url).json(&request).send().await.map_err(|e| {
            Error::ProviderUnavailable(format!("{}: {}", self.provider, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            Error::InferenceError(format!("{}: failed to parse response: {}", self.provider, e))
        })?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::EmptyResponse(self.provider.clone()))
    }

    /// Generate an embedding for a single text
    pub async fn embed(&self, text: &str, dimensions: Option<usize>) -> Result<Vec<f32>> {
        let mut request = EmbeddingRequest::new(&self.model, text);
        if let Some(dimensions) = dimensions {
            request = request.with_dimensions(dimensions);
        }
        let url = format!("{}/embeddings", self.base_url);

        debug!(provider = %self.provider, model = %request.model, "Sending embedding request");

        let response = self.post(&url).json(&request).send().await.map_err(|e| {
            Error::ProviderUnavailable(format!("{}: {}", self.provider, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            Error::InferenceError(format!("{}: failed to parse response: {}", self.provider, e))
        })?;

        embedding_response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| Error::EmptyResponse(self.provider.clone()))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http_client.post(url).header("X-Title", "Faqbot");
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Handle error responses from the API
    async fn handle_error_response<T>(
        &self,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> Result<T> {
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(&self.provider, status.as_u16(), &body))
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy
fn classify_status(provider: &str, status: u16, body: &str) -> Error {
    match status {
        401 | 403 => Error::ProviderUnavailable(format!(
            "{}: unauthorized, set FAQBOT_API_KEY or OPENAI_API_KEY",
            provider
        )),
        404 => Error::ModelLoadError(format!("{}: model not found: {}", provider, body)),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(60)),
        500..=599 => {
            Error::ProviderUnavailable(format!("{}: server error ({}): {}", provider, status, body))
        }
        _ => Error::InferenceError(format!("{}: HTTP error {}: {}", provider, status, body)),
    }
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}
