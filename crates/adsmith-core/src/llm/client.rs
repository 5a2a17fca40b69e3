//! Gemini language model client
//!
//! Talks to the `generateContent` and `models` endpoints of the Generative
//! Language API. Requests are sent once; there is no retry layer.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::TextGenerator;
use super::types::{
    GenerateContentRequest, GenerateContentResponse, ListModelsResponse, LlmResponse, ModelInfo,
};

/// Gemini LLM client
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Builder for creating an LlmClient
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    /// Set the LLM configuration
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the configured `api_base`)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::TextApiKeyMissing)?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| config.api_base.clone())
            .trim_end_matches('/')
            .to_string();

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url,
        })
    }
}

impl LlmClient {
    /// Create a new LlmClient with the given configuration and API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new().config(config).api_key(api_key).build()
    }

    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Model used for generation
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Request body for a prompt. The output cap is only sent when configured,
    /// since thinking models spend part of it before writing any text.
    fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        let request =
            GenerateContentRequest::from_prompt(prompt).with_temperature(self.config.temperature);
        match self.config.max_output_tokens {
            Some(max) => request.with_max_output_tokens(max),
            None => request,
        }
    }

    /// Send a single-turn prompt and return the model's text
    pub async fn generate_text(&self, prompt: &str) -> Result<LlmResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.config.model);
        let request = self.build_request(prompt);

        debug!(
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "Sending generateContent request"
        );
        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmError(format!("Failed to parse response: {}", e)))?;

        let result = LlmResponse::from_api(&self.config.model, parsed).map_err(Error::LlmError)?;

        info!(
            model = %result.model,
            input_tokens = result.input_tokens,
            output_tokens = result.output_tokens,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Text generation complete"
        );

        Ok(result)
    }

    /// List models visible to this API key
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url);

        debug!(url = %url, "Listing models");

        let response = self
            .http_client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body));
        }

        let parsed: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmError(format!("Failed to parse model list: {}", e)))?;

        Ok(parsed.models)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt).await.map(|r| r.text)
    }
}

/// Translate a non-success HTTP status into an error
pub(crate) fn map_error_status(status: u16, body: &str) -> Error {
    let message = extract_error_message(body).unwrap_or_else(|| body.to_string());

    match status {
        400 => Error::LlmError(format!("Bad request: {}", message)),
        401 | 403 => Error::InvalidApiKey("Gemini".to_string()),
        404 => Error::LlmError(format!("Model not found or endpoint unavailable: {}", message)),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(60)),
        500..=599 => Error::LlmError(format!("Server error ({}): {}", status, message)),
        _ => Error::LlmError(format!("HTTP error {}: {}", status, message)),
    }
}

/// Pull `error.message` out of a Google API error body
fn extract_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Extract a retry delay in seconds from an error body.
///
/// Google reports it as a `RetryInfo` detail with a `retryDelay` like `"17s"`.
fn extract_retry_after(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(secs) = json.get("retry_after").and_then(|v| v.as_u64()) {
        return Some(secs);
    }
    json.get("error")?
        .get("details")?
        .as_array()?
        .iter()
        .filter_map(|d| d.get("retryDelay").and_then(|v| v.as_str()))
        .find_map(|delay| {
            let secs = delay.trim_end_matches('s');
            secs.parse::<f64>().ok().map(|s| s.ceil() as u64)
        })
}
