//! Background generation client for the Stability AI REST API
//!
//! Uses the v1 `image-to-image` endpoint with a neutral gradient as the init
//! image, so every scene comes back at the same size with soft studio light.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::{Error, Result};

use super::BackgroundGenerator;
use super::canvas::base_canvas_png;
use super::types::{BackgroundRequest, ImageResponse};

/// Image generation client for Stability AI
#[derive(Clone)]
pub struct ImageClient {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    engine: String,
}

impl std::fmt::Debug for ImageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClient")
            .field("base_url", &self.base_url)
            .field("engine", &self.engine)
            .finish()
    }
}

/// Builder for ImageClient
pub struct ImageClientBuilder {
    config: Option<ImageConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl Default for ImageClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    /// Set the image configuration (engine, host, timeout)
    pub fn config(mut self, config: ImageConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL (defaults to the configured host)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the ImageClient
    pub fn build(self) -> Result<ImageClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::ImageApiKeyMissing)?;

        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(config.timeout_secs));

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| config.api_host.clone())
            .trim_end_matches('/')
            .to_string();

        Ok(ImageClient {
            http_client,
            api_key,
            base_url,
            engine: config.engine,
        })
    }
}

impl ImageClient {
    /// Create a new ImageClient with the given configuration and API key
    pub fn new(config: ImageConfig, api_key: impl Into<String>) -> Result<Self> {
        ImageClientBuilder::new().config(config).api_key(api_key).build()
    }

    /// Create a new builder
    pub fn builder() -> ImageClientBuilder {
        ImageClientBuilder::new()
    }

    /// Engine id used for generation
    pub fn engine(&self) -> &str {
        &self.engine
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/generation/{}/image-to-image", self.base_url, self.engine)
    }

    /// Generate one background for a scene description
    pub async fn generate_background(&self, request: &BackgroundRequest) -> Result<ImageResponse> {
        let start = Instant::now();
        let seed = request.seed.unwrap_or_else(rand::random::<u32>);

        let init_image = base_canvas_png(request.width, request.height)?;
        let form = build_form(request, init_image, seed)?;

        debug!(
            engine = %self.engine,
            seed,
            prompt = %request.prompt,
            "Sending image-to-image request"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body, &self.engine));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| Error::ImageApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })?;

        let (image_data, returned_seed) = decode_first_artifact(parsed)?;
        let generation_time = start.elapsed().as_millis() as u64;

        info!(
            engine = %self.engine,
            seed = returned_seed.unwrap_or(seed),
            time_ms = generation_time,
            size_bytes = image_data.len(),
            "Background generated"
        );

        Ok(ImageResponse::new(
            image_data,
            self.engine.clone(),
            returned_seed.or(Some(seed)),
            generation_time,
        ))
    }
}

#[async_trait]
impl BackgroundGenerator for ImageClient {
    async fn generate(&self, request: &BackgroundRequest) -> Result<ImageResponse> {
        self.generate_background(request).await
    }
}

/// Text fields of the v1 image-to-image form, in the order they are sent
fn form_fields(request: &BackgroundRequest, seed: u32) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("init_image_mode", "IMAGE_STRENGTH".to_string()),
        ("image_strength", request.strength.to_string()),
        ("text_prompts[0][text]", request.prompt.clone()),
        ("text_prompts[0][weight]", "1".to_string()),
    ];

    if let Some(negative) = &request.negative_prompt {
        fields.push(("text_prompts[1][text]", negative.clone()));
        fields.push(("text_prompts[1][weight]", "-1".to_string()));
    }

    fields.push(("cfg_scale", request.cfg_scale.to_string()));
    fields.push(("seed", seed.to_string()));
    fields.push(("samples", "1".to_string()));
    fields
}

/// Multipart body for the v1 image-to-image endpoint
fn build_form(request: &BackgroundRequest, init_image: Vec<u8>, seed: u32) -> Result<Form> {
    let init = Part::bytes(init_image)
        .file_name("base.png")
        .mime_str("image/png")
        .map_err(Error::NetworkError)?;

    let form = form_fields(request, seed)
        .into_iter()
        .fold(Form::new().part("init_image", init), |form, (name, value)| {
            form.text(name, value)
        });

    Ok(form)
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: String,
    #[serde(default)]
    seed: Option<u32>,
    #[serde(default)]
    finish_reason: Option<String>,
}

fn decode_first_artifact(response: GenerationResponse) -> Result<(Vec<u8>, Option<u32>)> {
    let artifact = response
        .artifacts
        .into_iter()
        .next()
        .ok_or_else(|| Error::ImageApiError {
            status: 200,
            message: "No artifacts in API response".to_string(),
        })?;

    if artifact.finish_reason.as_deref() == Some("ERROR") {
        return Err(Error::ImageApiError {
            status: 200,
            message: "Generation finished with an error".to_string(),
        });
    }

    let bytes = BASE64
        .decode(artifact.base64.trim())
        .map_err(|e| Error::ImageDecodeError(format!("Invalid base64: {}", e)))?;

    Ok((bytes, artifact.seed))
}

/// Translate a non-success HTTP status into an error
fn map_error_status(status: u16, body: &str, engine: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    match status {
        401 => Error::InvalidApiKey("Stability AI".to_string()),
        403 => Error::ImageAccessDenied(message),
        402 => Error::CreditsExhausted(engine.to_string()),
        404 => Error::ImageEngineNotFound(engine.to_string()),
        429 => Error::RateLimited(10),
        _ => Error::ImageApiError { status, message },
    }
}
