//! LLM integration - Gemini API
//!
//! This module provides:
//! - HTTP client for the `generateContent` endpoint
//! - Model listing for diagnostics
//! - The `TextGenerator` seam used by ideation

mod client;
mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::{LlmClient, LlmClientBuilder};
pub use types::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    LlmResponse, ModelInfo, Part, Role, UsageMetadata,
};

/// Anything that can turn a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
