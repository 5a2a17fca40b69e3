//! Adsmith Core Library
//!
//! This crate provides the core functionality for Adsmith, including:
//! - LLM integration (Gemini API) for scene ideas and ad copy
//! - Background generation (Stability AI image-to-image)
//! - Deterministic product and logo compositing
//! - The campaign pipeline and zip packaging
//! - Configuration with environment-only API keys

pub mod archive;
pub mod background;
pub mod campaign;
pub mod composite;
pub mod config;
pub mod error;
pub mod ideation;
pub mod llm;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::background::{BackgroundGenerator, ImageClient};
    pub use crate::campaign::{Campaign, CampaignOutput, CampaignRequest, Progress};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::llm::{LlmClient, TextGenerator};
}
