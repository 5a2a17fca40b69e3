//! Background generation
//!
//! Scenes are rendered by a diffusion model from a text prompt. The user's
//! product never goes to the model; it is composited afterwards.

mod canvas;
mod client;
mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use canvas::{base_canvas, base_canvas_png};
pub use client::{ImageClient, ImageClientBuilder};
pub use types::{BackgroundRequest, ImageFormat, ImageResponse};

/// Anything that can render a background for a scene prompt
#[async_trait]
pub trait BackgroundGenerator: Send + Sync {
    async fn generate(&self, request: &BackgroundRequest) -> Result<ImageResponse>;
}
