//! Background generation types
//!
//! Request and response types for image generation operations.

use serde::{Deserialize, Serialize};

/// Image encoding detected from returned bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless)
    #[default]
    Png,
    /// JPEG format (lossy, smaller)
    Jpeg,
    /// WebP format (modern, efficient)
    WebP,
}

impl ImageFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Get MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Detect the format from magic bytes, if it is one we know
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
            Some(Self::WebP)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Request for one generated background
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundRequest {
    /// Scene description
    pub prompt: String,
    /// What to keep out of the scene
    #[serde(default)]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Weight of the init canvas (0.0 = ignore it, 1.0 = keep it)
    pub strength: f32,
    pub cfg_scale: f32,
    /// Seed for reproducibility; random when absent
    #[serde(default)]
    pub seed: Option<u32>,
}

impl BackgroundRequest {
    /// Create a request with square 1024 output and default guidance
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            width: 1024,
            height: 1024,
            strength: 0.35,
            cfg_scale: 7.0,
            seed: None,
        }
    }

    /// Set the output size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the negative prompt
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.negative_prompt = if negative.trim().is_empty() {
            None
        } else {
            Some(negative)
        };
        self
    }

    /// Set the init image strength
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// Set the classifier-free guidance scale
    pub fn with_cfg_scale(mut self, cfg_scale: f32) -> Self {
        self.cfg_scale = cfg_scale;
        self
    }

    /// Set the seed for reproducibility
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Response from background generation
#[derive(Debug, Clone)]
pub struct ImageResponse {
    /// Raw image bytes
    pub image_data: Vec<u8>,
    pub format: ImageFormat,
    /// Engine that generated the image
    pub model_used: String,
    /// Seed actually used
    pub seed: Option<u32>,
    /// Generation time in milliseconds
    pub generation_time_ms: u64,
}

impl ImageResponse {
    /// Create a new image response
    pub fn new(
        image_data: Vec<u8>,
        model_used: impl Into<String>,
        seed: Option<u32>,
        generation_time_ms: u64,
    ) -> Self {
        let format = ImageFormat::detect(&image_data).unwrap_or_default();
        Self {
            image_data,
            format,
            model_used: model_used.into(),
            seed,
            generation_time_ms,
        }
    }

    /// Get the image size in bytes
    pub fn size_bytes(&self) -> usize {
        self.image_data.len()
    }
}
