//! Campaign pipeline
//!
//! One run turns a product photo, a logo and a short description into a set
//! of finished ad variations:
//!
//! 1. Ask the language model for one background scene per variation
//! 2. Render each scene and composite the product and logo onto it
//! 3. Ask the language model for one caption per variation
//!
//! Progress is reported through a caller-supplied sink so the CLI can print
//! it and tests can record it.

use std::fmt;
use std::time::Duration;

use image::RgbaImage;
use tracing::{info, warn};

use crate::background::{BackgroundGenerator, BackgroundRequest};
use crate::composite::{create_composite, decode_image, decode_rgba};
use crate::config::{CompositeConfig, Config, ImageConfig, MAX_VARIATIONS, MIN_VARIATIONS};
use crate::error::{Error, Result};
use crate::ideation::{SceneIdea, SceneWriter};
use crate::llm::TextGenerator;

/// Shortest accepted product description, after trimming
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// Inputs for one campaign run
#[derive(Debug, Clone)]
pub struct CampaignRequest {
    pub product: RgbaImage,
    pub logo: RgbaImage,
    pub description: String,
    pub variations: usize,
}

impl CampaignRequest {
    pub fn new(
        product: RgbaImage,
        logo: RgbaImage,
        description: impl Into<String>,
        variations: usize,
    ) -> Self {
        Self {
            product,
            logo,
            description: description.into().trim().to_string(),
            variations,
        }
    }

    /// Decode product and logo from encoded image files
    pub fn from_bytes(
        product: &[u8],
        logo: &[u8],
        description: impl Into<String>,
        variations: usize,
    ) -> Result<Self> {
        let product = decode_rgba(product)
            .map_err(|e| Error::InvalidInput(format!("product image: {}", e)))?;
        let logo =
            decode_rgba(logo).map_err(|e| Error::InvalidInput(format!("logo image: {}", e)))?;
        Ok(Self::new(product, logo, description, variations))
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.trim().chars().count() < MIN_DESCRIPTION_LEN {
            return Err(Error::InvalidInput(format!(
                "product description must be at least {} characters",
                MIN_DESCRIPTION_LEN
            )));
        }
        if !(MIN_VARIATIONS..=MAX_VARIATIONS).contains(&self.variations) {
            return Err(Error::InvalidInput(format!(
                "variations must be between {} and {}, got {}",
                MIN_VARIATIONS, MAX_VARIATIONS, self.variations
            )));
        }
        if self.product.width() == 0 || self.product.height() == 0 {
            return Err(Error::InvalidInput("product image is empty".to_string()));
        }
        if self.logo.width() == 0 || self.logo.height() == 0 {
            return Err(Error::InvalidInput("logo image is empty".to_string()));
        }
        Ok(())
    }
}

/// Pipeline progress events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Loading,
    Ideating,
    /// Starting variation `index` (1-based) of `total`
    Variation { index: usize, total: usize },
    VariationFailed {
        index: usize,
        total: usize,
        error: String,
    },
    Captioning,
    Done { succeeded: usize, failed: usize },
}

impl Progress {
    /// Overall completion, 0-100
    pub fn percent(&self) -> u8 {
        match self {
            Self::Loading => 10,
            Self::Ideating => 20,
            Self::Variation { index, total } | Self::VariationFailed { index, total, .. } => {
                let done = index.saturating_sub(1);
                (40 + 50 * done / (*total).max(1)) as u8
            }
            Self::Captioning => 90,
            Self::Done { .. } => 100,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading images"),
            Self::Ideating => write!(f, "Generating scene ideas"),
            Self::Variation { index, total } => {
                write!(f, "Generating ad variation {}/{}", index, total)
            }
            Self::VariationFailed {
                index,
                total,
                error,
            } => write!(f, "Variation {}/{} failed: {}", index, total, error),
            Self::Captioning => write!(f, "Writing ad copy"),
            Self::Done { succeeded, failed } => {
                write!(f, "Done: {} generated, {} failed", succeeded, failed)
            }
        }
    }
}

/// A finished ad variation
#[derive(Debug, Clone)]
pub struct CompositeAsset {
    /// 1-based variation number
    pub variation: usize,
    pub scene: SceneIdea,
    pub image: RgbaImage,
    pub caption: String,
}

/// A variation that could not be produced
#[derive(Debug, Clone)]
pub struct VariationFailure {
    pub variation: usize,
    pub scene: SceneIdea,
    pub code: &'static str,
    pub error: String,
}

/// Everything a campaign run produced
#[derive(Debug, Clone)]
pub struct CampaignOutput {
    pub assets: Vec<CompositeAsset>,
    pub failed: Vec<VariationFailure>,
    pub scenes: Vec<SceneIdea>,
    pub captions: Vec<String>,
}

impl CampaignOutput {
    /// Number of variations attempted
    pub fn variations(&self) -> usize {
        self.scenes.len()
    }
}

/// Runs the ideation, background and compositing steps for one campaign
pub struct Campaign<T, G> {
    writer: SceneWriter<T>,
    backgrounds: G,
    image: ImageConfig,
    composite: CompositeConfig,
    request_delay: Duration,
    seed: Option<u32>,
}

impl<T: TextGenerator, G: BackgroundGenerator> Campaign<T, G> {
    pub fn new(text: T, backgrounds: G, config: &Config) -> Self {
        Self {
            writer: SceneWriter::new(text),
            backgrounds,
            image: config.image.clone(),
            composite: config.composite.clone(),
            request_delay: Duration::from_millis(config.campaign.request_delay_ms),
            seed: None,
        }
    }

    /// Fix the base seed; variation `n` uses `seed + n - 1`
    pub fn with_seed(mut self, seed: Option<u32>) -> Self {
        self.seed = seed;
        self
    }

    /// Pause between background requests
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Run the whole pipeline
    pub async fn run<F>(
        &self,
        request: &CampaignRequest,
        mut on_progress: F,
    ) -> Result<CampaignOutput>
    where
        F: FnMut(Progress),
    {
        request.validate()?;
        let total = request.variations;
        on_progress(Progress::Loading);

        on_progress(Progress::Ideating);
        let scenes = self.writer.scene_ideas(&request.description, total).await;
        info!(variations = total, "Scene ideas ready");

        let mut assets = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for (i, scene) in scenes.iter().enumerate() {
            let index = i + 1;
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            on_progress(Progress::Variation { index, total });

            match self.render_variation(request, scene, i).await {
                Ok(image) => {
                    info!(variation = index, "Ad variation composited");
                    assets.push(CompositeAsset {
                        variation: index,
                        scene: scene.clone(),
                        image,
                        caption: String::new(),
                    });
                }
                Err(e) if e.is_fatal_for_campaign() => {
                    warn!(variation = index, error = %e, "Aborting campaign");
                    return Err(e);
                }
                Err(e) => {
                    warn!(variation = index, code = e.code(), error = %e, "Ad variation failed");
                    on_progress(Progress::VariationFailed {
                        index,
                        total,
                        error: e.to_string(),
                    });
                    failed.push(VariationFailure {
                        variation: index,
                        scene: scene.clone(),
                        code: e.code(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if assets.is_empty() {
            return Err(Error::NoAssetsGenerated(total));
        }

        on_progress(Progress::Captioning);
        let captions = self.writer.captions(&request.description, total).await;
        for asset in &mut assets {
            if let Some(caption) = captions.get(asset.variation - 1) {
                asset.caption = caption.clone();
            }
        }

        on_progress(Progress::Done {
            succeeded: assets.len(),
            failed: failed.len(),
        });

        Ok(CampaignOutput {
            assets,
            failed,
            scenes,
            captions,
        })
    }

    async fn render_variation(
        &self,
        request: &CampaignRequest,
        scene: &SceneIdea,
        offset: usize,
    ) -> Result<RgbaImage> {
        let mut background_request = BackgroundRequest::new(scene.as_str())
            .with_size(self.image.width, self.image.height)
            .with_strength(self.image.strength)
            .with_cfg_scale(self.image.cfg_scale)
            .with_negative_prompt(self.image.negative_prompt.clone());
        if let Some(seed) = self.seed {
            background_request = background_request.with_seed(seed.wrapping_add(offset as u32));
        }

        let response = self.backgrounds.generate(&background_request).await?;
        let background = decode_image(&response.image_data)?;

        Ok(create_composite(
            &background,
            &image::DynamicImage::ImageRgba8(request.product.clone()),
            &image::DynamicImage::ImageRgba8(request.logo.clone()),
            &self.composite,
        ))
    }
}
