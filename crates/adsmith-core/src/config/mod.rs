//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Environment variable holding the language model API key
pub const TEXT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable holding the image model API key
pub const IMAGE_API_KEY_ENV: &str = "STABILITY_API_KEY";

/// Fewest variations a campaign may request
pub const MIN_VARIATIONS: usize = 5;

/// Most variations a campaign may request
pub const MAX_VARIATIONS: usize = 10;

/// Adsmith configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub composite: CompositeConfig,
    pub campaign: CampaignConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    /// Output token cap; unset leaves the model's own limit in place
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_host: String,
    pub engine: String,
    pub width: u32,
    pub height: u32,
    /// How much of the init canvas survives into the result (0.0-1.0)
    pub strength: f32,
    pub cfg_scale: f32,
    pub negative_prompt: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Product height as a fraction of background height
    pub product_height_ratio: f64,
    /// Upper bound on product width as a fraction of background width
    pub product_max_width_ratio: f64,
    /// Gap under the product as a fraction of background height
    pub product_bottom_margin_ratio: f64,
    /// Logo width as a fraction of background width
    pub logo_width_ratio: f64,
    /// Logo inset from the top-right corner as a fraction of background width
    pub logo_margin_ratio: f64,
    pub background_brightness: f32,
    pub background_contrast: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    pub default_variations: usize,
    pub request_delay_ms: u64,
    pub archive_name: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-pro".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1".to_string(),
            temperature: 0.9,
            max_output_tokens: None,
            timeout_secs: 30,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: "https://api.stability.ai".to_string(),
            engine: "stable-diffusion-xl-1024-v1-0".to_string(),
            width: 1024,
            height: 1024,
            strength: 0.35,
            cfg_scale: 7.0,
            negative_prompt:
                "blurry, low quality, distorted, watermark, text, logo, product, person, human"
                    .to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            product_height_ratio: 0.4,
            product_max_width_ratio: 0.9,
            product_bottom_margin_ratio: 0.05,
            logo_width_ratio: 0.15,
            logo_margin_ratio: 0.02,
            background_brightness: 1.0,
            background_contrast: 1.0,
        }
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            default_variations: MIN_VARIATIONS,
            request_delay_ms: 500,
            archive_name: "ad_creatives.zip".to_string(),
        }
    }
}

/// Reads an API key from the environment, refusing keys stored in config
fn resolve_key(stored: &Option<String>, env_name: &str) -> anyhow::Result<Option<String>> {
    if stored.is_some() {
        return Err(anyhow!(
            "API keys must be provided via environment variables, not stored in configuration"
        ));
    }
    Ok(env::var(env_name).ok().filter(|k| !k.trim().is_empty()))
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        "***".to_string()
    } else {
        format!("***{}", chars[chars.len() - 4..].iter().collect::<String>())
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        resolve_key(&self.api_key, TEXT_API_KEY_ENV)
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        Ok(self.resolved_api_key()?.map(|k| redact(&k)))
    }
}

impl ImageConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        resolve_key(&self.api_key, IMAGE_API_KEY_ENV)
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        Ok(self.resolved_api_key()?.map(|k| redact(&k)))
    }
}

const KEYS: &[&str] = &[
    "llm.model",
    "llm.api_base",
    "llm.temperature",
    "llm.max_output_tokens",
    "llm.timeout_secs",
    "llm.api_key",
    "image.api_host",
    "image.engine",
    "image.width",
    "image.height",
    "image.strength",
    "image.cfg_scale",
    "image.negative_prompt",
    "image.timeout_secs",
    "image.api_key",
    "composite.product_height_ratio",
    "composite.product_max_width_ratio",
    "composite.product_bottom_margin_ratio",
    "composite.logo_width_ratio",
    "composite.logo_margin_ratio",
    "composite.background_brightness",
    "composite.background_contrast",
    "campaign.default_variations",
    "campaign.request_delay_ms",
    "campaign.archive_name",
];

/// Shown for optional values that are not set
const UNSET: &str = "unset";

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

fn check_ratio(name: &str, value: f64) -> anyhow::Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(anyhow!("{} must be in (0.0, 1.0], got {}", name, value));
    }
    Ok(())
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("ADSMITH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("adsmith")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist.
    ///
    /// `GEMINI_MODEL_NAME` and `GEMINI_API_BASE` override the stored values.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load the stored configuration without environment overrides
    pub fn load_file() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply environment-style overrides from a lookup function
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("GEMINI_MODEL_NAME").filter(|v| !v.trim().is_empty()) {
            self.llm.model = model.trim().to_string();
        }
        if let Some(base) = lookup("GEMINI_API_BASE").filter(|v| !v.trim().is_empty()) {
            self.llm.api_base = base.trim().trim_end_matches('/').to_string();
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.resolved_api_key()?;
        self.image.resolved_api_key()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if !(0.0..=1.0).contains(&self.image.strength) {
            return Err(anyhow!("Image strength must be between 0.0 and 1.0"));
        }
        if self.image.width == 0
            || self.image.height == 0
            || self.image.width % 64 != 0
            || self.image.height % 64 != 0
        {
            return Err(anyhow!(
                "Image dimensions must be non-zero multiples of 64, got {}x{}",
                self.image.width,
                self.image.height
            ));
        }

        let c = &self.composite;
        check_ratio("composite.product_height_ratio", c.product_height_ratio)?;
        check_ratio("composite.product_max_width_ratio", c.product_max_width_ratio)?;
        check_ratio("composite.logo_width_ratio", c.logo_width_ratio)?;
        if !(0.0..1.0).contains(&c.product_bottom_margin_ratio) {
            return Err(anyhow!("composite.product_bottom_margin_ratio must be in [0.0, 1.0)"));
        }
        if !(0.0..1.0).contains(&c.logo_margin_ratio) {
            return Err(anyhow!("composite.logo_margin_ratio must be in [0.0, 1.0)"));
        }
        if !(c.background_brightness >= 0.0 && c.background_brightness.is_finite())
            || !(c.background_contrast >= 0.0 && c.background_contrast.is_finite())
        {
            return Err(anyhow!(
                "Brightness and contrast factors must be finite and non-negative"
            ));
        }

        if !(MIN_VARIATIONS..=MAX_VARIATIONS).contains(&self.campaign.default_variations) {
            return Err(anyhow!(
                "campaign.default_variations must be between {} and {}",
                MIN_VARIATIONS,
                MAX_VARIATIONS
            ));
        }
        if self.campaign.archive_name.trim().is_empty() {
            return Err(anyhow!("campaign.archive_name must not be empty"));
        }

        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.model" => Ok(self.llm.model.clone()),
            "llm.api_base" => Ok(self.llm.api_base.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_output_tokens" => Ok(self
                .llm
                .max_output_tokens
                .map_or_else(|| UNSET.to_string(), |max| max.to_string())),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            "image.api_host" => Ok(self.image.api_host.clone()),
            "image.engine" => Ok(self.image.engine.clone()),
            "image.width" => Ok(self.image.width.to_string()),
            "image.height" => Ok(self.image.height.to_string()),
            "image.strength" => Ok(self.image.strength.to_string()),
            "image.cfg_scale" => Ok(self.image.cfg_scale.to_string()),
            "image.negative_prompt" => Ok(self.image.negative_prompt.clone()),
            "image.timeout_secs" => Ok(self.image.timeout_secs.to_string()),

            "composite.product_height_ratio" => Ok(self.composite.product_height_ratio.to_string()),
            "composite.product_max_width_ratio" => {
                Ok(self.composite.product_max_width_ratio.to_string())
            }
            "composite.product_bottom_margin_ratio" => {
                Ok(self.composite.product_bottom_margin_ratio.to_string())
            }
            "composite.logo_width_ratio" => Ok(self.composite.logo_width_ratio.to_string()),
            "composite.logo_margin_ratio" => Ok(self.composite.logo_margin_ratio.to_string()),
            "composite.background_brightness" => {
                Ok(self.composite.background_brightness.to_string())
            }
            "composite.background_contrast" => Ok(self.composite.background_contrast.to_string()),

            "campaign.default_variations" => Ok(self.campaign.default_variations.to_string()),
            "campaign.request_delay_ms" => Ok(self.campaign.request_delay_ms.to_string()),
            "campaign.archive_name" => Ok(self.campaign.archive_name.clone()),

            // API keys (special handling - show redacted)
            "llm.api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(format!("(not set - use {} env var)", TEXT_API_KEY_ENV)),
            },
            "image.api_key" => match self.image.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(format!("(not set - use {} env var)", IMAGE_API_KEY_ENV)),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `adsmith config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.model" => self.llm.model = value.trim().to_string(),
            "llm.api_base" => self.llm.api_base = value.trim().trim_end_matches('/').to_string(),
            "llm.temperature" => {
                let temp: f32 = parse(key, value)?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_output_tokens" => {
                self.llm.max_output_tokens = match value.trim() {
                    "" | UNSET => None,
                    limit => Some(parse(key, limit)?),
                }
            }
            "llm.timeout_secs" => self.llm.timeout_secs = parse(key, value)?,

            "image.api_host" => {
                self.image.api_host = value.trim().trim_end_matches('/').to_string()
            }
            "image.engine" => self.image.engine = value.trim().to_string(),
            "image.width" => self.image.width = parse(key, value)?,
            "image.height" => self.image.height = parse(key, value)?,
            "image.strength" => {
                let strength: f32 = parse(key, value)?;
                if !(0.0..=1.0).contains(&strength) {
                    return Err(anyhow!("Image strength must be between 0.0 and 1.0"));
                }
                self.image.strength = strength;
            }
            "image.cfg_scale" => self.image.cfg_scale = parse(key, value)?,
            "image.negative_prompt" => self.image.negative_prompt = value.to_string(),
            "image.timeout_secs" => self.image.timeout_secs = parse(key, value)?,

            "composite.product_height_ratio" => {
                self.composite.product_height_ratio = parse(key, value)?
            }
            "composite.product_max_width_ratio" => {
                self.composite.product_max_width_ratio = parse(key, value)?
            }
            "composite.product_bottom_margin_ratio" => {
                self.composite.product_bottom_margin_ratio = parse(key, value)?
            }
            "composite.logo_width_ratio" => self.composite.logo_width_ratio = parse(key, value)?,
            "composite.logo_margin_ratio" => self.composite.logo_margin_ratio = parse(key, value)?,
            "composite.background_brightness" => {
                self.composite.background_brightness = parse(key, value)?
            }
            "composite.background_contrast" => {
                self.composite.background_contrast = parse(key, value)?
            }

            "campaign.default_variations" => {
                let n: usize = parse(key, value)?;
                if !(MIN_VARIATIONS..=MAX_VARIATIONS).contains(&n) {
                    return Err(anyhow!(
                        "Variations must be between {} and {}",
                        MIN_VARIATIONS,
                        MAX_VARIATIONS
                    ));
                }
                self.campaign.default_variations = n;
            }
            "campaign.request_delay_ms" => self.campaign.request_delay_ms = parse(key, value)?,
            "campaign.archive_name" => self.campaign.archive_name = value.trim().to_string(),

            // API keys cannot be set via config
            "llm.api_key" | "image.api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the {} or {} environment variable instead.",
                    TEXT_API_KEY_ENV,
                    IMAGE_API_KEY_ENV
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `adsmith config list` to see available keys.",
                    key
                ));
            }
        }

        self.validate()
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
