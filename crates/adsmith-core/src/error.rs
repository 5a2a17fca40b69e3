//! Error types for Adsmith

use thiserror::Error;

/// Result type alias using Adsmith's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Adsmith error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Credential errors (E001-E099)
    #[error("GEMINI_API_KEY not found. Set it in your environment or a .env file.")]
    TextApiKeyMissing,

    #[error("STABILITY_API_KEY not found. Set it in your environment or a .env file.")]
    ImageApiKeyMissing,

    #[error("Invalid API key for {0}. Check the key in your environment.")]
    InvalidApiKey(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Language model error: {0}")]
    LlmError(String),

    #[error("Rate limited. Wait {0} seconds and try again.")]
    RateLimited(u64),

    // Image generation errors (E200-E299)
    #[error("Image model is not accessible: {0}. Your credits may have ended.")]
    CreditsExhausted(String),

    #[error("Image API error ({status}): {message}")]
    ImageApiError { status: u16, message: String },

    #[error("Image engine '{0}' not found.")]
    ImageEngineNotFound(String),

    #[error("Stability AI refused access: {0}")]
    ImageAccessDenied(String),

    // Image processing errors (E300-E399)
    #[error("Failed to decode image: {0}")]
    ImageDecodeError(String),

    #[error("Failed to encode image: {0}")]
    ImageEncodeError(String),

    // Packaging errors (E400-E499)
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    // Campaign errors (E500-E599)
    #[error(
        "No ad variations could be generated ({0} attempted). Check your API keys and credits."
    )]
    NoAssetsGenerated(usize),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::TextApiKeyMissing => "E001",
            Self::ImageApiKeyMissing => "E002",
            Self::InvalidApiKey(_) => "E003",
            Self::NetworkError(_) => "E100",
            Self::LlmError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::CreditsExhausted(_) => "E200",
            Self::ImageApiError { .. } => "E201",
            Self::ImageEngineNotFound(_) => "E202",
            Self::ImageAccessDenied(_) => "E203",
            Self::ImageDecodeError(_) => "E300",
            Self::ImageEncodeError(_) => "E301",
            Self::ArchiveError(_) => "E400",
            Self::NoAssetsGenerated(_) => "E500",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::TextApiKeyMissing => Some("export GEMINI_API_KEY=<key>".to_string()),
            Self::ImageApiKeyMissing => Some("export STABILITY_API_KEY=<key>".to_string()),
            Self::InvalidApiKey(_) => Some("adsmith doctor".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::CreditsExhausted(_) => {
                Some("Check your Stability AI account balance".to_string())
            }
            Self::ImageEngineNotFound(_) => {
                Some("adsmith config set image.engine <id>".to_string())
            }
            Self::ImageAccessDenied(_) => {
                Some("Check that your Stability AI plan includes image.engine".to_string())
            }
            Self::ConfigError(_) => Some("adsmith config list".to_string()),
            _ => None,
        }
    }

    /// Whether a failure on a single variation should stop the whole campaign.
    ///
    /// Exhausted credits, rejected keys and refused engine access fail every
    /// remaining request the same way.
    pub fn is_fatal_for_campaign(&self) -> bool {
        matches!(
            self,
            Self::CreditsExhausted(_)
                | Self::InvalidApiKey(_)
                | Self::ImageApiKeyMissing
                | Self::ImageEngineNotFound(_)
                | Self::ImageAccessDenied(_)
        )
    }
}
