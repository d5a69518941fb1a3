// Error types for socialpulse.
// Separates hard request failures from upstream conditions that adapters absorb.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Unexpected upstream response: {0}")]
    SchemaDrift(String),

    #[error("Server widget is disabled")]
    WidgetDisabled,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl PulseError {
    /// HTTP status reported to the caller when this error reaches the handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PulseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PulseError::NotFound(_) => StatusCode::NOT_FOUND,
            PulseError::WidgetDisabled
            | PulseError::Http(_)
            | PulseError::Status { .. }
            | PulseError::RateLimited { .. }
            | PulseError::SchemaDrift(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is a stable upstream answer worth caching.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, PulseError::WidgetDisabled)
    }

    /// Whether the failure must propagate to the caller instead of degrading.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            PulseError::InvalidInput(_) | PulseError::NotFound(_) | PulseError::WidgetDisabled
        )
    }

    /// Whether the upstream confirmed the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PulseError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
