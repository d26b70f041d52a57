//! Error types for Faqbot

use thiserror::Error;

/// Result type alias using Faqbot's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Faqbot error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Provider errors (E100-E199)
    #[error("Provider '{0}' is unavailable. Check the endpoint and your network connection.")]
    ProviderUnavailable(String),

    #[error("Rate limited by provider. Retry after {0} seconds.")]
    RateLimited(u64),

    #[error("Model failed to load: {0}")]
    ModelLoadError(String),

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Provider '{provider}' timed out after {millis}ms")]
    Timeout { provider: String, millis: u64 },

    #[error("Malformed vector: expected {expected} dimensions, got {actual}")]
    MalformedVector { expected: usize, actual: usize },

    #[error("Provider '{0}' returned an empty response")]
    EmptyResponse(String),

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
            Self::ProviderUnavailable(_) => "E100",
            Self::RateLimited(_) => "E101",
            Self::ModelLoadError(_) => "E110",
            Self::InferenceError(_) => "E111",
            Self::Timeout { .. } => "E120",
            Self::MalformedVector { .. } => "E130",
            Self::EmptyResponse(_) => "E131",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ProviderUnavailable(_) => Some("Check internet connection".to_string()),
            Self::RateLimited(secs) => Some(format!("Wait {} seconds before retrying", secs)),
            Self::ModelLoadError(_) => Some("faqbot config get generation.local_model".to_string()),
            Self::Timeout { .. } => Some("faqbot config set generation.timeout_ms <millis>".to_string()),
            Self::ConfigError(_) => Some("faqbot config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error comes from a provider call and should advance a fallback chain
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::RateLimited(_)
                | Self::ModelLoadError(_)
                | Self::InferenceError(_)
                | Self::Timeout { .. }
                | Self::MalformedVector { .. }
                | Self::EmptyResponse(_)
        )
    }
}
