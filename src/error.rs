//! Error types shared by all providers.

use thiserror::Error;

/// Main error type for all provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials are missing, invalid or were rejected by the vendor.
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// A vendor record was missing required fields or had the wrong shape.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The operation or media type is not supported by this provider.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// The vendor reported that the requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic vendor API error with message.
    #[error("API error: {0}")]
    Api(String),

    /// HTTP request failed.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether a single-item fetch should degrade to an absent result
    /// instead of failing the caller.
    pub fn is_soft_lookup_failure(&self) -> bool {
        matches!(
            self,
            ProviderError::NotFound(_) | ProviderError::Api(_) | ProviderError::InvalidData(_)
        )
    }
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
