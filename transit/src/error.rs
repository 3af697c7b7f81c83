//! Transit error types using thiserror 2.0.
//!
//! Provides crypto-service errors with retryability classification
//! and integration with the shared platform errors.

use thiserror::Error;
use vault_attr_common::{PlatformError, Retryable};

/// Errors raised by a transit provider.
#[derive(Error, Debug)]
pub enum TransitError {
    /// Vault server unavailable
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transit key does not exist
    #[error("Transit key not found: {0}")]
    KeyNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The service answered with something that is not a usable result
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Platform error
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Name used for the error type when it crosses into the attribute layer.
pub type CryptoServiceError = TransitError;

/// Result type for transit operations.
pub type TransitResult<T> = Result<T, TransitError>;

impl TransitError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::RateLimited | Self::Http(_) => true,
            Self::Platform(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a key not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound(key.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status from Vault to an error.
    ///
    /// `detail` is Vault's error text, already stripped of the JSON envelope.
    #[must_use]
    pub fn from_status(status: u16, path: &str, detail: &str) -> Self {
        match status {
            400 if detail.contains("encryption key not found") => Self::not_found(path),
            400 => Self::invalid_response(format!("Status 400: {detail}")),
            403 => Self::PermissionDenied(path.to_string()),
            404 => Self::not_found(path),
            429 => Self::RateLimited,
            s if s >= 500 => Self::unavailable(format!("Status {s}: {detail}")),
            s => Self::invalid_response(format!("Unexpected status {s}: {detail}")),
        }
    }
}

impl Retryable for TransitError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}
