//! Centralized transport error types.
//!
//! Every error is classified as retryable or not, which lets the retry
//! policy decide whether another attempt is worthwhile.

use thiserror::Error;

/// Classification shared by every error the retry policy can see.
pub trait Retryable {
    /// Whether the failed operation may succeed if attempted again.
    fn is_retryable(&self) -> bool;
}

/// Common error type for transport operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Circuit breaker is open for the specified service
    #[error("Circuit breaker open for {service}")]
    CircuitOpen {
        /// The service name that has an open circuit
        service: String,
    },

    /// Service is temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Rate limit exceeded
    #[error("Rate limited")]
    RateLimited,

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use vault_attr_common::PlatformError;
    ///
    /// assert!(PlatformError::RateLimited.is_retryable());
    /// assert!(!PlatformError::circuit_open("vault").is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited | Self::Timeout(_)
        )
    }

    /// Create a circuit open error for the given service.
    #[must_use]
    pub fn circuit_open(service: impl Into<String>) -> Self {
        Self::CircuitOpen {
            service: service.into(),
        }
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl Retryable for PlatformError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(PlatformError::RateLimited.is_retryable());
        assert!(PlatformError::Unavailable("test".to_string()).is_retryable());
        assert!(PlatformError::Timeout("test".to_string()).is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!PlatformError::invalid_input("test").is_retryable());
        assert!(!PlatformError::circuit_open("test").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = PlatformError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");

        let err = PlatformError::circuit_open("vault");
        assert_eq!(err.to_string(), "Circuit breaker open for vault");
    }
}
