//! Retry policy implementation with exponential backoff.
//!
//! Retries live at the transport boundary only. Callers above the crypto
//! facade see a single outcome per request.

use crate::error::Retryable;
use std::time::Duration;
use tracing::warn;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retry policy for executing blocking operations with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a retry policy with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(RetryConfig::default().with_max_retries(0))
    }

    /// Calculate the delay for a given attempt number.
    ///
    /// Uses exponential backoff with optional jitter of up to 25%.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay =
            self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            delay_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Check if an error should be retried.
    #[must_use]
    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Execute a blocking operation with retries.
    ///
    /// # Errors
    ///
    /// Returns the last error if all retries are exhausted, or the first
    /// non-retryable error.
    pub fn execute<F, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, error = %error, "Retrying after transient failure");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlatformError;
    use std::cell::Cell;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .without_jitter()
                .with_initial_delay(Duration::from_millis(1)),
        )
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_delay_calculation_no_jitter() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .without_jitter()
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(10)),
        );

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .without_jitter()
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_millis(150)),
        );

        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(150));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::with_defaults();

        assert!(policy.should_retry(&PlatformError::RateLimited, 0));
        assert!(policy.should_retry(&PlatformError::RateLimited, 2));
        assert!(!policy.should_retry(&PlatformError::RateLimited, 3));
        assert!(!policy.should_retry(&PlatformError::invalid_input("bad"), 0));
    }

    #[test]
    fn test_execute_success() {
        let result: Result<i32, PlatformError> = fast_policy().execute(|| Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_execute_recovers_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<&str, PlatformError> = fast_policy().execute(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(PlatformError::unavailable("connection reset"))
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_execute_non_retryable_error_runs_once() {
        let calls = Cell::new(0);
        let result: Result<i32, PlatformError> = fast_policy().execute(|| {
            calls.set(calls.get() + 1);
            Err(PlatformError::invalid_input("bad"))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_disabled_policy_never_retries() {
        let calls = Cell::new(0);
        let result: Result<i32, PlatformError> = RetryPolicy::disabled().execute(|| {
            calls.set(calls.get() + 1);
            Err(PlatformError::RateLimited)
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
