//! Circuit breaker implementation for resilience.
//!
//! Protects callers from piling requests onto a crypto service that is
//! already failing. The breaker is shared by every entity instance using
//! the same client, so its state sits behind a lock and atomics.

use crate::PlatformError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, limited requests are allowed to test recovery
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of consecutive successes in half-open state to close the circuit
    pub success_threshold: u32,
    /// Time to wait before transitioning from open to half-open
    pub timeout: Duration,
    /// Maximum requests allowed in half-open state
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold.
    #[must_use]
    pub const fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the open-state timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    last_failure: Option<Instant>,
}

/// Circuit breaker for protecting external services.
///
/// Implements the circuit breaker pattern with three states:
/// - Closed: Normal operation, requests are allowed
/// - Open: Failure threshold exceeded, requests are rejected
/// - Half-Open: Testing recovery, limited requests allowed
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    failures: AtomicU32,
    successes: AtomicU32,
    half_open_requests: AtomicU32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    #[must_use]
    pub const fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                last_failure: None,
            }),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            half_open_requests: AtomicU32::new(0),
        }
    }

    /// Create a circuit breaker with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if a request is allowed.
    ///
    /// Returns `true` if the request should proceed, `false` if it should be rejected.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => match inner.last_failure {
                Some(last) if last.elapsed() >= self.config.timeout => {
                    inner.state = CircuitState::HalfOpen;
                    self.half_open_requests.store(1, Ordering::SeqCst);
                    self.successes.store(0, Ordering::SeqCst);
                    true
                }
                _ => false,
            },
            CircuitState::HalfOpen => {
                let current = self.half_open_requests.fetch_add(1, Ordering::SeqCst);
                current < self.config.half_open_max_requests
            }
        }
    }

    /// Gate a request for the named service.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::CircuitOpen`] when the request is rejected.
    pub fn check(&self, service: &str) -> Result<(), PlatformError> {
        if self.allow_request() {
            Ok(())
        } else {
            Err(PlatformError::circuit_open(service))
        }
    }

    /// Record a successful request.
    ///
    /// In half-open state, consecutive successes will close the circuit.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                let successes = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    self.failures.store(0, Ordering::SeqCst);
                    self.successes.store(0, Ordering::SeqCst);
                }
            }
            CircuitState::Closed => {
                self.failures.store(0, Ordering::SeqCst);
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed request.
    ///
    /// Consecutive failures will open the circuit.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                self.successes.store(0, Ordering::SeqCst);
            }
            CircuitState::Closed if failures >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                self.successes.store(0, Ordering::SeqCst);
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Get the current failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.last_failure = None;
        self.failures.store(0, Ordering::SeqCst);
        self.successes.store(0, Ordering::SeqCst);
        self.half_open_requests.store(0, Ordering::SeqCst);
    }
}
