//! Shared transport concerns for the vault-attributes crates.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - Blocking HTTP client configuration and building
//! - Retry policies with exponential backoff
//! - Circuit breaker pattern for resilience
//! - Tracing subscriber initialisation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod error;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{PlatformError, Retryable};
pub use http::{HttpConfig, build_http_client};
pub use retry::{RetryConfig, RetryPolicy};
pub use tracing_config::{LogFormat, TracingConfig, init_tracing};
