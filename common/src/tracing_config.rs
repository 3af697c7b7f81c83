//! Log subscriber setup for binaries and test harnesses.
//!
//! `RUST_LOG` always wins over the configured level. Library code only emits
//! events; nothing in the workspace installs a subscriber implicitly.

use crate::error::PlatformError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Compact,
    /// One JSON object per event, with the current span list
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(PlatformError::InvalidInput(format!("unknown log format {other:?}"))),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Event format
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "vault_transit=info,vault_attributes=info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl TracingConfig {
    /// Read `VAULT_LOG_LEVEL` and `VAULT_LOG_FORMAT` through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidInput`] for an unknown format.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PlatformError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) = lookup("VAULT_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.log_level = level.trim().to_string();
        }
        if let Some(format) = lookup("VAULT_LOG_FORMAT").filter(|v| !v.trim().is_empty()) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Replace the fallback filter directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Select the event format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the global subscriber.
///
/// Returns `false` when one is already installed, which is normal when
/// several tests in one binary ask for logging.
pub fn init_tracing(config: &TracingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.filter());
    match config.format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init().is_ok(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .try_init()
            .is_ok(),
    }
}
