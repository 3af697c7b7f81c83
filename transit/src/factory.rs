//! Transit provider factory.

use crate::client::TransitClient;
use crate::config::TransitConfig;
use crate::error::TransitResult;
use crate::memory::MemoryTransit;
use crate::provider::TransitProvider;
use std::sync::Arc;
use tracing::info;

/// Factory for creating the transit provider described by a configuration.
pub struct TransitFactory;

impl TransitFactory {
    /// Create a provider based on configuration.
    ///
    /// Returns the HTTP client when Vault is enabled, otherwise the
    /// in-memory transit.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: TransitConfig) -> TransitResult<Arc<dyn TransitProvider>> {
        if config.enabled {
            info!(addr = %config.addr, "Using Vault transit");
            return Ok(Arc::new(TransitClient::new(config)?));
        }

        let memory = MemoryTransit::new()
            .with_context(config.convergent_context.unwrap_or_default())
            .with_warning(config.in_memory_warning);
        Ok(Arc::new(memory))
    }

    /// Create a provider from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if the environment is invalid or client creation fails.
    pub fn from_env() -> TransitResult<Arc<dyn TransitProvider>> {
        Self::from_config(TransitConfig::from_env()?)
    }
}
