//! Lifecycle controller configuration.

use crate::error::ConfigurationError;

/// Tunables of the [`AttributeController`](crate::AttributeController).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Mark an attribute dirty on every set, even when the value is unchanged
    pub always_dirty_on_set: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            always_dirty_on_set: true,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOption`] if a variable cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOption`] if a variable cannot be
    /// parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup("VAULT_ALWAYS_DIRTY_ON_SET").filter(|v| !v.trim().is_empty()) {
            config.always_dirty_on_set = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigurationError::InvalidOption {
                        attribute: "VAULT_ALWAYS_DIRTY_ON_SET".to_string(),
                        reason: format!("invalid boolean {v:?}"),
                    });
                }
            };
        }
        Ok(config)
    }

    /// Toggle dirtying on unchanged sets.
    #[must_use]
    pub const fn with_always_dirty_on_set(mut self, always: bool) -> Self {
        self.always_dirty_on_set = always;
        self
    }
}
