//! Transit client configuration.

use crate::error::{TransitError, TransitResult};
use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;
use vault_attr_common::{CircuitBreakerConfig, RetryConfig};

/// Default Vault address when `VAULT_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Default location of the Kubernetes service-account JWT.
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Transit client configuration.
#[derive(Debug)]
pub struct TransitConfig {
    /// Talk to a real Vault server; when false the in-memory transit is used
    pub enabled: bool,
    /// Vault server address
    pub addr: String,
    /// Static client token
    pub token: Option<SecretString>,
    /// Enterprise namespace sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    /// Kubernetes auth role, used when no static token is configured
    pub role: Option<String>,
    /// Service account token path
    pub token_path: String,
    /// Context used for convergent (derived-key) encryption
    pub convergent_context: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Transport retry behaviour
    pub retry: RetryConfig,
    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,
    /// Log a warning the first time the in-memory transit is used
    pub in_memory_warning: bool,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: DEFAULT_ADDR.to_string(),
            token: None,
            namespace: None,
            role: None,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            convergent_context: None,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            in_memory_warning: true,
        }
    }
}

impl TransitConfig {
    /// Create a configuration pointing at a Vault server with a static token.
    #[must_use]
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            enabled: true,
            addr: addr.into(),
            token: Some(SecretString::from(token.into())),
            ..Default::default()
        }
    }

    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first when present.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::InvalidConfig`] if a numeric or boolean
    /// variable cannot be parsed.
    pub fn from_env() -> TransitResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::InvalidConfig`] if a numeric or boolean
    /// variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> TransitResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("VAULT_ADDR") {
            config.addr = addr;
        }
        config.token = get("VAULT_TOKEN").map(SecretString::from);
        config.namespace = get("VAULT_NAMESPACE");
        config.role = get("VAULT_ROLE");
        if let Some(path) = get("VAULT_TOKEN_PATH") {
            config.token_path = path;
        }
        config.convergent_context = get("VAULT_CONVERGENT_CONTEXT");

        if let Some(v) = get("VAULT_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_var("VAULT_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("VAULT_RETRY_ATTEMPTS") {
            config.retry.max_retries = parse_var("VAULT_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("VAULT_RETRY_BASE_MS") {
            config.retry.initial_delay = Duration::from_millis(parse_var("VAULT_RETRY_BASE_MS", &v)?);
        }
        if let Some(v) = get("VAULT_RETRY_MAX_WAIT_MS") {
            config.retry.max_delay = Duration::from_millis(parse_var("VAULT_RETRY_MAX_WAIT_MS", &v)?);
        }
        if let Some(v) = get("VAULT_ENABLED") {
            config.enabled = parse_bool("VAULT_ENABLED", &v)?;
        }
        if let Some(v) = get("VAULT_IN_MEMORY_WARNING") {
            config.in_memory_warning = parse_bool("VAULT_IN_MEMORY_WARNING", &v)?;
        }

        Ok(config)
    }

    /// Validate configuration for use against a real server.
    ///
    /// # Errors
    ///
    /// Returns error if the address is empty or no auth method is configured.
    pub fn validate(&self) -> TransitResult<()> {
        if self.addr.trim().is_empty() {
            return Err(TransitError::invalid_config("VAULT_ADDR is empty"));
        }
        if self.token.is_none() && self.role.is_none() {
            return Err(TransitError::invalid_config(
                "either VAULT_TOKEN or VAULT_ROLE must be set",
            ));
        }
        Ok(())
    }

    /// Enable or disable the HTTP client.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the enterprise namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Use Kubernetes auth with the given role and JWT path.
    #[must_use]
    pub fn with_kubernetes_auth(mut self, role: impl Into<String>, token_path: impl Into<String>) -> Self {
        self.token = None;
        self.role = Some(role.into());
        self.token_path = token_path.into();
        self
    }

    /// Set the convergent encryption context.
    #[must_use]
    pub fn with_convergent_context(mut self, context: impl Into<String>) -> Self {
        self.convergent_context = Some(context.into());
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry behaviour.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set circuit breaker settings.
    #[must_use]
    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Toggle the in-memory transit warning.
    #[must_use]
    pub const fn with_in_memory_warning(mut self, enabled: bool) -> Self {
        self.in_memory_warning = enabled;
        self
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> TransitResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TransitError::invalid_config(format!("{name} has invalid value {value:?}")))
}

fn parse_bool(name: &str, value: &str) -> TransitResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TransitError::invalid_config(format!(
            "{name} has invalid value {value:?}"
        ))),
    }
}
