//! Blocking HTTP client for the Vault API.
//!
//! Headers that are the same on every request (namespace, user agent) are
//! baked into the client; per-request state such as the token is added by
//! the caller.

use crate::error::PlatformError;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Settings for [`build_http_client`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP and TLS connect timeout
    pub connect_timeout: Duration,
    /// Sent as `User-Agent`
    pub user_agent: String,
    /// Headers attached to every request
    pub headers: Vec<(String, String)>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            user_agent: concat!("vault-attributes/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Request timeout; the connect timeout is capped to it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Attach `name: value` to every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn header_map(&self) -> Result<HeaderMap, PlatformError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| PlatformError::InvalidInput(format!("bad header name {name}")))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|_| PlatformError::InvalidInput(format!("bad value for header {name}")))?;
            value.set_sensitive(true);
            map.insert(header, value);
        }
        Ok(map)
    }
}

/// Build a rustls-backed blocking client.
///
/// # Errors
///
/// Returns [`PlatformError::InvalidInput`] for a header that is not valid
/// HTTP, or [`PlatformError::Http`] if TLS initialisation fails.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, PlatformError> {
    Ok(ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .default_headers(config.header_map()?)
        .use_rustls_tls()
        .build()?)
}
