//! Vault transit HTTP client with retry and circuit breaker integration.

use crate::{
    config::TransitConfig,
    error::{TransitError, TransitResult},
    provider::{TransitProvider, passthrough},
    wire::{
        AuthResponse, DecryptData, DecryptRequest, EncryptData, EncryptRequest, ErrorResponse,
        KubernetesLogin, TransitResponse,
    },
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use vault_attr_common::{
    CircuitBreaker, CircuitState, HttpConfig, RetryPolicy, build_http_client,
};
use zeroize::Zeroizing;

const SERVICE_NAME: &str = "vault";
const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const RENEW_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct LeasedToken {
    token: SecretString,
    expires_at: Option<Instant>,
}

impl LeasedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_none_or(|exp| exp.saturating_duration_since(Instant::now()) > RENEW_MARGIN)
    }
}

/// Vault transit client.
///
/// Safe to share between threads; the only mutable state is the login
/// token cache and the circuit breaker counters.
#[derive(Debug)]
pub struct TransitClient {
    addr: String,
    role: Option<String>,
    token_path: String,
    static_token: Option<SecretString>,
    login: RwLock<Option<LeasedToken>>,
    context: Option<String>,
    http: Client,
    retry: RetryPolicy,
    circuit_breaker: CircuitBreaker,
}

impl TransitClient {
    /// Create a new transit client.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete or the HTTP client
    /// cannot be built.
    pub fn new(config: TransitConfig) -> TransitResult<Self> {
        config.validate()?;

        let mut http = HttpConfig::default().with_timeout(config.timeout);
        if let Some(namespace) = &config.namespace {
            http = http.with_header(NAMESPACE_HEADER, namespace);
        }
        let http = build_http_client(&http)?;

        Ok(Self {
            addr: config.addr.trim_end_matches('/').to_string(),
            role: config.role,
            token_path: config.token_path,
            static_token: config.token,
            login: RwLock::new(None),
            context: config.convergent_context.map(|c| BASE64.encode(c)),
            http,
            retry: RetryPolicy::new(config.retry),
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker),
        })
    }

    /// Current state of the transport circuit breaker.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Authenticate with the Kubernetes auth method.
    ///
    /// # Errors
    ///
    /// Returns error if no role is configured, the service-account JWT
    /// cannot be read, or Vault rejects the login.
    #[instrument(skip(self), fields(role = ?self.role))]
    pub fn authenticate(&self) -> TransitResult<()> {
        let role = self
            .role
            .as_deref()
            .ok_or_else(|| TransitError::invalid_config("no Kubernetes role configured"))?;
        let jwt = Zeroizing::new(
            std::fs::read_to_string(&self.token_path)
                .map_err(|e| TransitError::auth_failed(format!("{}: {e}", self.token_path)))?,
        );

        let response = self
            .http
            .post(self.url("auth/kubernetes/login"))
            .json(&KubernetesLogin {
                role,
                jwt: jwt.trim(),
            })
            .send()
            .map_err(|e| TransitError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(TransitError::auth_failed(format!(
                "Status {status}: {}",
                ErrorResponse::detail(&text)
            )));
        }

        let auth: AuthResponse = response.json()?;
        let ttl = Duration::from_secs(auth.auth.lease_duration);
        let expires_at = (auth.auth.lease_duration > 0).then(|| Instant::now() + ttl);

        *self.login.write().unwrap_or_else(PoisonError::into_inner) = Some(LeasedToken {
            token: SecretString::from(auth.auth.client_token),
            expires_at,
        });

        info!(ttl_secs = ttl.as_secs(), "Authenticated with Vault");
        Ok(())
    }

    fn cached_login(&self) -> Option<Zeroizing<String>> {
        let guard = self.login.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|lease| lease.is_fresh())
            .map(|lease| Zeroizing::new(lease.token.expose_secret().to_owned()))
    }

    fn current_token(&self) -> TransitResult<Zeroizing<String>> {
        if let Some(token) = &self.static_token {
            return Ok(Zeroizing::new(token.expose_secret().to_owned()));
        }
        if let Some(token) = self.cached_login() {
            return Ok(token);
        }
        self.authenticate()?;
        self.cached_login()
            .ok_or_else(|| TransitError::auth_failed("No token available"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path.trim_matches('/'))
    }

    fn context_for(&self, convergent: bool) -> TransitResult<Option<String>> {
        if !convergent {
            return Ok(None);
        }
        self.context.clone().map(Some).ok_or_else(|| {
            TransitError::invalid_config("convergent encryption requires VAULT_CONVERGENT_CONTEXT")
        })
    }

    fn post<B, T>(&self, path: &str, body: &B) -> TransitResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        if let Err(e) = self.circuit_breaker.check(SERVICE_NAME) {
            warn!(path, error = %e, "Circuit breaker open for Vault");
            return Err(TransitError::CircuitBreakerOpen);
        }

        let result = self.retry.execute(|| self.send(path, body));

        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(e) if e.is_retryable() => self.circuit_breaker.record_failure(),
            Err(_) => {}
        }

        result
    }

    fn send<B, T>(&self, path: &str, body: &B) -> TransitResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let token = self.current_token()?;
        let response = self
            .http
            .post(self.url(path))
            .header(TOKEN_HEADER, token.as_str())
            .json(body)
            .send()
            .map_err(|e| TransitError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(TransitError::from_status(
                status.as_u16(),
                path,
                &ErrorResponse::detail(&text),
            ));
        }

        response
            .json()
            .map_err(|e| TransitError::invalid_response(e.to_string()))
    }
}

impl TransitProvider for TransitClient {
    #[instrument(skip(self, plaintext))]
    fn encrypt(
        &self,
        path: &str,
        key: &str,
        plaintext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>> {
        if let Some(resolved) = passthrough(plaintext) {
            return Ok(resolved);
        }
        let body = EncryptRequest {
            plaintext: BASE64.encode(plaintext.unwrap_or_default()),
            context: self.context_for(convergent)?,
        };

        let response: TransitResponse<EncryptData> =
            self.post(&format!("{path}/encrypt/{key}"), &body)?;

        debug!("Encrypted value");
        Ok(Some(response.data.ciphertext))
    }

    #[instrument(skip(self, ciphertext))]
    fn decrypt(
        &self,
        path: &str,
        key: &str,
        ciphertext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>> {
        if let Some(resolved) = passthrough(ciphertext) {
            return Ok(resolved);
        }
        let body = DecryptRequest {
            ciphertext: ciphertext.unwrap_or_default(),
            context: self.context_for(convergent)?,
        };

        let response: TransitResponse<DecryptData> =
            self.post(&format!("{path}/decrypt/{key}"), &body)?;

        let bytes = BASE64
            .decode(response.data.plaintext.as_bytes())
            .map_err(|e| TransitError::invalid_response(format!("plaintext is not base64: {e}")))?;

        debug!("Decrypted value");
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| TransitError::invalid_response("plaintext is not valid UTF-8"))
    }
}
