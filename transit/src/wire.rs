//! Request and response bodies of the Vault transit and auth APIs.

use serde::{Deserialize, Serialize};

/// Body of `POST {path}/encrypt/{key}`.
#[derive(Debug, Serialize)]
pub struct EncryptRequest {
    /// Base64 of the plaintext bytes
    pub plaintext: String,
    /// Base64 derivation context, only sent for convergent keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Body of `POST {path}/decrypt/{key}`.
#[derive(Debug, Serialize)]
pub struct DecryptRequest<'a> {
    /// Opaque ciphertext token, e.g. `vault:v1:...`
    pub ciphertext: &'a str,
    /// Base64 derivation context, only sent for convergent keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Vault response envelope.
#[derive(Debug, Deserialize)]
pub struct TransitResponse<T> {
    /// Operation payload
    pub data: T,
}

/// Payload of an encrypt response.
#[derive(Debug, Deserialize)]
pub struct EncryptData {
    /// Ciphertext token
    pub ciphertext: String,
}

/// Payload of a decrypt response.
#[derive(Debug, Deserialize)]
pub struct DecryptData {
    /// Base64 of the plaintext bytes
    pub plaintext: String,
}

/// Body of `POST auth/kubernetes/login`.
#[derive(Debug, Serialize)]
pub struct KubernetesLogin<'a> {
    /// Vault role bound to the service account
    pub role: &'a str,
    /// Service account JWT
    pub jwt: &'a str,
}

/// Vault auth response.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Auth payload
    pub auth: AuthData,
}

/// Token issued by an auth method.
#[derive(Debug, Deserialize)]
pub struct AuthData {
    /// Client token
    pub client_token: String,
    /// Token TTL in seconds
    pub lease_duration: u64,
}

/// Error body returned by Vault on non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error messages
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ErrorResponse {
    /// Extract Vault's error text from a raw response body.
    #[must_use]
    pub fn detail(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .ok()
            .filter(|e| !e.errors.is_empty())
            .map_or_else(|| body.trim().to_string(), |e| e.errors.join("; "))
    }
}
