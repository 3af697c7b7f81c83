//! A wiremock server that behaves like Vault's transit engine.
//!
//! Ciphertext is `vault:v1:` followed by the base64 plaintext, so decrypt
//! is a pure function of the token and the server keeps no state. Unknown
//! keys can be configured to answer like Vault does for a missing key.

#![allow(clippy::expect_used)]

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value as Json, json};
use std::collections::BTreeSet;
use tokio::runtime::Runtime;
use vault_transit::TransitConfig;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Prefix of ciphertext minted by [`FakeVault`].
pub const CIPHERTEXT_PREFIX: &str = "vault:v1:";

/// Token the fake server expects.
pub const TOKEN: &str = "s.fake-vault-token";

struct TransitResponder {
    missing_keys: BTreeSet<String>,
}

impl TransitResponder {
    fn error(status: u16, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({ "errors": [message] }))
    }

    fn encrypt(body: &Json) -> ResponseTemplate {
        match body.get("plaintext").and_then(Json::as_str) {
            Some(plaintext) => ResponseTemplate::new(200).set_body_json(json!({
                "data": { "ciphertext": format!("{CIPHERTEXT_PREFIX}{plaintext}") }
            })),
            None => Self::error(400, "missing plaintext to encrypt"),
        }
    }

    fn decrypt(body: &Json) -> ResponseTemplate {
        let plaintext = body
            .get("ciphertext")
            .and_then(Json::as_str)
            .and_then(|c| c.strip_prefix(CIPHERTEXT_PREFIX));
        match plaintext {
            Some(plaintext) => ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "plaintext": plaintext } })),
            None => Self::error(400, "invalid ciphertext: no prefix"),
        }
    }
}

impl Respond for TransitResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if request
            .headers
            .get("X-Vault-Token")
            .is_none_or(|token| token.as_bytes() != TOKEN.as_bytes())
        {
            return Self::error(403, "permission denied");
        }

        let segments: Vec<&str> = request.url.path().trim_start_matches("/v1/").split('/').collect();
        let (operation, key) = match segments.as_slice() {
            [.., operation, key] => (*operation, *key),
            _ => return Self::error(404, "unsupported path"),
        };
        if self.missing_keys.contains(key) {
            return Self::error(400, "encryption key not found");
        }

        let Ok(body) = serde_json::from_slice::<Json>(&request.body) else {
            return Self::error(400, "failed to parse JSON input");
        };
        match operation {
            "encrypt" => Self::encrypt(&body),
            "decrypt" => Self::decrypt(&body),
            _ => Self::error(404, "unsupported path"),
        }
    }
}

/// A fake Vault server driven from synchronous tests.
pub struct FakeVault {
    server: MockServer,
    rt: Runtime,
}

impl FakeVault {
    /// Start a server that knows every key.
    ///
    /// # Panics
    ///
    /// Panics if the test runtime cannot be created.
    #[must_use]
    pub fn start() -> Self {
        Self::start_without_keys(&[])
    }

    /// Start a server that answers "encryption key not found" for `keys`.
    ///
    /// # Panics
    ///
    /// Panics if the test runtime cannot be created.
    #[must_use]
    pub fn start_without_keys(keys: &[&str]) -> Self {
        let rt = Runtime::new().expect("test runtime");
        let server = rt.block_on(MockServer::start());
        let responder = TransitResponder {
            missing_keys: keys.iter().map(|k| (*k).to_string()).collect(),
        };
        rt.block_on(
            Mock::given(method("POST"))
                .and(path_regex(r"^/v1/.+/(encrypt|decrypt)/[^/]+$"))
                .respond_with(responder)
                .mount(&server),
        );
        Self { server, rt }
    }

    /// Base URI of the server.
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Transit configuration pointing at this server.
    #[must_use]
    pub fn config(&self) -> TransitConfig {
        TransitConfig::new(self.uri(), TOKEN)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    /// Number of requests whose path ends in `/{operation}/{key}`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        let needle = format!("/{operation}/");
        self.requests()
            .iter()
            .filter(|r| r.url.path().contains(&needle))
            .count()
    }
}

/// Ciphertext the fake server returns for `plaintext`.
#[must_use]
pub fn fake_ciphertext(plaintext: &str) -> String {
    format!("{CIPHERTEXT_PREFIX}{}", BASE64.encode(plaintext))
}
