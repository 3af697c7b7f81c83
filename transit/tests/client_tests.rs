//! HTTP behaviour of the transit client against a mock Vault server.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Runtime;
use vault_attr_common::{CircuitBreakerConfig, CircuitState, RetryConfig};
use vault_transit::{TransitClient, TransitConfig, TransitError, TransitProvider};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// A mock Vault server driven from synchronous tests.
struct Vault {
    server: MockServer,
    rt: Runtime,
}

impl Vault {
    fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    fn requests(&self) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    fn config(&self) -> TransitConfig {
        TransitConfig::new(self.server.uri(), "s.test-token").with_retry(
            RetryConfig::default()
                .without_jitter()
                .with_initial_delay(Duration::from_millis(1)),
        )
    }

    fn client(&self) -> TransitClient {
        TransitClient::new(self.config()).unwrap()
    }
}

fn encrypt_ok(ciphertext: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "ciphertext": ciphertext } }))
}

fn decrypt_ok(plaintext: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({ "data": { "plaintext": BASE64.encode(plaintext) } }))
}

#[test]
fn test_encrypt_posts_base64_plaintext_with_token() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/transit/encrypt/app_people_ssn"))
            .and(header("X-Vault-Token", "s.test-token"))
            .and(body_json(json!({ "plaintext": BASE64.encode("123-45-6789") })))
            .respond_with(encrypt_ok("vault:v1:C")),
    );

    let ct = vault
        .client()
        .encrypt("transit", "app_people_ssn", Some("123-45-6789"), false)
        .unwrap();

    assert_eq!(ct.as_deref(), Some("vault:v1:C"));
    assert_eq!(vault.requests().len(), 1);
}

#[test]
fn test_decrypt_returns_decoded_plaintext() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/transit/decrypt/app_people_ssn"))
            .and(body_json(json!({ "ciphertext": "vault:v1:C" })))
            .respond_with(decrypt_ok(b"123-45-6789")),
    );

    let pt = vault
        .client()
        .decrypt("transit", "app_people_ssn", Some("vault:v1:C"), false)
        .unwrap();

    assert_eq!(pt.as_deref(), Some("123-45-6789"));
}

#[test]
fn test_convergent_sends_context() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/transit/encrypt/email"))
            .and(body_json(json!({
                "plaintext": BASE64.encode("a@example.com"),
                "context": BASE64.encode("people"),
            })))
            .respond_with(encrypt_ok("vault:v1:D")),
    );

    let client = TransitClient::new(vault.config().with_convergent_context("people")).unwrap();
    let ct = client.encrypt("transit", "email", Some("a@example.com"), true).unwrap();

    assert_eq!(ct.as_deref(), Some("vault:v1:D"));
}

#[test]
fn test_namespace_header_is_sent() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(header("X-Vault-Namespace", "team-a"))
            .respond_with(encrypt_ok("vault:v1:E")),
    );

    let client = TransitClient::new(vault.config().with_namespace("team-a")).unwrap();
    assert!(client.encrypt("transit", "k", Some("x"), false).is_ok());
}

#[test]
fn test_missing_key_maps_to_key_not_found() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/transit/decrypt/missing"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "errors": ["encryption key not found"] })),
            ),
    );
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/other/encrypt/k"))
            .respond_with(ResponseTemplate::new(404)),
    );

    let client = vault.client();
    let result = client.decrypt("transit", "missing", Some("vault:v1:x"), false);
    assert!(matches!(result, Err(TransitError::KeyNotFound(_))));

    let result = client.encrypt("other", "k", Some("x"), false);
    assert!(matches!(result, Err(TransitError::KeyNotFound(_))));
}

#[test]
fn test_permission_denied_is_not_retried() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] }))),
    );

    let result = vault.client().encrypt("transit", "k", Some("x"), false);

    assert!(matches!(result, Err(TransitError::PermissionDenied(_))));
    assert_eq!(vault.requests().len(), 1);
}

#[test]
fn test_transient_failures_are_retried() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2),
    );
    vault.mount(Mock::given(method("POST")).respond_with(encrypt_ok("vault:v1:F")));

    let ct = vault.client().encrypt("transit", "k", Some("x"), false).unwrap();

    assert_eq!(ct.as_deref(), Some("vault:v1:F"));
    assert_eq!(vault.requests().len(), 3);
}

#[test]
fn test_exhausted_retries_surface_unavailable() {
    let vault = Vault::start();
    vault.mount(Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)));

    let result = vault.client().encrypt("transit", "k", Some("x"), false);

    assert!(matches!(result, Err(TransitError::Unavailable(_))));
    assert_eq!(vault.requests().len(), 4);
}

#[test]
fn test_circuit_opens_after_consecutive_failures() {
    let vault = Vault::start();
    vault.mount(Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)));

    let client = TransitClient::new(
        vault
            .config()
            .with_retry(RetryConfig::default().with_max_retries(0))
            .with_circuit_breaker(
                CircuitBreakerConfig::default()
                    .with_failure_threshold(2)
                    .with_timeout(Duration::from_secs(60)),
            ),
    )
    .unwrap();

    for _ in 0..2 {
        assert!(matches!(
            client.encrypt("transit", "k", Some("x"), false),
            Err(TransitError::Unavailable(_))
        ));
    }
    assert_eq!(client.circuit_state(), CircuitState::Open);

    let result = client.encrypt("transit", "k", Some("x"), false);
    assert!(matches!(result, Err(TransitError::CircuitBreakerOpen)));
    assert_eq!(vault.requests().len(), 2);
}

#[test]
fn test_non_utf8_plaintext_is_invalid_response() {
    let vault = Vault::start();
    vault.mount(Mock::given(method("POST")).respond_with(decrypt_ok(&[0xff, 0xfe, 0xfd])));

    let result = vault.client().decrypt("transit", "k", Some("vault:v1:x"), false);

    assert!(matches!(result, Err(TransitError::InvalidResponse(_))));
}

#[test]
fn test_kubernetes_login_token_is_cached() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/auth/kubernetes/login"))
            .and(body_json(json!({ "role": "people-app", "jwt": "service-account-jwt" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": { "client_token": "s.k8s-token", "lease_duration": 3600 }
            }))),
    );
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/transit/encrypt/k"))
            .and(header("X-Vault-Token", "s.k8s-token"))
            .respond_with(encrypt_ok("vault:v1:G")),
    );

    let jwt_path = std::env::temp_dir().join(format!("vault-transit-jwt-{}", std::process::id()));
    std::fs::write(&jwt_path, "service-account-jwt\n").unwrap();

    let client = TransitClient::new(
        vault
            .config()
            .with_kubernetes_auth("people-app", jwt_path.to_string_lossy()),
    )
    .unwrap();

    assert!(client.encrypt("transit", "k", Some("x"), false).is_ok());
    assert!(client.encrypt("transit", "k", Some("y"), false).is_ok());

    let logins = vault
        .requests()
        .iter()
        .filter(|r| r.url.path() == "/v1/auth/kubernetes/login")
        .count();
    assert_eq!(logins, 1);

    std::fs::remove_file(jwt_path).ok();
}

#[test]
fn test_failed_login_is_authentication_error() {
    let vault = Vault::start();
    vault.mount(
        Mock::given(method("POST"))
            .and(path("/v1/auth/kubernetes/login"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "errors": ["invalid role"] }))),
    );

    let jwt_path = std::env::temp_dir().join(format!("vault-transit-badjwt-{}", std::process::id()));
    std::fs::write(&jwt_path, "jwt").unwrap();

    let client = TransitClient::new(
        vault
            .config()
            .with_kubernetes_auth("nobody", jwt_path.to_string_lossy()),
    )
    .unwrap();

    let result = client.encrypt("transit", "k", Some("x"), false);
    assert!(matches!(result, Err(TransitError::AuthenticationFailed(_))));

    std::fs::remove_file(jwt_path).ok();
}
