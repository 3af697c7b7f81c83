//! In-process transit oracle for development and tests.
//!
//! Keys are derived from the `path/key` pair, so nothing needs to be
//! provisioned. Ciphertexts are only readable by the same process build,
//! which makes this unsuitable for anything but local work.

use crate::error::{TransitError, TransitResult};
use crate::provider::{TransitProvider, passthrough};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Prefix of every token produced by [`MemoryTransit`].
pub const TOKEN_PREFIX: &str = "vault:dev:";

const NONCE_LEN: usize = 12;

static WARNED: AtomicBool = AtomicBool::new(false);

/// AES-256-GCM transit that never leaves the process.
#[derive(Debug, Clone)]
pub struct MemoryTransit {
    context: String,
    warn_on_use: bool,
}

impl MemoryTransit {
    /// Create an in-memory transit with the usage warning enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: String::new(),
            warn_on_use: true,
        }
    }

    /// Set the context mixed into convergent nonces.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Toggle the one-time usage warning.
    #[must_use]
    pub const fn with_warning(mut self, enabled: bool) -> Self {
        self.warn_on_use = enabled;
        self
    }

    fn warn_once(&self) {
        if self.warn_on_use && !WARNED.swap(true, Ordering::Relaxed) {
            warn!("Using in-memory transit; encrypted attributes are not protected by Vault");
        }
    }

    fn derive_key(path: &str, key: &str) -> Zeroizing<[u8; 32]> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&Sha256::digest(format!("{path}/{key}").as_bytes()));
        bytes
    }

    fn cipher(key: &[u8; 32]) -> TransitResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(key).map_err(|e| TransitError::invalid_config(e.to_string()))
    }

    fn nonce(&self, key: &[u8; 32], plaintext: &[u8], convergent: bool) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        if convergent {
            let digest = Sha256::new()
                .chain_update(key)
                .chain_update(self.context.as_bytes())
                .chain_update(plaintext)
                .finalize();
            nonce.copy_from_slice(&digest[..NONCE_LEN]);
        } else {
            rand::thread_rng().fill_bytes(&mut nonce);
        }
        nonce
    }
}

impl Default for MemoryTransit {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitProvider for MemoryTransit {
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
        let plaintext = plaintext.unwrap_or_default().as_bytes();
        self.warn_once();

        let derived = Self::derive_key(path, key);
        let cipher = Self::cipher(&derived)?;
        let nonce_bytes = self.nonce(&derived, plaintext, convergent);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| TransitError::invalid_response("in-memory encryption failed"))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&sealed);

        debug!(path, key, convergent, "Encrypted value in memory");
        Ok(Some(format!("{TOKEN_PREFIX}{}", BASE64.encode(framed))))
    }

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
        let ciphertext = ciphertext.unwrap_or_default();
        self.warn_once();

        let encoded = ciphertext
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| TransitError::invalid_response("not an in-memory ciphertext"))?;
        let framed = BASE64
            .decode(encoded)
            .map_err(|e| TransitError::invalid_response(e.to_string()))?;
        if framed.len() <= NONCE_LEN {
            return Err(TransitError::invalid_response("ciphertext too short"));
        }
        let (nonce_bytes, sealed) = framed.split_at(NONCE_LEN);

        let derived = Self::derive_key(path, key);
        let plaintext = Self::cipher(&derived)?
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| TransitError::invalid_response("ciphertext does not match key"))?;

        debug!(path, key, convergent, "Decrypted value in memory");
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| TransitError::invalid_response("plaintext is not valid UTF-8"))
    }
}
