//! The crypto oracle seam between attribute bookkeeping and Vault.

use crate::error::TransitResult;

/// Synchronous encrypt/decrypt oracle.
///
/// Implementations are shared between entity instances and must be safe
/// for concurrent use.
///
/// Both operations treat a blank input (`None` or `""`) as already
/// resolved and hand it back unchanged without contacting the service.
pub trait TransitProvider: Send + Sync {
    /// Encrypt `plaintext` with `key` under the transit mount `path`.
    ///
    /// # Errors
    ///
    /// Returns a transit error when the service rejects or fails the call.
    fn encrypt(
        &self,
        path: &str,
        key: &str,
        plaintext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>>;

    /// Decrypt `ciphertext` with `key` under the transit mount `path`.
    ///
    /// # Errors
    ///
    /// Returns a transit error when the service rejects or fails the call.
    fn decrypt(
        &self,
        path: &str,
        key: &str,
        ciphertext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>>;
}

/// Returns the input unchanged when it needs no round trip.
pub(crate) fn passthrough(value: Option<&str>) -> Option<Option<String>> {
    match value {
        None => Some(None),
        Some("") => Some(Some(String::new())),
        Some(_) => None,
    }
}
