//! Legacy plaintext column migration.
//!
//! A proxy lets application code keep using one logical name while a
//! plaintext column is being replaced by an encrypted attribute.

use crate::controller::AttributeController;
use crate::error::{RecordError, RecordResult};
use crate::policy::ProxyPolicy;
use crate::record::EncryptedRecord;
use crate::value::Value;

impl AttributeController {
    /// Read through a proxy: the encrypted value when it is set, otherwise
    /// the legacy column. Encrypted-only proxies never fall back.
    ///
    /// # Errors
    ///
    /// Fails if no proxy is declared under `name` or decrypting fails.
    pub fn read_proxy(&self, record: &mut EncryptedRecord, name: &str) -> RecordResult<Value> {
        let proxy = proxy_for(record, name)?;
        let encrypted = self.read(record, &proxy.encrypted_attribute)?;
        if proxy.options.encrypted_only || !encrypted.is_null() {
            return Ok(encrypted);
        }
        Ok(record
            .column(&proxy.legacy_column)
            .cloned()
            .unwrap_or_default())
    }

    /// Write through a proxy.
    ///
    /// The legacy column receives the raw value unless the proxy is
    /// encrypted-only. The encrypted attribute receives the value cast with
    /// the proxy's cast type and is marked dirty.
    ///
    /// # Errors
    ///
    /// Fails if no proxy is declared under `name` or the value does not cast.
    pub fn write_proxy(
        &self,
        record: &mut EncryptedRecord,
        name: &str,
        value: impl Into<Value>,
    ) -> RecordResult<()> {
        let proxy = proxy_for(record, name)?;
        let value = value.into();
        let cast = proxy.options.cast.cast(value.clone())?;
        self.set(record, &proxy.encrypted_attribute, cast)?;
        if !proxy.options.encrypted_only {
            record.set_column(proxy.legacy_column, value);
        }
        Ok(())
    }
}

fn proxy_for(record: &EncryptedRecord, name: &str) -> RecordResult<ProxyPolicy> {
    record
        .schema()
        .proxy(name)
        .cloned()
        .ok_or_else(|| RecordError::unknown_attribute(record.entity(), name))
}
