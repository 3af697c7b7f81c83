//! The attribute lifecycle controller.
//!
//! Drives each encrypted attribute through
//! `Unloaded -> Loaded -> Dirty -> Persisted`, calling the transit only for
//! attributes whose state requires it.

use crate::config::ControllerConfig;
use crate::error::{RecordError, RecordResult, SerializationError, StoreError};
use crate::policy::{Accessor, AttributePolicy, EntityPolicySet};
use crate::record::{AttributeState, EncryptedRecord, RecordId, Row};
use crate::store::RecordStore;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, instrument};
use vault_transit::TransitProvider;

/// Loads, tracks and saves encrypted attributes.
#[derive(Clone)]
pub struct AttributeController {
    transit: Arc<dyn TransitProvider>,
    config: ControllerConfig,
}

impl std::fmt::Debug for AttributeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AttributeController {
    /// Create a controller with the default configuration.
    #[must_use]
    pub fn new(transit: Arc<dyn TransitProvider>) -> Self {
        Self {
            transit,
            config: ControllerConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// A new, unsaved record with every attribute null and clean.
    #[must_use]
    pub fn build(&self, schema: &Arc<EntityPolicySet>) -> EncryptedRecord {
        EncryptedRecord::new(Arc::clone(schema))
    }

    /// A new record with initial attribute values, all marked dirty.
    ///
    /// # Errors
    ///
    /// Fails if an attribute is unknown or a value does not cast.
    pub fn build_with<I, K, V>(
        &self,
        schema: &Arc<EntityPolicySet>,
        values: I,
    ) -> RecordResult<EncryptedRecord>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = self.build(schema);
        for (name, value) in values {
            self.set(&mut record, name.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Wrap a stored row and run the load hook unless the entity is lazy.
    ///
    /// # Errors
    ///
    /// Returns the first transit or decode failure.
    pub fn materialize(
        &self,
        schema: &Arc<EntityPolicySet>,
        id: RecordId,
        row: Row,
    ) -> RecordResult<EncryptedRecord> {
        let mut record = EncryptedRecord::from_row(Arc::clone(schema), id, row);
        if !schema.lazy_decrypt() {
            self.load(&mut record)?;
        }
        Ok(record)
    }

    /// Fetch and materialize a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the row does not exist, or the
    /// first transit or decode failure.
    pub fn find<S>(
        &self,
        store: &S,
        schema: &Arc<EntityPolicySet>,
        id: RecordId,
    ) -> RecordResult<EncryptedRecord>
    where
        S: RecordStore + ?Sized,
    {
        let row = store
            .load(schema.table(), id)?
            .ok_or_else(|| StoreError::NotFound {
                table: schema.table().to_string(),
                id,
            })?;
        self.materialize(schema, id, row)
    }

    /// Decrypt every unloaded attribute.
    ///
    /// Attributes with a pending change keep their value. Either every
    /// attribute is loaded or, on failure, none is.
    ///
    /// # Errors
    ///
    /// Returns the first transit or decode failure.
    #[instrument(skip(self, record), fields(entity = record.entity(), table = record.table()))]
    pub fn load(&self, record: &mut EncryptedRecord) -> RecordResult<()> {
        let schema = Arc::clone(&record.schema);
        let mut decrypted = Vec::new();
        for (index, policy) in schema.attributes().iter().enumerate() {
            if record.slots[index].state != AttributeState::Unloaded {
                continue;
            }
            decrypted.push((index, self.decrypt_attribute(policy, &record.row)?));
        }
        for (index, value) in decrypted {
            record.slots[index].commit_loaded(value);
        }
        Ok(())
    }

    /// Plaintext of `name`, decrypting on first access when needed.
    ///
    /// # Errors
    ///
    /// Fails for unknown attributes or when a lazy decrypt fails.
    pub fn read(&self, record: &mut EncryptedRecord, name: &str) -> RecordResult<Value> {
        let index = record.index(name)?;
        self.read_slot(record, index)
    }

    /// [`Self::read`] through a resolved handle.
    ///
    /// # Errors
    ///
    /// Fails if the handle belongs to another entity type or when a lazy
    /// decrypt fails.
    pub fn get(&self, record: &mut EncryptedRecord, accessor: &Accessor) -> RecordResult<Value> {
        let index = record.index_for(accessor)?;
        self.read_slot(record, index)
    }

    /// Set the plaintext of `name`. The value is cast to the attribute type.
    ///
    /// # Errors
    ///
    /// Fails for unknown attributes or values that do not cast.
    pub fn set(
        &self,
        record: &mut EncryptedRecord,
        name: &str,
        value: impl Into<Value>,
    ) -> RecordResult<()> {
        let index = record.index(name)?;
        self.write_slot(record, index, value.into())
    }

    /// [`Self::set`] through a resolved handle.
    ///
    /// # Errors
    ///
    /// Fails if the handle belongs to another entity type or the value does
    /// not cast.
    pub fn put(
        &self,
        record: &mut EncryptedRecord,
        accessor: &Accessor,
        value: impl Into<Value>,
    ) -> RecordResult<()> {
        let index = record.index_for(accessor)?;
        self.write_slot(record, index, value.into())
    }

    /// Value of `name` before the pending change, or the current value.
    ///
    /// # Errors
    ///
    /// Fails for unknown attributes or when decrypting the stored value fails.
    pub fn was(&self, record: &mut EncryptedRecord, name: &str) -> RecordResult<Value> {
        let index = record.index(name)?;
        if record.slots[index].state == AttributeState::Dirty {
            self.original(record, index)
        } else {
            self.read_slot(record, index)
        }
    }

    /// `(was, now)` if `name` has a pending change.
    ///
    /// # Errors
    ///
    /// Fails for unknown attributes or when decrypting the stored value fails.
    pub fn change(
        &self,
        record: &mut EncryptedRecord,
        name: &str,
    ) -> RecordResult<Option<(Value, Value)>> {
        let index = record.index(name)?;
        if record.slots[index].state != AttributeState::Dirty {
            return Ok(None);
        }
        let was = self.original(record, index)?;
        Ok(Some((was, record.slots[index].value.clone())))
    }

    /// Whether `name` holds a non-blank value.
    ///
    /// # Errors
    ///
    /// Fails for unknown attributes or when a lazy decrypt fails.
    pub fn present(&self, record: &mut EncryptedRecord, name: &str) -> RecordResult<bool> {
        Ok(self.read(record, name)?.is_present())
    }

    /// Encrypt every dirty attribute and persist the record.
    ///
    /// Ciphertext is staged on a copy of the row. The record only takes the
    /// new row, and dirty attributes only become `Persisted`, once the store
    /// accepted it.
    ///
    /// # Errors
    ///
    /// Returns the first encode, transit or store failure. The record is
    /// left exactly as it was.
    #[instrument(skip(self, store, record), fields(entity = record.entity(), table = record.table(), id = ?record.id()))]
    pub fn save<S>(&self, store: &S, record: &mut EncryptedRecord) -> RecordResult<RecordId>
    where
        S: RecordStore + ?Sized,
    {
        let schema = Arc::clone(&record.schema);
        let mut staged = record.row.clone();
        let mut encrypted = Vec::new();

        for (index, policy) in schema.attributes().iter().enumerate() {
            let slot = &record.slots[index];
            if slot.state != AttributeState::Dirty {
                continue;
            }
            let plaintext = policy.serializer.encode(&slot.value)?;
            let ciphertext = self.transit.encrypt(
                &policy.path,
                &policy.key,
                plaintext.as_deref(),
                policy.convergent,
            )?;
            staged.insert(policy.encrypted_column.clone(), Value::from(ciphertext));
            debug!(attribute = %policy.name, column = %policy.encrypted_column, "Encrypted attribute");

            if let Some(copy) = &policy.encrypted_copy {
                let ciphertext = self.transit.encrypt(
                    &policy.path,
                    &copy.key,
                    plaintext.as_deref(),
                    policy.convergent,
                )?;
                staged.insert(copy.column.clone(), Value::from(ciphertext));
                debug!(attribute = %policy.name, column = %copy.column, "Encrypted attribute copy");
            }
            encrypted.push(index);
        }

        let id = store.save(schema.table(), record.id, &staged)?;
        record.row = staged;
        record.id = Some(id);
        for index in encrypted {
            let slot = &mut record.slots[index];
            slot.original = Some(slot.value.clone());
            slot.state = AttributeState::Persisted;
        }
        debug!(id, "Saved record");
        Ok(id)
    }

    /// Re-read the row, drop all cached plaintext and load again.
    ///
    /// Unsaved edits are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotPersisted`] for unsaved records,
    /// [`StoreError::NotFound`] if the row is gone, or the first transit or
    /// decode failure.
    #[instrument(skip(self, store, record), fields(entity = record.entity(), table = record.table(), id = ?record.id()))]
    pub fn reload<S>(&self, store: &S, record: &mut EncryptedRecord) -> RecordResult<()>
    where
        S: RecordStore + ?Sized,
    {
        let id = record
            .id
            .ok_or_else(|| RecordError::NotPersisted(record.entity().to_string()))?;
        let row = store
            .load(record.table(), id)?
            .ok_or_else(|| StoreError::NotFound {
                table: record.table().to_string(),
                id,
            })?;

        record.row = row;
        for slot in &mut record.slots {
            slot.reset();
        }
        if !record.schema.lazy_decrypt() {
            self.load(record)?;
        }
        Ok(())
    }

    fn read_slot(&self, record: &mut EncryptedRecord, index: usize) -> RecordResult<Value> {
        if record.slots[index].state == AttributeState::Unloaded {
            let policy = &record.schema.attributes()[index];
            let value = self.decrypt_attribute(policy, &record.row)?;
            record.slots[index].commit_loaded(value);
        }
        Ok(record.slots[index].value.clone())
    }

    fn write_slot(&self, record: &mut EncryptedRecord, index: usize, value: Value) -> RecordResult<()> {
        let value = record.schema.attributes()[index].attr_type.cast(value)?;

        if !self.config.always_dirty_on_set && self.original(record, index)? == value {
            let slot = &mut record.slots[index];
            slot.value = value;
            if matches!(slot.state, AttributeState::Dirty | AttributeState::Unloaded) {
                slot.state = AttributeState::Loaded;
            }
            return Ok(());
        }

        let slot = &mut record.slots[index];
        slot.value = value;
        slot.state = AttributeState::Dirty;
        Ok(())
    }

    /// Plaintext of the stored ciphertext, decrypted at most once.
    fn original(&self, record: &mut EncryptedRecord, index: usize) -> RecordResult<Value> {
        if let Some(original) = &record.slots[index].original {
            return Ok(original.clone());
        }
        let policy = &record.schema.attributes()[index];
        let value = self.decrypt_attribute(policy, &record.row)?;
        record.slots[index].original = Some(value.clone());
        Ok(value)
    }

    fn decrypt_attribute(&self, policy: &AttributePolicy, row: &Row) -> RecordResult<Value> {
        let ciphertext = match row.get(&policy.encrypted_column) {
            None | Some(Value::Null) => None,
            Some(Value::Text(text)) => Some(text.as_str()),
            Some(other) => {
                return Err(SerializationError::Cast {
                    target: "ciphertext",
                    found: other.kind(),
                }
                .into());
            }
        };

        let plaintext = match ciphertext {
            Some(ciphertext) => {
                let plaintext = self.transit.decrypt(
                    &policy.path,
                    &policy.key,
                    Some(ciphertext),
                    policy.convergent,
                )?;
                debug!(attribute = %policy.name, column = %policy.encrypted_column, "Decrypted attribute");
                plaintext
            }
            None => None,
        };

        let value = policy.serializer.decode(plaintext.as_deref())?;
        Ok(policy.attr_type.cast(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AttributeOptions, RegistryBuilder};
    use crate::store::MemoryStore;
    use crate::types::AttributeType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vault_transit::{MemoryTransit, TransitResult};

    #[derive(Default)]
    struct Counting {
        inner: MemoryTransit,
        encrypts: AtomicUsize,
        decrypts: AtomicUsize,
    }

    impl TransitProvider for Counting {
        fn encrypt(
            &self,
            path: &str,
            key: &str,
            plaintext: Option<&str>,
            convergent: bool,
        ) -> TransitResult<Option<String>> {
            self.encrypts.fetch_add(1, Ordering::SeqCst);
            self.inner.encrypt(path, key, plaintext, convergent)
        }

        fn decrypt(
            &self,
            path: &str,
            key: &str,
            ciphertext: Option<&str>,
            convergent: bool,
        ) -> TransitResult<Option<String>> {
            self.decrypts.fetch_add(1, Ordering::SeqCst);
            self.inner.decrypt(path, key, ciphertext, convergent)
        }
    }

    fn setup(lazy: bool) -> (Arc<Counting>, AttributeController, Arc<EntityPolicySet>) {
        let transit = Arc::new(Counting {
            inner: MemoryTransit::new().with_warning(false),
            ..Default::default()
        });
        let controller = AttributeController::new(transit.clone());
        let mut builder = RegistryBuilder::new("dummy");
        builder
            .entity("Person", "people")
            .unwrap()
            .lazy_decrypt(lazy)
            .define("ssn", AttributeOptions::new())
            .and_then(|e| e.define("age", AttributeOptions::new().attr_type(AttributeType::Integer)))
            .unwrap();
        (transit, controller, builder.build().entity("Person").unwrap())
    }

    #[test]
    fn test_save_encrypts_only_dirty_attributes() {
        let (transit, controller, schema) = setup(false);
        let store = MemoryStore::new();
        let mut record = controller.build(&schema);

        controller.set(&mut record, "ssn", "123-45-6789").unwrap();
        controller.save(&store, &mut record).unwrap();

        assert_eq!(transit.encrypts.load(Ordering::SeqCst), 1);
        assert_eq!(record.state("ssn").unwrap(), AttributeState::Persisted);
        assert!(!record.changed("ssn").unwrap());
        let ciphertext = record.column("ssn_encrypted").and_then(Value::as_str).unwrap();
        assert!(ciphertext.starts_with("vault:dev:"));
        assert!(record.column("ssn").is_none());

        controller.save(&store, &mut record).unwrap();
        assert_eq!(transit.encrypts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_find_decrypts_and_casts() {
        let (transit, controller, schema) = setup(false);
        let store = MemoryStore::new();
        let mut record = controller
            .build_with(&schema, [("ssn", Value::from("123")), ("age", Value::from("42"))])
            .unwrap();
        let id = controller.save(&store, &mut record).unwrap();

        let mut found = controller.find(&store, &schema, id).unwrap();
        assert_eq!(transit.decrypts.load(Ordering::SeqCst), 2);
        assert_eq!(found.state("age").unwrap(), AttributeState::Loaded);
        assert_eq!(controller.read(&mut found, "age").unwrap(), Value::from(42));
        assert_eq!(controller.read(&mut found, "ssn").unwrap(), Value::from("123"));
    }

    #[test]
    fn test_null_ciphertext_skips_transit() {
        let (transit, controller, schema) = setup(false);
        let mut record = controller.materialize(&schema, 1, Row::new()).unwrap();
        assert_eq!(transit.decrypts.load(Ordering::SeqCst), 0);
        assert_eq!(controller.read(&mut record, "ssn").unwrap(), Value::Null);
    }

    #[test]
    fn test_lazy_decrypt_is_memoized() {
        let (transit, controller, schema) = setup(true);
        let store = MemoryStore::new();
        let mut record = controller.build_with(&schema, [("ssn", "abc")]).unwrap();
        let id = controller.save(&store, &mut record).unwrap();

        let mut found = controller.find(&store, &schema, id).unwrap();
        assert_eq!(found.state("ssn").unwrap(), AttributeState::Unloaded);
        assert_eq!(transit.decrypts.load(Ordering::SeqCst), 0);

        assert_eq!(controller.read(&mut found, "ssn").unwrap(), Value::from("abc"));
        assert_eq!(controller.read(&mut found, "ssn").unwrap(), Value::from("abc"));
        assert_eq!(transit.decrypts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_keeps_pending_change() {
        let (_, controller, schema) = setup(true);
        let store = MemoryStore::new();
        let mut record = controller.build_with(&schema, [("ssn", "old")]).unwrap();
        let id = controller.save(&store, &mut record).unwrap();

        let mut found = controller.find(&store, &schema, id).unwrap();
        controller.set(&mut found, "ssn", "new").unwrap();
        controller.load(&mut found).unwrap();

        assert_eq!(controller.read(&mut found, "ssn").unwrap(), Value::from("new"));
        assert_eq!(controller.was(&mut found, "ssn").unwrap(), Value::from("old"));
        assert_eq!(
            controller.change(&mut found, "ssn").unwrap(),
            Some((Value::from("old"), Value::from("new")))
        );
    }

    #[test]
    fn test_reload_discards_edits() {
        let (_, controller, schema) = setup(false);
        let store = MemoryStore::new();
        let mut record = controller.build_with(&schema, [("ssn", "kept")]).unwrap();
        controller.save(&store, &mut record).unwrap();

        controller.set(&mut record, "ssn", "dropped").unwrap();
        controller.reload(&store, &mut record).unwrap();

        assert_eq!(controller.read(&mut record, "ssn").unwrap(), Value::from("kept"));
        assert!(record.changed_attributes().is_empty());
    }

    #[test]
    fn test_reload_requires_persisted_record() {
        let (_, controller, schema) = setup(false);
        let mut record = controller.build(&schema);
        assert!(matches!(
            controller.reload(&MemoryStore::new(), &mut record),
            Err(RecordError::NotPersisted(_))
        ));
    }

    #[test]
    fn test_unchanged_set_stays_clean_when_tuned() {
        let (transit, controller, schema) = setup(false);
        let controller =
            controller.with_config(ControllerConfig::default().with_always_dirty_on_set(false));
        let store = MemoryStore::new();
        let mut record = controller.build_with(&schema, [("ssn", "same")]).unwrap();
        controller.save(&store, &mut record).unwrap();

        controller.set(&mut record, "ssn", "same").unwrap();
        assert!(!record.changed("ssn").unwrap());
        controller.save(&store, &mut record).unwrap();
        assert_eq!(transit.encrypts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unchanged_set_dirties_by_default() {
        let (_, controller, schema) = setup(false);
        let mut record = controller.build(&schema);
        controller.set(&mut record, "ssn", Value::Null).unwrap();
        assert!(record.changed("ssn").unwrap());
    }

    #[test]
    fn test_bad_cast_is_rejected_without_state_change() {
        let (_, controller, schema) = setup(false);
        let mut record = controller.build(&schema);
        let err = controller.set(&mut record, "age", "forty").unwrap_err();
        assert!(matches!(err, RecordError::Serialization(SerializationError::Cast { .. })));
        assert!(!record.changed("age").unwrap());
    }

    #[test]
    fn test_accessor_handles() {
        let (_, controller, schema) = setup(false);
        let ssn = schema.accessor("ssn").unwrap();
        let mut record = controller.build(&schema);

        controller.put(&mut record, &ssn, "via handle").unwrap();
        assert_eq!(controller.get(&mut record, &ssn).unwrap(), Value::from("via handle"));
        assert!(controller.present(&mut record, "ssn").unwrap());
    }
}
