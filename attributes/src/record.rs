//! Entity instances with their per-attribute plaintext cache.

use crate::error::{RecordError, RecordResult};
use crate::policy::{Accessor, EntityPolicySet};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Store-assigned row id.
pub type RecordId = u64;

/// Raw columns of one row.
pub type Row = BTreeMap<String, Value>;

/// Position of an encrypted attribute in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeState {
    /// Ciphertext not decrypted yet
    Unloaded,
    /// Plaintext matches the ciphertext column
    Loaded,
    /// Set by the application and not saved yet
    Dirty,
    /// Encrypted and accepted by the store
    Persisted,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) state: AttributeState,
    pub(crate) value: Value,
    /// Plaintext of the stored ciphertext; `None` until it is known.
    pub(crate) original: Option<Value>,
}

impl Slot {
    const fn unloaded() -> Self {
        Self {
            state: AttributeState::Unloaded,
            value: Value::Null,
            original: None,
        }
    }

    const fn blank() -> Self {
        Self {
            state: AttributeState::Loaded,
            value: Value::Null,
            original: Some(Value::Null),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::unloaded();
    }

    pub(crate) fn commit_loaded(&mut self, value: Value) {
        self.value = value.clone();
        self.original = Some(value);
        self.state = AttributeState::Loaded;
    }
}

/// One entity instance: raw columns plus decrypted plaintext slots.
///
/// Plaintext only lives in the slots. The row handed to the store holds
/// ciphertext columns and whatever unencrypted columns the application set.
#[derive(Debug, Clone)]
pub struct EncryptedRecord {
    pub(crate) schema: Arc<EntityPolicySet>,
    pub(crate) id: Option<RecordId>,
    pub(crate) row: Row,
    pub(crate) slots: Vec<Slot>,
}

impl EncryptedRecord {
    pub(crate) fn new(schema: Arc<EntityPolicySet>) -> Self {
        let slots = vec![Slot::blank(); schema.attributes().len()];
        Self {
            schema,
            id: None,
            row: Row::new(),
            slots,
        }
    }

    pub(crate) fn from_row(schema: Arc<EntityPolicySet>, id: RecordId, row: Row) -> Self {
        let slots = vec![Slot::unloaded(); schema.attributes().len()];
        Self {
            schema,
            id: Some(id),
            row,
            slots,
        }
    }

    /// Store id, once saved.
    #[must_use]
    pub const fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Whether the record has never been saved.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Entity type name.
    #[must_use]
    pub fn entity(&self) -> &str {
        self.schema.entity()
    }

    /// Backing table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Policies of this record's entity type.
    #[must_use]
    pub fn schema(&self) -> &Arc<EntityPolicySet> {
        &self.schema
    }

    /// Raw column value. Ciphertext columns are readable here too.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.row.get(name)
    }

    /// Set a raw column.
    pub fn set_column(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.row.insert(name.into(), value.into());
    }

    /// All raw columns.
    #[must_use]
    pub const fn row(&self) -> &Row {
        &self.row
    }

    /// Lifecycle state of an encrypted attribute.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownAttribute`] for undefined attributes.
    pub fn state(&self, name: &str) -> RecordResult<AttributeState> {
        Ok(self.slots[self.index(name)?].state)
    }

    /// Whether an encrypted attribute has an unsaved change.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownAttribute`] for undefined attributes.
    pub fn changed(&self, name: &str) -> RecordResult<bool> {
        Ok(self.state(name)? == AttributeState::Dirty)
    }

    /// Names of the encrypted attributes with unsaved changes, in definition order.
    #[must_use]
    pub fn changed_attributes(&self) -> Vec<&str> {
        self.schema
            .attributes()
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.state == AttributeState::Dirty)
            .map(|(policy, _)| policy.name.as_str())
            .collect()
    }

    /// Whether any encrypted attribute has an unsaved change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.slots.iter().any(|s| s.state == AttributeState::Dirty)
    }

    pub(crate) fn index(&self, name: &str) -> RecordResult<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| RecordError::unknown_attribute(self.entity(), name))
    }

    pub(crate) fn index_for(&self, accessor: &Accessor) -> RecordResult<usize> {
        if accessor.entity() != self.entity() || accessor.index() >= self.slots.len() {
            return Err(RecordError::unknown_attribute(self.entity(), accessor.name()));
        }
        Ok(accessor.index())
    }
}
