//! Persistence seam.
//!
//! The controller only needs whole-row reads and atomic whole-row writes.
//! Anything richer (schema, migrations, queries) stays with the store.

use crate::error::StoreError;
use crate::record::{RecordId, Row};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// A transactional row store.
pub trait RecordStore: Send + Sync {
    /// Persist `row` atomically. A `None` id inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write was not committed. Nothing of
    /// the row may be persisted in that case.
    fn save(&self, table: &str, id: Option<RecordId>, row: &Row) -> Result<RecordId, StoreError>;

    /// Fetch a row.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read.
    fn load(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    next_id: RecordId,
    rows: BTreeMap<(String, RecordId), Row>,
}

/// In-process store with autoincrement ids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.rows.keys().filter(|(t, _)| t == table).count()
    }

    /// Whether `table` has no rows.
    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

impl RecordStore for MemoryStore {
    fn save(&self, table: &str, id: Option<RecordId>, row: &Row) -> Result<RecordId, StoreError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let id = match id {
            Some(id) => {
                if !tables.rows.contains_key(&(table.to_string(), id)) {
                    return Err(StoreError::NotFound {
                        table: table.to_string(),
                        id,
                    });
                }
                id
            }
            None => {
                tables.next_id += 1;
                tables.next_id
            }
        };
        tables.rows.insert((table.to_string(), id), row.clone());
        Ok(id)
    }

    fn load(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.rows.get(&(table.to_string(), id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_insert_then_update() {
        let store = MemoryStore::new();
        let mut row = Row::new();
        row.insert("name".to_string(), Value::from("a"));

        let id = store.save("people", None, &row).unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.save("people", None, &row).unwrap(), 2);

        row.insert("name".to_string(), Value::from("b"));
        assert_eq!(store.save("people", Some(id), &row).unwrap(), id);
        assert_eq!(store.load("people", id).unwrap().unwrap()["name"], Value::from("b"));
        assert_eq!(store.len("people"), 2);
        assert!(store.is_empty("other"));
    }

    #[test]
    fn test_update_of_missing_row_fails() {
        let store = MemoryStore::new();
        let err = store.save("people", Some(9), &Row::new()).unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                table: "people".to_string(),
                id: 9,
            }
        );
        assert!(store.load("people", 9).unwrap().is_none());
    }
}
