//! Mock implementations for testing.
//!
//! Transit doubles wrap [`MemoryTransit`] so ciphertext stays real while
//! calls are counted or failed on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use vault_attributes::{MemoryStore, RecordId, RecordStore, Row, StoreError};
use vault_transit::{MemoryTransit, TransitError, TransitProvider, TransitResult};

/// Which transit operation was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitOp {
    /// `encrypt`
    Encrypt,
    /// `decrypt`
    Decrypt,
}

/// One recorded transit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitCall {
    /// Operation
    pub op: TransitOp,
    /// Transit mount
    pub path: String,
    /// Key id
    pub key: String,
    /// Plaintext or ciphertext handed in
    pub input: Option<String>,
    /// Convergent flag
    pub convergent: bool,
}

/// Transit that records every call before delegating to [`MemoryTransit`].
#[derive(Debug)]
pub struct RecordingTransit {
    inner: MemoryTransit,
    calls: Mutex<Vec<TransitCall>>,
}

impl Default for RecordingTransit {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransit {
    /// Create a recording transit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryTransit::new().with_warning(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<TransitCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of encrypt calls.
    #[must_use]
    pub fn encrypt_count(&self) -> usize {
        self.count(TransitOp::Encrypt)
    }

    /// Number of decrypt calls.
    #[must_use]
    pub fn decrypt_count(&self) -> usize {
        self.count(TransitOp::Decrypt)
    }

    /// Most recent encrypt call.
    #[must_use]
    pub fn last_encrypt(&self) -> Option<TransitCall> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| c.op == TransitOp::Encrypt)
    }

    /// Forget recorded calls.
    pub fn reset(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn count(&self, op: TransitOp) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    fn record(&self, op: TransitOp, path: &str, key: &str, input: Option<&str>, convergent: bool) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TransitCall {
                op,
                path: path.to_string(),
                key: key.to_string(),
                input: input.map(str::to_string),
                convergent,
            });
    }
}

impl TransitProvider for RecordingTransit {
    fn encrypt(
        &self,
        path: &str,
        key: &str,
        plaintext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>> {
        self.record(TransitOp::Encrypt, path, key, plaintext, convergent);
        self.inner.encrypt(path, key, plaintext, convergent)
    }

    fn decrypt(
        &self,
        path: &str,
        key: &str,
        ciphertext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>> {
        self.record(TransitOp::Decrypt, path, key, ciphertext, convergent);
        self.inner.decrypt(path, key, ciphertext, convergent)
    }
}

/// Transit that starts failing after a number of successful calls.
#[derive(Debug)]
pub struct FailingTransit {
    inner: MemoryTransit,
    encrypts_left: AtomicUsize,
    decrypts_left: AtomicUsize,
}

impl FailingTransit {
    /// Fail every call.
    #[must_use]
    pub fn always() -> Self {
        Self::after(0, 0)
    }

    /// Allow `encrypts` encrypt calls and `decrypts` decrypt calls, then fail.
    #[must_use]
    pub fn after(encrypts: usize, decrypts: usize) -> Self {
        Self {
            inner: MemoryTransit::new().with_warning(false),
            encrypts_left: AtomicUsize::new(encrypts),
            decrypts_left: AtomicUsize::new(decrypts),
        }
    }

    /// Allow `encrypts` encrypt calls, then fail; decrypts always succeed.
    #[must_use]
    pub fn encrypt_after(encrypts: usize) -> Self {
        Self::after(encrypts, usize::MAX)
    }

    fn take(budget: &AtomicUsize) -> TransitResult<()> {
        budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| TransitError::unavailable("transit is down"))
    }
}

impl TransitProvider for FailingTransit {
    fn encrypt(
        &self,
        path: &str,
        key: &str,
        plaintext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>> {
        Self::take(&self.encrypts_left)?;
        self.inner.encrypt(path, key, plaintext, convergent)
    }

    fn decrypt(
        &self,
        path: &str,
        key: &str,
        ciphertext: Option<&str>,
        convergent: bool,
    ) -> TransitResult<Option<String>> {
        Self::take(&self.decrypts_left)?;
        self.inner.decrypt(path, key, ciphertext, convergent)
    }
}

/// [`MemoryStore`] that can be told to reject the next save.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    reject_next: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next save fail with [`StoreError::Rejected`].
    pub fn reject_next_save(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Number of committed saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl RecordStore for FlakyStore {
    fn save(&self, table: &str, id: Option<RecordId>, row: &Row) -> Result<RecordId, StoreError> {
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Rejected("constraint violation".to_string()));
        }
        let id = self.inner.save(table, id, row)?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn load(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        self.inner.load(table, id)
    }
}
