//! Encrypted record store for the Hearth vault.
//!
//! Records are addressed by `(category, key)` and persisted through a
//! [`KvBackend`] under the composite key `"<prefix>:<category>:<key>"`.
//! The composite key is also bound into each record's authentication tag,
//! so bytes copied under a different key do not decrypt.
//!
//! # Failure policy
//!
//! - Reads through [`RecordStore::get_item`] never fail: a missing record
//!   and an unreadable one both come back as `None`, the latter with a
//!   warning in the log.
//! - Writes always propagate their errors. A read-modify-write through
//!   [`RecordStore::update_item`] that cannot read the current record fails
//!   without writing, so an unreadable record is never replaced.
//! - Writes to the same `(category, key)` are serialized by a per-key lock.
//!   A key's lock is dropped when the key is removed and nobody else holds it.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use hearth_sync_types::Category;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::codec::RecordCodec;
use crate::error::VaultError;

/// Storage backend errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O on the underlying medium failed.
    #[error("I/O error for {key}: {source}")]
    Io {
        /// Composite key being accessed.
        key: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Key cannot be represented by this backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Backend refused the operation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Opaque byte-oriented key/value storage.
///
/// Implementations must make `put` all-or-nothing: a reader sees either the
/// previous value or the complete new one.
pub trait KvBackend: Send + Sync {
    /// Read the value under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Every key starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Result of a batch read over one category.
#[derive(Debug, Clone)]
pub struct ScanReport<T> {
    /// Readable records, by key, in key order.
    pub items: Vec<(String, T)>,
    /// Keys whose records could not be read.
    pub skipped: Vec<String>,
}

impl<T> ScanReport<T> {
    /// Number of unreadable records.
    pub fn corrupted(&self) -> usize {
        self.skipped.len()
    }
}

/// Category-scoped, encrypted key/value store.
pub struct RecordStore {
    backend: Arc<dyn KvBackend>,
    codec: RecordCodec,
    prefix: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RecordStore {
    /// Create a store over `backend`, namespacing every key with `prefix`.
    pub fn new(backend: Arc<dyn KvBackend>, codec: RecordCodec, prefix: &str) -> Self {
        Self {
            backend,
            codec,
            prefix: prefix.to_string(),
            locks: DashMap::new(),
        }
    }

    /// Composite key for `(category, key)`.
    pub fn composite_key(&self, category: Category, key: &str) -> String {
        format!("{}:{}:{}", self.prefix, category, key)
    }

    fn category_prefix(&self, category: Category) -> String {
        format!("{}:{}:", self.prefix, category)
    }

    fn lock_for(&self, composite: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(composite.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn check_key(key: &str) -> Result<(), VaultError> {
        if key.is_empty() {
            return Err(VaultError::InvalidPayload("record key must not be empty".into()));
        }
        Ok(())
    }

    /// Encode and persist `value` at `(category, key)`, overwriting.
    pub fn set_item<T: Serialize + ?Sized>(
        &self,
        category: Category,
        key: &str,
        value: &T,
    ) -> Result<(), VaultError> {
        Self::check_key(key)?;
        let composite = self.composite_key(category, key);
        let lock = self.lock_for(&composite);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write_locked(&composite, value)
    }

    fn write_locked<T: Serialize + ?Sized>(
        &self,
        composite: &str,
        value: &T,
    ) -> Result<(), VaultError> {
        let bytes = self.codec.encode_bound(value, composite.as_bytes())?;
        self.backend.put(composite, &bytes)?;
        tracing::debug!(key = %composite, bytes = bytes.len(), "Stored record");
        Ok(())
    }

    /// Read `(category, key)`.
    ///
    /// Missing and unreadable records both return `None`; unreadable ones
    /// are logged with their error kind.
    pub fn get_item<T: DeserializeOwned>(&self, category: Category, key: &str) -> Option<T> {
        match self.try_get_item(category, key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    key,
                    kind = e.kind(),
                    "Unreadable record treated as missing: {}",
                    e
                );
                None
            }
        }
    }

    /// Read `(category, key)`, surfacing decode and storage errors.
    pub fn try_get_item<T: DeserializeOwned>(
        &self,
        category: Category,
        key: &str,
    ) -> Result<Option<T>, VaultError> {
        let composite = self.composite_key(category, key);
        self.read(&composite)
    }

    fn read<T: DeserializeOwned>(&self, composite: &str) -> Result<Option<T>, VaultError> {
        match self.backend.get(composite)? {
            Some(bytes) => self
                .codec
                .decode_bound(&bytes, composite.as_bytes())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Read-modify-write `(category, key)` under its lock.
    ///
    /// `f` receives the current value (`None` when missing) and returns the
    /// value to store. If the current record cannot be read or `f` fails,
    /// the error is returned and nothing is written.
    pub fn update_item<T, F>(&self, category: Category, key: &str, f: F) -> Result<T, VaultError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Result<T, VaultError>,
    {
        Self::check_key(key)?;
        let composite = self.composite_key(category, key);
        let lock = self.lock_for(&composite);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.read(&composite).map_err(|e| {
            tracing::warn!(
                key = %composite,
                kind = e.kind(),
                "Update aborted, current record unreadable: {}",
                e
            );
            e
        })?;
        let next = f(current)?;
        self.write_locked(&composite, &next)?;
        Ok(next)
    }

    /// Remove `(category, key)`. Returns whether it existed.
    pub fn remove_item(&self, category: Category, key: &str) -> Result<bool, VaultError> {
        let composite = self.composite_key(category, key);
        let lock = self.lock_for(&composite);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let existed = self.backend.delete(&composite)?;
        // Held by the map and by us only: no writer is waiting on it
        self.locks
            .remove_if(&composite, |_, held| Arc::strong_count(held) <= 2);
        Ok(existed)
    }

    /// Keys stored in `category`, sorted.
    pub fn list_keys(&self, category: Category) -> Result<Vec<String>, VaultError> {
        let prefix = self.category_prefix(category);
        let mut keys: Vec<String> = self
            .backend
            .keys_with_prefix(&prefix)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Remove every record in `category`. Returns the number removed.
    pub fn clear_category(&self, category: Category) -> Result<usize, VaultError> {
        let mut removed = 0;
        for key in self.list_keys(category)? {
            if self.remove_item(category, &key)? {
                removed += 1;
            }
        }
        tracing::debug!(category = %category, removed, "Cleared category");
        Ok(removed)
    }

    /// Remove every record under this store's prefix. Returns the number removed.
    pub fn clear_all(&self) -> Result<usize, VaultError> {
        let mut removed = 0;
        for category in Category::ALL {
            removed += self.clear_category(category)?;
        }
        Ok(removed)
    }

    /// Read every record in `category`, skipping (and counting) unreadable ones.
    pub fn scan_category<T: DeserializeOwned>(
        &self,
        category: Category,
    ) -> Result<ScanReport<T>, VaultError> {
        let mut report = ScanReport {
            items: Vec::new(),
            skipped: Vec::new(),
        };
        for key in self.list_keys(category)? {
            match self.try_get_item(category, &key) {
                Ok(Some(value)) => report.items.push((key, value)),
                // Removed between listing and reading
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        category = %category,
                        key = %key,
                        kind = e.kind(),
                        "Skipping unreadable record: {}",
                        e
                    );
                    report.skipped.push(key);
                }
            }
        }
        Ok(report)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}
