//! In-memory key/value backend.
//!
//! Allows injecting failures and corrupting stored bytes for testing.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{KvBackend, StorageError};

/// In-memory backend. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryBackendInner>>,
}

#[derive(Debug, Default)]
struct MemoryBackendInner {
    entries: BTreeMap<String, Vec<u8>>,
    fail_next_get: Option<String>,
    fail_next_put: Option<String>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.keys().cloned().collect()
    }

    /// Flip the last byte stored under `key`, if present.
    pub fn corrupt(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = inner.entries.get_mut(key).and_then(|v| v.last_mut()) {
            *last ^= 0xFF;
        }
    }

    /// Cause the next get() to fail with the given error.
    pub fn fail_next_get(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_next_get = Some(error.to_string());
    }

    /// Cause the next put() to fail with the given error.
    pub fn fail_next_put(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_next_put = Some(error.to_string());
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(error) = inner.fail_next_get.take() {
            return Err(StorageError::Unavailable(error));
        }
        Ok(inner.entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(error) = inner.fail_next_put.take() {
            return Err(StorageError::Unavailable(error));
        }
        inner.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.entries.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
