//! Key management for the Hearth vault.
//!
//! One symmetric key per installation: generated on first `initialize()`,
//! stored in a [`Keystore`] under a fixed alias, and never rotated.
//!
//! # Security Notes
//!
//! - Keys come from the OS CSPRNG (`getrandom`)
//! - Key material is zeroized on drop and never printed by `Debug`
//! - A stored key of the wrong length is an error, never silently replaced

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::VaultError;
use crate::fs::{create_private_dir, write_atomic};

/// Key size for XChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Alias the record key is stored under.
pub const KEY_ALIAS: &str = "hearth.record-key.v1";

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Reading or writing the key file failed.
    #[error("keystore I/O error at {path}: {source}")]
    Io {
        /// Path of the key file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Stored key has the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The OS random number generator failed.
    #[error("random number generator failed: {0}")]
    Rng(String),
}

/// When a stored secret may be read back.
///
/// Both variants keep the secret on this device only: it is never part of
/// a backup or migrated to another device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessibility {
    /// Readable only while the device is unlocked.
    DeviceOnlyWhenUnlocked,
    /// Readable after the first unlock following boot.
    DeviceOnlyAfterFirstUnlock,
}

/// Secure storage for small secrets, keyed by alias.
pub trait Keystore: Send + Sync {
    /// Read the secret stored under `alias`, if any.
    fn read(&self, alias: &str) -> Result<Option<Zeroizing<Vec<u8>>>, KeystoreError>;

    /// Store `secret` under `alias`, replacing any previous value.
    fn write(
        &self,
        alias: &str,
        secret: &[u8],
        accessibility: Accessibility,
    ) -> Result<(), KeystoreError>;
}

/// The record encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a fresh random key.
    pub fn generate() -> Result<Self, KeystoreError> {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|e| KeystoreError::Rng(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Build a key from stored bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeystoreError> {
        let array: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| KeystoreError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

// Don't leak key material in debug output
impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

/// Obtains and holds the installation's record key.
pub struct KeyManager {
    keystore: Box<dyn Keystore>,
    key: OnceLock<EncryptionKey>,
    init_lock: Mutex<()>,
}

impl KeyManager {
    /// Create a key manager over `keystore`. No key is loaded yet.
    pub fn new(keystore: impl Keystore + 'static) -> Self {
        Self {
            keystore: Box::new(keystore),
            key: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Load the key from the keystore, generating and storing one if absent.
    ///
    /// Idempotent: once a key is held, later calls return immediately.
    pub fn initialize(&self) -> Result<(), VaultError> {
        if self.key.get().is_some() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.key.get().is_some() {
            return Ok(());
        }

        let key = match self.keystore.read(KEY_ALIAS)? {
            Some(stored) => {
                tracing::debug!("Loaded record key from keystore");
                EncryptionKey::from_bytes(&stored)?
            }
            None => {
                let key = EncryptionKey::generate()?;
                self.keystore.write(
                    KEY_ALIAS,
                    key.as_bytes(),
                    Accessibility::DeviceOnlyWhenUnlocked,
                )?;
                tracing::info!("Generated new record key");
                key
            }
        };

        // Only this thread sets the key while holding init_lock
        let _ = self.key.set(key);
        Ok(())
    }

    /// The record key.
    ///
    /// # Errors
    ///
    /// [`VaultError::KeyNotInitialized`] before `initialize()` succeeded.
    pub fn key(&self) -> Result<&EncryptionKey, VaultError> {
        self.key.get().ok_or(VaultError::KeyNotInitialized)
    }

    /// Whether a key is held.
    pub fn is_initialized(&self) -> bool {
        self.key.get().is_some()
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// In-memory keystore, for tests and ephemeral vaults.
#[derive(Default)]
pub struct MemoryKeystore {
    entries: Mutex<HashMap<String, (Zeroizing<Vec<u8>>, Accessibility)>>,
}

impl MemoryKeystore {
    /// Create an empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accessibility a secret was stored with.
    pub fn accessibility(&self, alias: &str) -> Option<Accessibility> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(alias).map(|(_, access)| *access)
    }
}

impl std::fmt::Debug for MemoryKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("MemoryKeystore")
            .field("aliases", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Keystore for MemoryKeystore {
    fn read(&self, alias: &str) -> Result<Option<Zeroizing<Vec<u8>>>, KeystoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(alias).map(|(secret, _)| secret.clone()))
    }

    fn write(
        &self,
        alias: &str,
        secret: &[u8],
        accessibility: Accessibility,
    ) -> Result<(), KeystoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            alias.to_string(),
            (Zeroizing::new(secret.to_vec()), accessibility),
        );
        Ok(())
    }
}

// Lets a caller keep a handle on the keystore it hands to a KeyManager
impl<K: Keystore> Keystore for std::sync::Arc<K> {
    fn read(&self, alias: &str) -> Result<Option<Zeroizing<Vec<u8>>>, KeystoreError> {
        (**self).read(alias)
    }

    fn write(
        &self,
        alias: &str,
        secret: &[u8],
        accessibility: Accessibility,
    ) -> Result<(), KeystoreError> {
        (**self).write(alias, secret, accessibility)
    }
}

/// File-backed keystore.
///
/// Each secret is a file named `<alias>.key` inside a directory created
/// with 0700 permissions; the file itself is 0600. Stands in for a
/// platform keystore on desktop and in the CLI.
#[derive(Debug, Clone)]
pub struct FileKeystore {
    dir: PathBuf,
}

impl FileKeystore {
    /// Create a keystore rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the secret stored under `alias`.
    pub fn path_for(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}.key"))
    }

    fn io_error(path: &Path, source: std::io::Error) -> KeystoreError {
        KeystoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Keystore for FileKeystore {
    fn read(&self, alias: &str) -> Result<Option<Zeroizing<Vec<u8>>>, KeystoreError> {
        let path = self.path_for(alias);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn write(
        &self,
        alias: &str,
        secret: &[u8],
        _accessibility: Accessibility,
    ) -> Result<(), KeystoreError> {
        // Owner-only permissions are the closest a plain file gets to
        // device-only accessibility
        create_private_dir(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        let path = self.path_for(alias);
        write_atomic(&path, secret).map_err(|e| Self::io_error(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    // ===========================================
    // EncryptionKey Tests
    // ===========================================

    #[test]
    fn generated_keys_differ() {
        let a = EncryptionKey::generate().unwrap();
        let b = EncryptionKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EncryptionKey::from_bytes(&[7u8; KEY_SIZE]).unwrap();
        let debug = format!("{:?}", key);
        assert_eq!(debug, "EncryptionKey([REDACTED])");
    }

    #[test]
    fn wrong_length_is_rejected() {
        let result = EncryptionKey::from_bytes(&[1u8; 16]);
        assert!(matches!(
            result,
            Err(KeystoreError::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    // ===========================================
    // KeyManager Tests
    // ===========================================

    #[test]
    fn key_before_initialize_fails() {
        let manager = KeyManager::new(MemoryKeystore::new());
        assert!(matches!(manager.key(), Err(VaultError::KeyNotInitialized)));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn initialize_generates_and_stores_key() {
        let keystore = Arc::new(MemoryKeystore::new());
        let manager = KeyManager::new(Arc::clone(&keystore));

        manager.initialize().unwrap();

        let stored = keystore.read(KEY_ALIAS).unwrap().unwrap();
        assert_eq!(stored.as_slice(), manager.key().unwrap().as_bytes());
        assert_eq!(
            keystore.accessibility(KEY_ALIAS),
            Some(Accessibility::DeviceOnlyWhenUnlocked)
        );
    }

    #[test]
    fn initialize_is_idempotent() {
        let manager = KeyManager::new(MemoryKeystore::new());
        manager.initialize().unwrap();
        let first = *manager.key().unwrap().as_bytes();

        manager.initialize().unwrap();
        assert_eq!(*manager.key().unwrap().as_bytes(), first);
    }

    #[test]
    fn existing_key_is_reused() {
        let keystore = Arc::new(MemoryKeystore::new());
        keystore
            .write(KEY_ALIAS, &[9u8; KEY_SIZE], Accessibility::DeviceOnlyWhenUnlocked)
            .unwrap();

        let manager = KeyManager::new(Arc::clone(&keystore));
        manager.initialize().unwrap();

        assert_eq!(manager.key().unwrap().as_bytes(), &[9u8; KEY_SIZE]);
    }

    #[test]
    fn corrupt_stored_key_is_an_error() {
        let keystore = Arc::new(MemoryKeystore::new());
        keystore
            .write(KEY_ALIAS, &[1, 2, 3], Accessibility::DeviceOnlyWhenUnlocked)
            .unwrap();

        let manager = KeyManager::new(Arc::clone(&keystore));
        let result = manager.initialize();

        assert!(matches!(result, Err(VaultError::Keystore(_))));
        // The bad key must not be overwritten
        assert_eq!(keystore.read(KEY_ALIAS).unwrap().unwrap().len(), 3);
    }

    // ===========================================
    // FileKeystore Tests
    // ===========================================

    #[test]
    fn file_keystore_missing_alias_is_none() {
        let dir = tempdir().unwrap();
        let keystore = FileKeystore::new(dir.path().join("keys"));
        assert!(keystore.read(KEY_ALIAS).unwrap().is_none());
    }

    #[test]
    fn file_keystore_survives_reopen() {
        let dir = tempdir().unwrap();
        let key_dir = dir.path().join("keys");

        let first = KeyManager::new(FileKeystore::new(&key_dir));
        first.initialize().unwrap();
        let bytes = *first.key().unwrap().as_bytes();

        let second = KeyManager::new(FileKeystore::new(&key_dir));
        second.initialize().unwrap();
        assert_eq!(*second.key().unwrap().as_bytes(), bytes);
    }

    #[cfg(unix)]
    #[test]
    fn file_keystore_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let key_dir = dir.path().join("keys");
        let keystore = FileKeystore::new(&key_dir);
        keystore
            .write(KEY_ALIAS, &[0u8; KEY_SIZE], Accessibility::DeviceOnlyWhenUnlocked)
            .unwrap();

        let dir_mode = std::fs::metadata(&key_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700, "dir should be 0700");

        let file = key_dir.join(format!("{KEY_ALIAS}.key"));
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600, "file should be 0600");
    }
}
