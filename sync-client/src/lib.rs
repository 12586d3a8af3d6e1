//! # sync-client
//!
//! Encrypted local-first data layer for Hearth.
//!
//! This is the library applications use to store and sync records.
//!
//! ## Features
//!
//! - **Encryption at rest**: XChaCha20-Poly1305 with 192-bit nonces; the
//!   record key never leaves the device keystore
//! - **Integrity**: every record is a checksummed, versioned envelope
//! - **Offline first**: local writes always land; remote writes that fail
//!   are queued and replayed on the next sync
//! - **Pure state machine**: sync status comes from sync-core
//!
//! ## Architecture
//!
//! ```text
//! Application → Vault → SyncCoordinator → RemoteBackend → Network
//!                 ↓            ↓
//!            RecordStore ← PendingChangeQueue
//!                 ↓
//!        RecordCodec (KeyManager) → KvBackend → Disk
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use hearth_sync_client::{ClientConfig, Vault};
//! use hearth_sync_types::Mood;
//!
//! let vault = Vault::open(&ClientConfig::local("./hearth-data"))?;
//!
//! // Stored locally, pushed or queued
//! vault.coordinator().save_mood(Mood::new(4)).await?;
//!
//! // Drain the queue and merge every collection
//! vault.sync_all().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
mod fs;
pub mod keys;
pub mod queue;
pub mod remote;
pub mod store;
pub mod vault;

pub use codec::{RecordCodec, NONCE_SIZE, TAG_SIZE};
pub use config::{ClientConfig, ConfigError, LoggingConfig, RemoteConfig, StorageConfig};
pub use coordinator::{
    CollectionReport, SaveOutcome, SyncCoordinator, SyncOutcome, SyncReport, COLLECTION_KEY,
};
pub use error::VaultError;
pub use keys::{
    Accessibility, EncryptionKey, FileKeystore, KeyManager, Keystore, KeystoreError,
    MemoryKeystore, KEY_ALIAS, KEY_SIZE,
};
pub use queue::{ChangeSender, DrainReport, PendingChangeQueue, QUEUE_KEY};
pub use remote::{
    Identity, LocalOnly, MockRemote, RemoteBackend, RemoteCall, RemoteError, RestRemote, Row,
};
pub use store::{FileBackend, KvBackend, MemoryBackend, RecordStore, ScanReport, StorageError};
pub use vault::Vault;
