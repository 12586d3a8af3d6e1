//! Vault - wires the key manager, record store, queue and coordinator.
//!
//! A [`Vault`] owns one of each component. There are no process-wide
//! singletons: two vaults over different directories are independent.

use std::path::PathBuf;
use std::sync::Arc;

use hearth_sync_core::SyncState;
use hearth_sync_types::Category;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use crate::codec::RecordCodec;
use crate::config::ClientConfig;
use crate::coordinator::{SyncCoordinator, SyncOutcome};
use crate::error::VaultError;
use crate::keys::{FileKeystore, KeyManager, Keystore, MemoryKeystore, KEY_ALIAS};
use crate::queue::PendingChangeQueue;
use crate::remote::{LocalOnly, RemoteBackend, RestRemote};
use crate::store::{FileBackend, KvBackend, MemoryBackend, RecordStore};

/// Directory under `data_dir` holding record files.
const RECORDS_DIR: &str = "records";

/// Directory under `data_dir` holding the key file.
const KEYS_DIR: &str = "keys";

/// An opened, unlocked vault.
pub struct Vault {
    store: Arc<RecordStore>,
    queue: Arc<PendingChangeQueue>,
    coordinator: Arc<SyncCoordinator>,
}

impl Vault {
    /// Open the vault described by `config`, creating its directories and
    /// key on first use.
    pub fn open(config: &ClientConfig) -> Result<Self, VaultError> {
        let data_dir = &config.storage.data_dir;
        let backend = FileBackend::open(Self::records_dir(config))?;
        let keystore = Self::keystore(config);

        let remote: Arc<dyn RemoteBackend> = match &config.remote {
            Some(remote) => Arc::new(RestRemote::new(remote)?),
            None => Arc::new(LocalOnly),
        };

        let vault = Self::from_parts(
            Arc::new(backend),
            keystore,
            &config.storage.key_prefix,
            remote,
        )?;
        tracing::info!(
            data_dir = %data_dir.display(),
            remote = config.remote.is_some(),
            "Opened vault"
        );
        Ok(vault)
    }

    /// Directory holding the record files of the vault at `config`.
    pub fn records_dir(config: &ClientConfig) -> PathBuf {
        config.storage.data_dir.join(RECORDS_DIR)
    }

    /// Key file of the vault at `config`. It exists once the vault has been
    /// opened at least once.
    pub fn key_file(config: &ClientConfig) -> PathBuf {
        Self::keystore(config).path_for(KEY_ALIAS)
    }

    fn keystore(config: &ClientConfig) -> FileKeystore {
        FileKeystore::new(config.storage.data_dir.join(KEYS_DIR))
    }

    /// Vault held entirely in memory, syncing against `remote`.
    pub fn in_memory(remote: Arc<dyn RemoteBackend>) -> Result<Self, VaultError> {
        Self::from_parts(
            Arc::new(MemoryBackend::new()),
            MemoryKeystore::new(),
            "hearth",
            remote,
        )
    }

    /// Assemble a vault from its parts and load (or create) the record key.
    pub fn from_parts(
        backend: Arc<dyn KvBackend>,
        keystore: impl Keystore + 'static,
        prefix: &str,
        remote: Arc<dyn RemoteBackend>,
    ) -> Result<Self, VaultError> {
        let keys = KeyManager::new(keystore);
        keys.initialize()?;

        let store = Arc::new(RecordStore::new(
            backend,
            RecordCodec::new(Arc::new(keys)),
            prefix,
        ));
        let queue = Arc::new(PendingChangeQueue::new(Arc::clone(&store)));
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            remote,
        ));

        Ok(Self {
            store,
            queue,
            coordinator,
        })
    }

    /// The encrypted record store.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// The pending change queue.
    pub fn queue(&self) -> &Arc<PendingChangeQueue> {
        &self.queue
    }

    /// The sync coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    // ===========================================
    // Storage
    // ===========================================

    /// [`Category::Sync`] belongs to the pending queue and is read-only here.
    fn check_writable(category: Category) -> Result<(), VaultError> {
        if category == Category::Sync {
            return Err(VaultError::InvalidPayload(
                "category sync is reserved for the pending queue".into(),
            ));
        }
        Ok(())
    }

    /// Encrypt and store `value` at `(category, key)`.
    pub fn set_item<T: Serialize + ?Sized>(
        &self,
        category: Category,
        key: &str,
        value: &T,
    ) -> Result<(), VaultError> {
        Self::check_writable(category)?;
        self.store.set_item(category, key, value)
    }

    /// Read `(category, key)`; missing or unreadable records are `None`.
    pub fn get_item<T: DeserializeOwned>(&self, category: Category, key: &str) -> Option<T> {
        self.store.get_item(category, key)
    }

    /// Remove `(category, key)`. Returns whether it existed.
    pub fn remove_item(&self, category: Category, key: &str) -> Result<bool, VaultError> {
        Self::check_writable(category)?;
        self.store.remove_item(category, key)
    }

    /// Keys stored in `category`.
    pub fn list_keys(&self, category: Category) -> Result<Vec<String>, VaultError> {
        self.store.list_keys(category)
    }

    /// Remove every record in `category`.
    pub fn clear_category(&self, category: Category) -> Result<usize, VaultError> {
        Self::check_writable(category)?;
        self.store.clear_category(category)
    }

    /// Remove every record in the vault, queued changes included.
    pub fn clear_all(&self) -> Result<usize, VaultError> {
        let removed = self.store.clear_all()?;
        self.coordinator.refresh_pending();
        tracing::info!(removed, "Cleared vault");
        Ok(removed)
    }

    // ===========================================
    // Sync
    // ===========================================

    /// Run a full sync. See [`SyncCoordinator::sync_all`].
    pub async fn sync_all(&self) -> Result<SyncOutcome, VaultError> {
        self.coordinator.sync_all().await
    }

    /// Current sync state.
    pub fn state(&self) -> SyncState {
        self.coordinator.state()
    }

    /// Observe sync state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.coordinator.subscribe()
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("store", &self.store)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
