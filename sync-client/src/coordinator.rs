//! SyncCoordinator - reconciles local collections with the remote backend.
//!
//! The coordinator drives the pure status machine from sync-core and
//! interprets its actions: publishing state to observers and running the
//! sync itself.
//!
//! ```text
//! save_entity ──► RecordStore (always) ──► RemoteBackend ──► done
//!                                              │ failure / offline
//!                                              ▼
//!                                      PendingChangeQueue
//!
//! sync_all ──► drain queue ──► for each kind: select ─► merge ─► persist
//! ```
//!
//! # Guarantees
//!
//! - Local writes never depend on the remote being reachable.
//! - Only one `sync_all` runs at a time; a second caller gets
//!   [`VaultError::AlreadySyncing`] without touching the remote.
//! - A failed sync keeps the queue and every collection persisted before
//!   the failure; the failing collection is left as it was.
//! - Remote rows whose id has a queued delete are left out of the merge,
//!   so a local delete is not undone by a sync that runs before the delete
//!   reaches the remote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hearth_sync_core::{merge_with_report, sort_newest_first, Action, SyncEvent, SyncState};
use hearth_sync_types::{
    now_millis, ChangeOperation, ChangePayload, Entity, EntityKind, Habit, JournalEntry, Mood,
    PendingChange, Reminder,
};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::VaultError;
use crate::queue::{ChangeSender, DrainReport, PendingChangeQueue};
use crate::remote::{row_id, Identity, RemoteBackend, Row};
use crate::store::RecordStore;

/// Record key each entity collection is stored under, in its kind's category.
pub const COLLECTION_KEY: &str = "collection";

/// Result of [`SyncCoordinator::sync_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The sync ran to completion.
    Completed(SyncReport),
    /// No remote backend or no identity; nothing was attempted.
    Offline,
}

/// What a completed sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Queue drain results.
    pub drain: DrainReport,
    /// Per-kind merge results, in sync order.
    pub collections: Vec<CollectionReport>,
}

/// Merge results for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    /// Which collection.
    pub kind: EntityKind,
    /// Size of the persisted merged collection.
    pub merged: usize,
    /// Local entities kept because the remote has no such id.
    pub local_only: usize,
    /// Ids whose local value was replaced by the remote one.
    pub overridden: Vec<String>,
    /// Remote rows that could not be decoded or failed validation.
    pub skipped_rows: usize,
    /// Remote rows left out because a delete for them is queued.
    pub excluded_deletes: usize,
}

/// Where a per-entity write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Stored locally and confirmed by the remote.
    Synced,
    /// Stored locally; the remote write is queued.
    Queued,
}

/// Coordinates local writes, the pending queue and remote sync.
pub struct SyncCoordinator {
    store: Arc<RecordStore>,
    queue: Arc<PendingChangeQueue>,
    remote: Arc<dyn RemoteBackend>,
    in_flight: AtomicBool,
    state: watch::Sender<SyncState>,
}

impl SyncCoordinator {
    /// Create a coordinator. The initial state is idle with the queue's
    /// current length as `pending_count`.
    pub fn new(
        store: Arc<RecordStore>,
        queue: Arc<PendingChangeQueue>,
        remote: Arc<dyn RemoteBackend>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::new(queue.len()));
        Self {
            store,
            queue,
            remote,
            in_flight: AtomicBool::new(false),
            state,
        }
    }

    // ===========================================
    // State
    // ===========================================

    /// Current state snapshot.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Invoke `listener` with each newly published state.
    ///
    /// The task ends when the coordinator is dropped; abort the handle to
    /// stop listening earlier.
    pub fn on_state_change<F>(&self, listener: F) -> JoinHandle<()>
    where
        F: Fn(SyncState) + Send + 'static,
    {
        let mut rx = self.state.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                listener(state);
            }
        })
    }

    fn apply(&self, event: SyncEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        self.state.send_if_modified(|state| {
            let (next, produced) = state.clone().on_event(event);
            *state = next;
            let publish = produced.contains(&Action::Publish);
            actions = produced;
            publish
        });
        actions
    }

    pub(crate) fn refresh_pending(&self) {
        self.apply(SyncEvent::PendingChanged(self.queue.len()));
    }

    /// The identity to sync as, if a remote is configured and signed in.
    async fn sync_identity(&self) -> Option<Identity> {
        if !self.remote.is_configured() {
            return None;
        }
        self.remote.identity().await
    }

    /// Whether sync preconditions hold: a configured remote and an identity.
    pub async fn can_sync(&self) -> bool {
        self.sync_identity().await.is_some()
    }

    // ===========================================
    // Full sync
    // ===========================================

    /// Drain the queue, then pull, merge and persist every collection.
    ///
    /// Returns `Ok(SyncOutcome::Offline)` without touching the remote when
    /// preconditions fail, and `Err(AlreadySyncing)` when a sync is in
    /// flight. Any other error moves the state to `Error` and is returned.
    pub async fn sync_all(&self) -> Result<SyncOutcome, VaultError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync requested while another is in flight");
            return Err(VaultError::AlreadySyncing);
        }
        let _guard = InFlight { coordinator: self };

        let Some(owner) = self.sync_identity().await else {
            self.apply(SyncEvent::PreconditionsFailed);
            tracing::info!("Sync skipped: no remote backend or no signed-in identity");
            return Ok(SyncOutcome::Offline);
        };

        if !self.apply(SyncEvent::Started).contains(&Action::BeginSync) {
            return Err(VaultError::AlreadySyncing);
        }
        tracing::info!(user = %owner.user_id, "Sync started");

        match self.run(&owner).await {
            Ok(report) => {
                self.refresh_pending();
                self.apply(SyncEvent::Completed { at: now_millis() });
                tracing::info!(
                    delivered = report.drain.delivered,
                    failed = report.drain.failed,
                    collections = report.collections.len(),
                    "Sync completed"
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(e) => {
                self.refresh_pending();
                self.apply(SyncEvent::Failed {
                    message: e.to_string(),
                });
                tracing::error!(kind = e.kind(), "Sync failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, owner: &Identity) -> Result<SyncReport, VaultError> {
        let sender = RemoteSender {
            remote: self.remote.as_ref(),
            owner,
        };
        let drain = self.queue.drain(&sender).await?;
        self.refresh_pending();

        let mut collections = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let report = match kind {
                EntityKind::Mood => self.sync_collection::<Mood>(owner).await?,
                EntityKind::Journal => self.sync_collection::<JournalEntry>(owner).await?,
                EntityKind::Habit => self.sync_collection::<Habit>(owner).await?,
                EntityKind::Reminder => self.sync_collection::<Reminder>(owner).await?,
            };
            collections.push(report);
        }

        Ok(SyncReport { drain, collections })
    }

    async fn sync_collection<E: Entity>(
        &self,
        owner: &Identity,
    ) -> Result<CollectionReport, VaultError> {
        let kind = E::KIND;
        let rows = self.remote.select(kind, owner).await?;
        let pending_deletes = self.queue.pending_deletes(kind);

        let mut skipped_rows = 0;
        let mut excluded_deletes = 0;
        let mut remote = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_row::<E>(row) {
                Ok(entity) if pending_deletes.contains(entity.id()) => excluded_deletes += 1,
                Ok(entity) => remote.push(entity),
                Err(e) => {
                    skipped_rows += 1;
                    tracing::warn!(
                        table = kind.table(),
                        kind = e.kind(),
                        "Skipping undecodable remote row: {}",
                        e
                    );
                }
            }
        }

        // Merge against the freshest local copy, under the collection's lock
        let mut merge_report = None;
        let merged = self.store.update_item(
            kind.category(),
            COLLECTION_KEY,
            |local: Option<Vec<E>>| {
                let (merged, report) = merge_with_report(local.unwrap_or_default(), remote);
                merge_report = Some(report);
                Ok(merged)
            },
        )?;
        let merge_report = merge_report.unwrap_or_default();

        tracing::debug!(
            table = kind.table(),
            merged = merged.len(),
            local_only = merge_report.local_only,
            overridden = merge_report.overridden.len(),
            skipped_rows,
            excluded_deletes,
            "Merged collection"
        );

        Ok(CollectionReport {
            kind,
            merged: merged.len(),
            local_only: merge_report.local_only,
            overridden: merge_report.overridden,
            skipped_rows,
            excluded_deletes,
        })
    }

    // ===========================================
    // Per-entity operations
    // ===========================================

    /// Local collection of `E`, newest first. Unreadable collections read
    /// as empty.
    pub fn get_entities<E: Entity>(&self) -> Vec<E> {
        self.store
            .get_item(E::KIND.category(), COLLECTION_KEY)
            .unwrap_or_default()
    }

    /// Validate and store `entity` locally, then push it to the remote or
    /// queue it.
    pub async fn save_entity<E: Entity>(&self, entity: E) -> Result<SaveOutcome, VaultError> {
        entity.validate()?;

        let mut existed = false;
        self.store.update_item(
            E::KIND.category(),
            COLLECTION_KEY,
            |current: Option<Vec<E>>| {
                let mut items = current.unwrap_or_default();
                match items.iter_mut().find(|item| item.id() == entity.id()) {
                    Some(slot) => {
                        existed = true;
                        *slot = entity.clone();
                    }
                    None => items.push(entity.clone()),
                }
                sort_newest_first(&mut items);
                Ok(items)
            },
        )?;

        let record = entity.into_record();
        let change = if existed {
            PendingChange::update(record)?
        } else {
            PendingChange::insert(record)?
        };
        self.deliver_or_queue(change).await
    }

    /// Remove entity `id` of `kind` locally, then delete it remotely or
    /// queue the delete.
    pub async fn delete_entity(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<SaveOutcome, VaultError> {
        let change = PendingChange::delete(kind, id)?;

        let mut removed = false;
        self.store.update_item(
            kind.category(),
            COLLECTION_KEY,
            |current: Option<Vec<Value>>| {
                let mut items = current.unwrap_or_default();
                let before = items.len();
                items.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
                removed = items.len() != before;
                Ok(items)
            },
        )?;
        tracing::debug!(table = kind.table(), id, removed, "Deleted entity locally");

        self.deliver_or_queue(change).await
    }

    /// Save a mood check-in.
    pub async fn save_mood(&self, mood: Mood) -> Result<SaveOutcome, VaultError> {
        self.save_entity(mood).await
    }

    /// Save a journal entry.
    pub async fn save_journal(&self, entry: JournalEntry) -> Result<SaveOutcome, VaultError> {
        self.save_entity(entry).await
    }

    /// Save a habit.
    pub async fn save_habit(&self, habit: Habit) -> Result<SaveOutcome, VaultError> {
        self.save_entity(habit).await
    }

    /// Save a reminder.
    pub async fn save_reminder(&self, reminder: Reminder) -> Result<SaveOutcome, VaultError> {
        self.save_entity(reminder).await
    }

    async fn deliver_or_queue(&self, change: PendingChange) -> Result<SaveOutcome, VaultError> {
        // Earlier changes for this entity are still queued; stay behind them
        if self.queue.has_pending_for(change.table, change.entity_id()) {
            return self.enqueue(change);
        }

        let Some(owner) = self.sync_identity().await else {
            return self.enqueue(change);
        };

        match push_change(self.remote.as_ref(), &owner, &change, false).await {
            Ok(()) => {
                tracing::debug!(
                    table = change.table.table(),
                    id = change.entity_id(),
                    "Wrote change to remote"
                );
                Ok(SaveOutcome::Synced)
            }
            Err(e) => {
                tracing::warn!(
                    table = change.table.table(),
                    id = change.entity_id(),
                    kind = e.kind(),
                    "Remote write failed, queueing change: {}",
                    e
                );
                self.enqueue(change)
            }
        }
    }

    fn enqueue(&self, change: PendingChange) -> Result<SaveOutcome, VaultError> {
        let len = self.queue.enqueue(change)?;
        self.apply(SyncEvent::PendingChanged(len));
        Ok(SaveOutcome::Queued)
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("state", &*self.state.borrow())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when a sync ends, including when its future
/// is dropped mid-run.
struct InFlight<'a> {
    coordinator: &'a SyncCoordinator,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.coordinator.state.borrow().is_syncing() {
            self.coordinator.apply(SyncEvent::Failed {
                message: "sync interrupted".into(),
            });
        }
        self.coordinator.in_flight.store(false, Ordering::Release);
    }
}

/// Replays queued changes against the remote.
struct RemoteSender<'a> {
    remote: &'a dyn RemoteBackend,
    owner: &'a Identity,
}

#[async_trait]
impl<'a> ChangeSender for RemoteSender<'a> {
    async fn send(&self, change: &PendingChange) -> Result<(), VaultError> {
        push_change(self.remote, self.owner, change, true).await
    }
}

/// Write one change to the remote.
///
/// Replays use upsert for inserts too, since an earlier attempt may have
/// landed before its acknowledgement was lost.
async fn push_change(
    remote: &dyn RemoteBackend,
    owner: &Identity,
    change: &PendingChange,
    replay: bool,
) -> Result<(), VaultError> {
    match (&change.payload, change.operation) {
        (ChangePayload::Key { id }, _) => remote.delete(change.table, owner, id).await?,
        (ChangePayload::Record { record }, ChangeOperation::Insert) if !replay => {
            remote.insert(change.table, owner, record.to_row()?).await?
        }
        (ChangePayload::Record { record }, _) => {
            remote.upsert(change.table, owner, record.to_row()?).await?
        }
    }
    Ok(())
}

fn decode_row<E: Entity>(row: Row) -> Result<E, VaultError> {
    let id = row_id(&row).map(str::to_string)?;
    let entity: E = serde_json::from_value(row)
        .map_err(|e| VaultError::Serialization(format!("row {id}: {e}")))?;
    entity.validate()?;
    Ok(entity)
}
