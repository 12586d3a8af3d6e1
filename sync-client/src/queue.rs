//! Durable queue of pending changes.
//!
//! The queue is a [`ChangeLog`] stored in the record store at
//! `(sync, "pending_changes")`, rewritten in full on every mutation.
//!
//! # Delivery
//!
//! [`PendingChangeQueue::drain`] offers every change in insertion order to a
//! [`ChangeSender`]. A failure leaves that change queued and moves on to the
//! next one. Delivered changes are removed from the queue as it is *after*
//! the pass, so changes enqueued meanwhile are kept. Delivery is
//! at-least-once; receivers must treat writes as upserts and deletes as
//! delete-if-exists.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_sync_core::ChangeLog;
use hearth_sync_types::{Category, ChangeId, EntityKind, PendingChange};

use crate::error::VaultError;
use crate::store::RecordStore;

/// Record key the queue is stored under, in [`Category::Sync`].
pub const QUEUE_KEY: &str = "pending_changes";

/// Delivers one change to wherever it needs to go.
#[async_trait]
pub trait ChangeSender: Send + Sync {
    /// Deliver `change`. An error leaves it queued for a later drain.
    async fn send(&self, change: &PendingChange) -> Result<(), VaultError>;
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Changes offered to the sender.
    pub attempted: usize,
    /// Changes delivered and removed.
    pub delivered: usize,
    /// Changes that failed and stay queued.
    pub failed: usize,
}

/// Durable, ordered log of unconfirmed mutations.
pub struct PendingChangeQueue {
    store: Arc<RecordStore>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl PendingChangeQueue {
    /// Create a queue persisted in `store`.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn load(&self) -> ChangeLog {
        self.store
            .get_item(Category::Sync, QUEUE_KEY)
            .unwrap_or_default()
    }

    fn try_load(&self) -> Result<ChangeLog, VaultError> {
        Ok(self
            .store
            .try_get_item(Category::Sync, QUEUE_KEY)?
            .unwrap_or_default())
    }

    /// Apply `f` to the persisted log. An unreadable log is an error and is
    /// left untouched.
    fn modify<F>(&self, f: F) -> Result<ChangeLog, VaultError>
    where
        F: FnOnce(&mut ChangeLog),
    {
        self.store
            .update_item(Category::Sync, QUEUE_KEY, |current: Option<ChangeLog>| {
                let mut log = current.unwrap_or_default();
                f(&mut log);
                Ok(log)
            })
    }

    /// Validate and append `change`, persisting the whole queue.
    ///
    /// Returns the new queue length.
    pub fn enqueue(&self, change: PendingChange) -> Result<usize, VaultError> {
        change.validate()?;
        tracing::debug!(
            id = %change.id,
            table = change.table.table(),
            operation = ?change.operation,
            "Queued change"
        );
        Ok(self.modify(|log| log.push(change))?.len())
    }

    /// Offer every queued change to `sender` and remove the delivered ones.
    ///
    /// Only one drain runs at a time; a second caller waits for the first.
    /// An unreadable queue fails the drain before anything is sent.
    pub async fn drain(&self, sender: &dyn ChangeSender) -> Result<DrainReport, VaultError> {
        let _guard = self.drain_lock.lock().await;

        let snapshot = self.try_load()?.snapshot();
        let mut report = DrainReport {
            attempted: snapshot.len(),
            ..DrainReport::default()
        };
        let mut delivered: Vec<ChangeId> = Vec::with_capacity(snapshot.len());

        for change in &snapshot {
            match sender.send(change).await {
                Ok(()) => delivered.push(change.id),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        id = %change.id,
                        table = change.table.table(),
                        kind = e.kind(),
                        "Delivery failed, change stays queued: {}",
                        e
                    );
                }
            }
        }

        if !delivered.is_empty() {
            self.modify(|log| {
                report.delivered = log.ack(&delivered);
            })?;
        }

        tracing::debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Drained pending changes"
        );
        Ok(report)
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.load().len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    /// Queued changes in insertion order.
    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.load().snapshot()
    }

    /// Drop every queued change.
    pub fn clear(&self) -> Result<(), VaultError> {
        self.store.remove_item(Category::Sync, QUEUE_KEY)?;
        Ok(())
    }

    /// Ids of `table` entities with a queued delete.
    pub fn pending_deletes(&self, table: EntityKind) -> HashSet<String> {
        self.load().pending_deletes(table)
    }

    /// Whether any queued change targets entity `id` in `table`.
    pub fn has_pending_for(&self, table: EntityKind, id: &str) -> bool {
        self.load()
            .iter()
            .any(|c| c.table == table && c.entity_id() == id)
    }
}

impl std::fmt::Debug for PendingChangeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChangeQueue").finish_non_exhaustive()
    }
}
