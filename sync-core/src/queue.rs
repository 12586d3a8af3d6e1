//! In-memory change log for Hearth Sync.
//!
//! This is the value the pending queue persists: an ordered list of
//! [`PendingChange`]s. Changes flow through it in this order:
//! 1. `push()` - append a validated change
//! 2. `snapshot()` - copy the current entries for a delivery pass
//! 3. `ack()` - remove the delivered ids
//!
//! Changes pushed between a snapshot and the matching `ack` are untouched by
//! it, so a delivery pass never drops work enqueued while it ran.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use hearth_sync_types::{ChangeId, ChangeOperation, EntityKind, PendingChange};

/// Ordered log of pending changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeLog {
    entries: Vec<PendingChange>,
}

impl ChangeLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change.
    pub fn push(&mut self, change: PendingChange) {
        self.entries.push(change);
    }

    /// Copy of the entries in insertion order.
    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.entries.clone()
    }

    /// Remove every change whose id is in `delivered`.
    ///
    /// Returns the number removed. Unknown ids are ignored.
    pub fn ack(&mut self, delivered: &[ChangeId]) -> usize {
        let delivered: HashSet<&ChangeId> = delivered.iter().collect();
        let before = self.entries.len();
        self.entries.retain(|c| !delivered.contains(&c.id));
        before - self.entries.len()
    }

    /// Ids of entities with a pending delete in `table`.
    pub fn pending_deletes(&self, table: EntityKind) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|c| c.operation == ChangeOperation::Delete && c.table == table)
            .map(|c| c.entity_id().to_string())
            .collect()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries.iter()
    }

    /// Number of pending changes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every change.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl From<Vec<PendingChange>> for ChangeLog {
    fn from(entries: Vec<PendingChange>) -> Self {
        Self { entries }
    }
}
