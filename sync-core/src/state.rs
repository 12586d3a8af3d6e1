//! Sync status state machine for Hearth Sync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! coordinator's status. It takes events as input and produces a new state
//! plus a list of actions to execute.
//!
//! The actual work (draining the queue, pulling collections, notifying
//! observers) is performed by sync-client, not by this module.

use serde::{Deserialize, Serialize};

/// Coarse sync status shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No sync has run yet.
    #[default]
    Idle,
    /// A sync is in flight.
    Syncing,
    /// The last sync completed.
    Success,
    /// The last sync failed; the queue is kept for retry.
    Error,
    /// Sync preconditions are not met (no remote or no identity).
    Offline,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// Snapshot of the coordinator's status.
///
/// Process-lifetime only. On startup it is rebuilt from the pending queue
/// length; `last_sync_at` starts empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Current status.
    pub status: SyncStatus,
    /// When the last successful sync finished (Unix millis).
    pub last_sync_at: Option<i64>,
    /// Number of changes waiting in the pending queue.
    pub pending_count: usize,
    /// Message of the last failure, cleared when a new sync starts.
    pub error: Option<String>,
}

impl SyncState {
    /// Create an idle state with `pending_count` queued changes.
    pub fn new(pending_count: usize) -> Self {
        Self {
            pending_count,
            ..Self::default()
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: SyncEvent) -> (Self, Vec<Action>) {
        match (self.status, event) {
            // A run is already in flight; nothing else may start or go offline
            (SyncStatus::Syncing, SyncEvent::Started | SyncEvent::PreconditionsFailed) => {
                (self, vec![])
            }

            (_, SyncEvent::Started) => (
                Self {
                    status: SyncStatus::Syncing,
                    error: None,
                    ..self
                },
                vec![Action::Publish, Action::BeginSync],
            ),

            (_, SyncEvent::PreconditionsFailed) => {
                if self.status == SyncStatus::Offline {
                    return (self, vec![]);
                }
                (
                    Self {
                        status: SyncStatus::Offline,
                        ..self
                    },
                    vec![Action::Publish],
                )
            }

            (SyncStatus::Syncing, SyncEvent::Completed { at }) => (
                Self {
                    status: SyncStatus::Success,
                    last_sync_at: Some(at),
                    error: None,
                    ..self
                },
                vec![Action::Publish],
            ),

            (SyncStatus::Syncing, SyncEvent::Failed { message }) => (
                Self {
                    status: SyncStatus::Error,
                    error: Some(message),
                    ..self
                },
                vec![Action::Publish],
            ),

            (_, SyncEvent::PendingChanged(count)) => {
                if count == self.pending_count {
                    return (self, vec![]);
                }
                (
                    Self {
                        pending_count: count,
                        ..self
                    },
                    vec![Action::Publish],
                )
            }

            // Invalid transitions - stay in current state
            (_, _) => (self, vec![]),
        }
    }

    /// Check if a sync may start from this state.
    pub fn can_start(&self) -> bool {
        self.status != SyncStatus::Syncing
    }

    /// Check if a sync is in flight.
    pub fn is_syncing(&self) -> bool {
        self.status == SyncStatus::Syncing
    }
}

/// Events that drive the status machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync run was requested and preconditions hold.
    Started,
    /// A sync run was requested but there is no remote or identity.
    PreconditionsFailed,
    /// Every collection was pulled, merged and persisted.
    Completed {
        /// Completion time (Unix millis).
        at: i64,
    },
    /// A step of the run failed.
    Failed {
        /// Error message describing the failure.
        message: String,
    },
    /// The pending queue length changed.
    PendingChanged(usize),
}

/// Actions to be executed by the sync-client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Push the new state to observers.
    Publish,
    /// Proceed with the run: drain, pull, merge, persist.
    BeginSync,
}
