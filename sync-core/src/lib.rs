//! # sync-core
//!
//! Pure logic for Hearth Sync (no I/O, instant tests).
//!
//! This crate implements the merge policy, the sync status machine and the
//! in-memory change log without any network or disk I/O, enabling fast
//! unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (encryption, disk, remote calls) is performed by
//! `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod merge;
pub mod queue;
pub mod state;

pub use merge::{merge_collection, merge_with_report, sort_newest_first, MergeReport};
pub use queue::ChangeLog;
pub use state::{Action, SyncEvent, SyncState, SyncStatus};
