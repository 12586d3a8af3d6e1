//! # sync-types
//!
//! Record and entity types for the Hearth local-first data layer.
//!
//! This crate provides the foundational types used across all Hearth Sync crates:
//! - [`Envelope`] - Versioned, checksummed wrapper stored in place of a raw value
//! - [`Category`] - Closed set of storage domains
//! - [`Mood`], [`JournalEntry`], [`Habit`], [`Reminder`] - Syncable entities
//! - [`PendingChange`] - A validated, unconfirmed local mutation
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod category;
mod change;
mod entity;
mod envelope;
mod error;
mod ids;

pub use category::Category;
pub use change::{ChangeOperation, ChangePayload, PendingChange};
pub use entity::{
    Entity, EntityKind, EntityRecord, Habit, HabitFrequency, JournalEntry, Mood, Reminder,
};
pub use envelope::{canonical_bytes, checksum, Envelope, ENVELOPE_VERSION};
pub use error::TypesError;
pub use ids::{new_entity_id, now_millis, ChangeId};
