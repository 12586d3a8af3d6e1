//! Remote backend abstraction for Hearth Sync.
//!
//! The remote side is a narrow, row-oriented contract: per-table select,
//! insert, upsert and delete, every call scoped to the signed-in owner.
//! Rows are JSON objects carrying the entity's fields plus a `user_id`
//! owner column.
//!
//! # Design
//!
//! - `is_configured()` and `identity()` decide whether sync can run at all
//! - Writes are idempotent on the remote side (upsert by id,
//!   delete-if-exists) because queued changes may be delivered twice
//! - Implementations: [`MockRemote`] for tests, [`RestRemote`] for a
//!   PostgREST-style HTTP API, [`LocalOnly`] when no backend is configured

mod mock;
mod rest;

pub use mock::{MockRemote, RemoteCall};
pub use rest::RestRemote;

use async_trait::async_trait;
use hearth_sync_types::EntityKind;
use serde_json::Value;
use thiserror::Error;

/// A remote row: a JSON object.
pub type Row = Value;

/// Name of the owner column on every remote table.
pub const OWNER_COLUMN: &str = "user_id";

/// Remote backend errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No backend URL or credentials.
    #[error("remote backend not configured")]
    NotConfigured,

    /// No signed-in identity.
    #[error("no authenticated identity")]
    NoIdentity,

    /// Transport failure.
    #[error("network failure: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Backend answered with an error status.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Error body or description.
        message: String,
    },

    /// A row could not be built or understood.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl RemoteError {
    /// Whether the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout => true,
            RemoteError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The signed-in user that remote rows are scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Owner id stored in the owner column.
    pub user_id: String,
}

impl Identity {
    /// Create an identity for `user_id`.
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

/// Row-oriented remote storage.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Whether a backend is configured at all.
    fn is_configured(&self) -> bool;

    /// The signed-in identity, if any.
    async fn identity(&self) -> Option<Identity>;

    /// Every row of `table` owned by `owner`.
    async fn select(&self, table: EntityKind, owner: &Identity) -> Result<Vec<Row>, RemoteError>;

    /// Insert a new row. Fails if the id already exists.
    async fn insert(&self, table: EntityKind, owner: &Identity, row: Row)
        -> Result<(), RemoteError>;

    /// Insert or replace the row with the same id.
    async fn upsert(&self, table: EntityKind, owner: &Identity, row: Row)
        -> Result<(), RemoteError>;

    /// Delete the row with `id` if it exists.
    async fn delete(&self, table: EntityKind, owner: &Identity, id: &str)
        -> Result<(), RemoteError>;
}

/// Backend used when none is configured. Never has an identity, so the
/// coordinator stays offline and queues every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

#[async_trait]
impl RemoteBackend for LocalOnly {
    fn is_configured(&self) -> bool {
        false
    }

    async fn identity(&self) -> Option<Identity> {
        None
    }

    async fn select(&self, _: EntityKind, _: &Identity) -> Result<Vec<Row>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert(&self, _: EntityKind, _: &Identity, _: Row) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn upsert(&self, _: EntityKind, _: &Identity, _: Row) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete(&self, _: EntityKind, _: &Identity, _: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}

/// Stamp `row` with the owner column.
pub fn with_owner(mut row: Row, owner: &Identity) -> Result<Row, RemoteError> {
    let object = row
        .as_object_mut()
        .ok_or_else(|| RemoteError::InvalidRow("row is not an object".into()))?;
    object.insert(
        OWNER_COLUMN.to_string(),
        Value::String(owner.user_id.clone()),
    );
    Ok(row)
}

/// The `id` field of a row.
pub fn row_id(row: &Row) -> Result<&str, RemoteError> {
    row.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RemoteError::InvalidRow("row has no string id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owner_column_is_added() {
        let row = with_owner(json!({"id": "m1", "level": 3}), &Identity::new("u1")).unwrap();
        assert_eq!(row["user_id"], "u1");
        assert_eq!(row["level"], 3);
    }

    #[test]
    fn owner_column_is_overwritten() {
        let row = with_owner(json!({"id": "m1", "user_id": "intruder"}), &Identity::new("u1"))
            .unwrap();
        assert_eq!(row["user_id"], "u1");
    }

    #[test]
    fn non_object_rows_are_invalid() {
        assert!(matches!(
            with_owner(json!([1, 2]), &Identity::new("u1")),
            Err(RemoteError::InvalidRow(_))
        ));
    }

    #[test]
    fn row_id_requires_string() {
        assert_eq!(row_id(&json!({"id": "x"})).unwrap(), "x");
        assert!(row_id(&json!({"id": 5})).is_err());
        assert!(row_id(&json!({"id": ""})).is_err());
        assert!(row_id(&json!({})).is_err());
    }

    #[tokio::test]
    async fn local_only_is_never_configured() {
        let remote = LocalOnly;
        assert!(!remote.is_configured());
        assert!(remote.identity().await.is_none());
        assert!(matches!(
            remote.select(EntityKind::Mood, &Identity::new("u1")).await,
            Err(RemoteError::NotConfigured)
        ));
    }

    #[test]
    fn retryable_classification() {
        assert!(RemoteError::Timeout.is_retryable());
        assert!(RemoteError::Network("reset".into()).is_retryable());
        assert!(RemoteError::Rejected {
            status: 429,
            message: String::new()
        }
        .is_retryable());
        assert!(!RemoteError::Rejected {
            status: 409,
            message: String::new()
        }
        .is_retryable());
        assert!(!RemoteError::NoIdentity.is_retryable());
    }
}
