//! Mock remote backend for testing.
//!
//! Keeps tables in memory, records every call, and allows injecting
//! failures and holding calls at a gate for concurrency tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hearth_sync_types::EntityKind;
use tokio::sync::watch;

use super::{row_id, with_owner, Identity, RemoteBackend, RemoteError, Row};

/// A call made against [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `select(table)`
    Select(EntityKind),
    /// `insert(table, id)`
    Insert(EntityKind, String),
    /// `upsert(table, id)`
    Upsert(EntityKind, String),
    /// `delete(table, id)`
    Delete(EntityKind, String),
}

/// Mock remote backend. Clones share the same state.
#[derive(Debug, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
    gate: Arc<watch::Sender<bool>>,
}

#[derive(Debug)]
struct MockRemoteInner {
    configured: bool,
    identity: Option<Identity>,
    // (table, owner) -> id -> row
    tables: HashMap<(EntityKind, String), BTreeMap<String, Row>>,
    calls: Vec<RemoteCall>,
    fail_next_select: Option<String>,
    fail_next_write: Option<String>,
    failing_ids: HashSet<String>,
    failing_tables: HashSet<EntityKind>,
    unreachable: bool,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// Create a configured mock, signed in as `test-user`.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Mutex::new(MockRemoteInner {
                configured: true,
                identity: Some(Identity::new("test-user")),
                tables: HashMap::new(),
                calls: Vec::new(),
                fail_next_select: None,
                fail_next_write: None,
                failing_ids: HashSet::new(),
                failing_tables: HashSet::new(),
                unreachable: false,
            })),
            gate: Arc::new(gate),
        }
    }

    /// Create a mock that reports no configured backend.
    pub fn unconfigured() -> Self {
        let remote = Self::new();
        remote.lock().configured = false;
        remote
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the signed-in identity (`None` signs out).
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.lock().identity = identity;
    }

    /// Make every call fail with a network error until cleared.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Cause the next select() to fail with the given error.
    pub fn fail_next_select(&self, error: &str) {
        self.lock().fail_next_select = Some(error.to_string());
    }

    /// Cause the next insert/upsert/delete to fail with the given error.
    pub fn fail_next_write(&self, error: &str) {
        self.lock().fail_next_write = Some(error.to_string());
    }

    /// Make every write touching entity `id` fail until cleared.
    pub fn fail_writes_for(&self, id: &str) {
        self.lock().failing_ids.insert(id.to_string());
    }

    /// Make every select() of `table` fail until cleared.
    pub fn fail_selects_for(&self, table: EntityKind) {
        self.lock().failing_tables.insert(table);
    }

    /// Clear every injected failure.
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.fail_next_select = None;
        inner.fail_next_write = None;
        inner.failing_ids.clear();
        inner.failing_tables.clear();
        inner.unreachable = false;
    }

    /// Hold every call at the gate until [`MockRemote::open_gate`].
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    /// Release held calls.
    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Store a row directly, as if another device had written it.
    pub fn seed(&self, table: EntityKind, owner: &Identity, row: Row) {
        let Ok(row) = with_owner(row, owner) else {
            return;
        };
        let Ok(id) = row_id(&row).map(str::to_string) else {
            return;
        };
        self.lock()
            .tables
            .entry((table, owner.user_id.clone()))
            .or_default()
            .insert(id, row);
    }

    /// Rows of `table` owned by `owner`, in id order.
    pub fn rows(&self, table: EntityKind, owner: &Identity) -> Vec<Row> {
        self.lock()
            .tables
            .get(&(table, owner.user_id.clone()))
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    async fn pass_gate(&self) {
        let mut open = self.gate.subscribe();
        // The sender lives as long as self, so this cannot fail
        let _ = open.wait_for(|open| *open).await;
    }

    fn check_write(inner: &mut MockRemoteInner, id: &str) -> Result<(), RemoteError> {
        if inner.unreachable {
            return Err(RemoteError::Network("unreachable".into()));
        }
        if let Some(error) = inner.fail_next_write.take() {
            return Err(RemoteError::Network(error));
        }
        if inner.failing_ids.contains(id) {
            return Err(RemoteError::Network(format!("write to {id} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MockRemote {
    fn is_configured(&self) -> bool {
        self.lock().configured
    }

    async fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    async fn select(&self, table: EntityKind, owner: &Identity) -> Result<Vec<Row>, RemoteError> {
        self.pass_gate().await;
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Select(table));

        if inner.unreachable {
            return Err(RemoteError::Network("unreachable".into()));
        }
        if let Some(error) = inner.fail_next_select.take() {
            return Err(RemoteError::Network(error));
        }
        if inner.failing_tables.contains(&table) {
            return Err(RemoteError::Rejected {
                status: 503,
                message: format!("{} unavailable", table.table()),
            });
        }

        Ok(inner
            .tables
            .get(&(table, owner.user_id.clone()))
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        table: EntityKind,
        owner: &Identity,
        row: Row,
    ) -> Result<(), RemoteError> {
        self.pass_gate().await;
        let row = with_owner(row, owner)?;
        let id = row_id(&row)?.to_string();

        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Insert(table, id.clone()));
        Self::check_write(&mut inner, &id)?;

        let rows = inner
            .tables
            .entry((table, owner.user_id.clone()))
            .or_default();
        if rows.contains_key(&id) {
            return Err(RemoteError::Rejected {
                status: 409,
                message: format!("duplicate key {id}"),
            });
        }
        rows.insert(id, row);
        Ok(())
    }

    async fn upsert(
        &self,
        table: EntityKind,
        owner: &Identity,
        row: Row,
    ) -> Result<(), RemoteError> {
        self.pass_gate().await;
        let row = with_owner(row, owner)?;
        let id = row_id(&row)?.to_string();

        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Upsert(table, id.clone()));
        Self::check_write(&mut inner, &id)?;

        inner
            .tables
            .entry((table, owner.user_id.clone()))
            .or_default()
            .insert(id, row);
        Ok(())
    }

    async fn delete(&self, table: EntityKind, owner: &Identity, id: &str) -> Result<(), RemoteError> {
        self.pass_gate().await;
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Delete(table, id.to_string()));
        Self::check_write(&mut inner, id)?;

        if let Some(rows) = inner.tables.get_mut(&(table, owner.user_id.clone())) {
            rows.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn owner() -> Identity {
        Identity::new("test-user")
    }

    // ===========================================
    // MockRemote Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_remote_defaults() {
        let remote = MockRemote::new();
        assert!(remote.is_configured());
        assert_eq!(remote.identity().await, Some(owner()));

        let remote = MockRemote::unconfigured();
        assert!(!remote.is_configured());
    }

    #[tokio::test]
    async fn upsert_then_select() {
        let remote = MockRemote::new();
        remote
            .upsert(EntityKind::Mood, &owner(), json!({"id": "m1", "level": 2}))
            .await
            .unwrap();
        remote
            .upsert(EntityKind::Mood, &owner(), json!({"id": "m1", "level": 4}))
            .await
            .unwrap();

        let rows = remote.select(EntityKind::Mood, &owner()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["level"], 4);
        assert_eq!(rows[0]["user_id"], "test-user");
    }

    #[tokio::test]
    async fn rows_are_scoped_to_owner() {
        let remote = MockRemote::new();
        remote.seed(EntityKind::Habit, &Identity::new("someone-else"), json!({"id": "h1"}));

        let rows = remote.select(EntityKind::Habit, &owner()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let remote = MockRemote::new();
        remote
            .insert(EntityKind::Mood, &owner(), json!({"id": "m1"}))
            .await
            .unwrap();
        let result = remote
            .insert(EntityKind::Mood, &owner(), json!({"id": "m1"}))
            .await;
        assert!(matches!(
            result,
            Err(RemoteError::Rejected { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let remote = MockRemote::new();
        remote.seed(EntityKind::Mood, &owner(), json!({"id": "m1"}));

        remote.delete(EntityKind::Mood, &owner(), "m1").await.unwrap();
        remote.delete(EntityKind::Mood, &owner(), "m1").await.unwrap();
        assert!(remote.rows(EntityKind::Mood, &owner()).is_empty());
    }

    #[tokio::test]
    async fn calls_are_recorded() {
        let remote = MockRemote::new();
        remote.select(EntityKind::Reminder, &owner()).await.unwrap();
        remote
            .delete(EntityKind::Reminder, &owner(), "r1")
            .await
            .unwrap();

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Select(EntityKind::Reminder),
                RemoteCall::Delete(EntityKind::Reminder, "r1".into()),
            ]
        );
    }

    // ===========================================
    // Failure Injection Tests
    // ===========================================

    #[tokio::test]
    async fn fail_next_write_fires_once() {
        let remote = MockRemote::new();
        remote.fail_next_write("boom");

        let row = json!({"id": "m1"});
        assert!(remote
            .upsert(EntityKind::Mood, &owner(), row.clone())
            .await
            .is_err());
        assert!(remote.upsert(EntityKind::Mood, &owner(), row).await.is_ok());
    }

    #[tokio::test]
    async fn failing_ids_stick_until_cleared() {
        let remote = MockRemote::new();
        remote.fail_writes_for("bad");

        for _ in 0..2 {
            let result = remote
                .upsert(EntityKind::Mood, &owner(), json!({"id": "bad"}))
                .await;
            assert!(matches!(result, Err(RemoteError::Network(_))));
        }
        assert!(remote
            .upsert(EntityKind::Mood, &owner(), json!({"id": "good"}))
            .await
            .is_ok());

        remote.clear_failures();
        assert!(remote
            .upsert(EntityKind::Mood, &owner(), json!({"id": "bad"}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unreachable_fails_everything() {
        let remote = MockRemote::new();
        remote.set_unreachable(true);

        assert!(remote.select(EntityKind::Mood, &owner()).await.is_err());
        assert!(remote.delete(EntityKind::Mood, &owner(), "x").await.is_err());
    }

    #[tokio::test]
    async fn rows_without_id_are_invalid() {
        let remote = MockRemote::new();
        let result = remote
            .upsert(EntityKind::Mood, &owner(), json!({"level": 1}))
            .await;
        assert!(matches!(result, Err(RemoteError::InvalidRow(_))));
    }

    // ===========================================
    // Gate Tests
    // ===========================================

    #[tokio::test]
    async fn closed_gate_holds_calls() {
        let remote = MockRemote::new();
        remote.close_gate();

        let held = {
            let remote = remote.clone();
            tokio::spawn(async move { remote.select(EntityKind::Mood, &owner()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!held.is_finished());
        assert_eq!(remote.call_count(), 0);

        remote.open_gate();
        held.await.unwrap().unwrap();
        assert_eq!(remote.call_count(), 1);
    }
}
