//! Pending changes: validated local mutations the remote has not confirmed yet.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityKind, EntityRecord};
use crate::ids::{now_millis, ChangeId};
use crate::TypesError;

/// The kind of mutation a change represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    /// A new row
    Insert,
    /// A replacement for an existing row
    Update,
    /// Row removal by id
    Delete,
}

/// What a change carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChangePayload {
    /// The full entity (insert/update).
    Record {
        /// The entity being written
        record: EntityRecord,
    },
    /// Only the id of the entity (delete).
    Key {
        /// Id of the entity being removed
        id: String,
    },
}

/// A local mutation that has not yet been confirmed by the remote backend.
///
/// Only constructed through [`PendingChange::insert`], [`PendingChange::update`],
/// [`PendingChange::delete`] or [`PendingChange::new`], all of which validate
/// the operation/payload pairing and the entity schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Unique id, used to remove the change once delivered.
    pub id: ChangeId,
    /// Remote table this change targets.
    pub table: EntityKind,
    /// Mutation kind.
    pub operation: ChangeOperation,
    /// Entity or key.
    pub payload: ChangePayload,
    /// When the change was created (Unix millis).
    pub enqueued_at: i64,
}

impl PendingChange {
    /// Build a change, checking that the payload fits the operation.
    pub fn new(
        table: EntityKind,
        operation: ChangeOperation,
        payload: ChangePayload,
    ) -> Result<Self, TypesError> {
        let change = Self {
            id: ChangeId::new(),
            table,
            operation,
            payload,
            enqueued_at: now_millis(),
        };
        change.validate()?;
        Ok(change)
    }

    /// A change inserting `record`.
    pub fn insert(record: EntityRecord) -> Result<Self, TypesError> {
        Self::new(
            record.kind(),
            ChangeOperation::Insert,
            ChangePayload::Record { record },
        )
    }

    /// A change replacing the row with `record`'s id.
    pub fn update(record: EntityRecord) -> Result<Self, TypesError> {
        Self::new(
            record.kind(),
            ChangeOperation::Update,
            ChangePayload::Record { record },
        )
    }

    /// A change deleting the row `id` from `table`.
    pub fn delete(table: EntityKind, id: &str) -> Result<Self, TypesError> {
        Self::new(
            table,
            ChangeOperation::Delete,
            ChangePayload::Key { id: id.to_string() },
        )
    }

    /// Check operation/payload pairing and the carried entity.
    ///
    /// Also used on changes read back from storage.
    pub fn validate(&self) -> Result<(), TypesError> {
        match (&self.operation, &self.payload) {
            (ChangeOperation::Insert | ChangeOperation::Update, ChangePayload::Record { record }) => {
                if record.kind() != self.table {
                    return Err(TypesError::invalid(format!(
                        "{} record queued for table {}",
                        record.kind(),
                        self.table.table()
                    )));
                }
                record.validate()
            }
            (ChangeOperation::Delete, ChangePayload::Key { id }) => {
                if id.trim().is_empty() {
                    return Err(TypesError::invalid("delete without an id"));
                }
                Ok(())
            }
            (op, _) => Err(TypesError::invalid(format!(
                "payload does not match operation {op:?}"
            ))),
        }
    }

    /// Id of the entity this change targets.
    pub fn entity_id(&self) -> &str {
        match &self.payload {
            ChangePayload::Record { record } => record.id(),
            ChangePayload::Key { id } => id,
        }
    }

    /// Whether this change deletes `id` from `table`.
    pub fn is_delete_of(&self, table: EntityKind, id: &str) -> bool {
        self.operation == ChangeOperation::Delete && self.table == table && self.entity_id() == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, Habit, HabitFrequency, Mood};

    fn mood(id: &str) -> Mood {
        Mood {
            id: id.to_string(),
            level: 3,
            note: None,
            activities: vec![],
            timestamp: 100,
        }
    }

    // ===========================================
    // Construction Tests
    // ===========================================

    #[test]
    fn insert_takes_table_from_record() {
        let change = PendingChange::insert(mood("m1").into_record()).unwrap();
        assert_eq!(change.table, EntityKind::Mood);
        assert_eq!(change.operation, ChangeOperation::Insert);
        assert_eq!(change.entity_id(), "m1");
        assert!(change.enqueued_at > 0);
    }

    #[test]
    fn delete_carries_key_only() {
        let change = PendingChange::delete(EntityKind::Habit, "h1").unwrap();
        assert_eq!(change.payload, ChangePayload::Key { id: "h1".into() });
        assert!(change.is_delete_of(EntityKind::Habit, "h1"));
        assert!(!change.is_delete_of(EntityKind::Mood, "h1"));
    }

    #[test]
    fn each_change_gets_its_own_id() {
        let a = PendingChange::delete(EntityKind::Mood, "x").unwrap();
        let b = PendingChange::delete(EntityKind::Mood, "x").unwrap();
        assert_ne!(a.id, b.id);
    }

    // ===========================================
    // Validation Tests
    // ===========================================

    #[test]
    fn delete_with_record_payload_is_rejected() {
        let result = PendingChange::new(
            EntityKind::Mood,
            ChangeOperation::Delete,
            ChangePayload::Record {
                record: mood("m1").into_record(),
            },
        );
        assert!(matches!(result, Err(TypesError::InvalidPayload(_))));
    }

    #[test]
    fn insert_with_key_payload_is_rejected() {
        let result = PendingChange::new(
            EntityKind::Mood,
            ChangeOperation::Insert,
            ChangePayload::Key { id: "m1".into() },
        );
        assert!(result.is_err());
    }

    #[test]
    fn table_mismatch_is_rejected() {
        let habit = Habit::new("walk", HabitFrequency::Daily).into_record();
        let result = PendingChange::new(
            EntityKind::Mood,
            ChangeOperation::Update,
            ChangePayload::Record { record: habit },
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_entity_is_rejected() {
        let mut bad = mood("m1");
        bad.level = 9;
        assert!(PendingChange::insert(bad.into_record()).is_err());
        assert!(PendingChange::delete(EntityKind::Mood, "").is_err());
    }

    // ===========================================
    // Serialization Tests
    // ===========================================

    #[test]
    fn json_form_is_stable() {
        let change = PendingChange::update(mood("m1").into_record()).unwrap();
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["table"], "mood");
        assert_eq!(json["operation"], "update");
        assert_eq!(json["payload"]["type"], "record");

        let back: PendingChange = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
    }
}
