//! Syncable entities.
//!
//! Every entity has a required `id`, unique within its collection, and an
//! ordering key used to sort merged collections newest-first. Entities are
//! never mutated in place by the data layer: a save replaces the stored
//! value for that id wholesale.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{new_entity_id, now_millis};
use crate::{Category, TypesError};

/// Maximum length of free-text fields, in bytes.
const MAX_TEXT_LEN: usize = 64 * 1024;

/// Entity kinds that take part in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// [`Mood`]
    Mood,
    /// [`JournalEntry`]
    Journal,
    /// [`Habit`]
    Habit,
    /// [`Reminder`]
    Reminder,
}

impl EntityKind {
    /// Every syncable kind, in sync order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Mood,
        EntityKind::Journal,
        EntityKind::Habit,
        EntityKind::Reminder,
    ];

    /// Remote table name for this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Mood => "moods",
            EntityKind::Journal => "journal_entries",
            EntityKind::Habit => "habits",
            EntityKind::Reminder => "reminders",
        }
    }

    /// Local storage category for this kind.
    pub fn category(&self) -> Category {
        match self {
            EntityKind::Mood => Category::Mood,
            EntityKind::Journal => Category::Journal,
            EntityKind::Habit => Category::Habit,
            EntityKind::Reminder => Category::Reminder,
        }
    }

    /// Look a kind up by its remote table name.
    pub fn from_table(table: &str) -> Option<Self> {
        EntityKind::ALL.iter().copied().find(|k| k.table() == table)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category().as_str())
    }
}

impl FromStr for EntityKind {
    type Err = TypesError;

    /// Accepts either the category name (`mood`) or the table name (`moods`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.category().as_str() == s || k.table() == s)
            .ok_or_else(|| TypesError::UnknownKind(s.to_string()))
    }
}

/// Common behaviour of syncable entities.
pub trait Entity: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// The kind tag for this entity type.
    const KIND: EntityKind;

    /// Identifier, unique within the collection.
    fn id(&self) -> &str;

    /// Ordering key; merged collections are sorted by this, descending.
    fn sort_key(&self) -> i64;

    /// Schema validation. Invalid entities are rejected before they are
    /// stored or queued.
    fn validate(&self) -> Result<(), TypesError>;

    /// Wrap into the tagged union.
    fn into_record(self) -> EntityRecord;

    /// Unwrap from the tagged union if the kind matches.
    fn from_record(record: EntityRecord) -> Option<Self>;
}

fn check_id(kind: EntityKind, id: &str) -> Result<(), TypesError> {
    if id.trim().is_empty() {
        return Err(TypesError::invalid(format!("{kind} id must not be empty")));
    }
    if id.len() > 128 {
        return Err(TypesError::invalid(format!("{kind} id too long")));
    }
    Ok(())
}

fn check_text(field: &str, text: &str) -> Result<(), TypesError> {
    if text.len() > MAX_TEXT_LEN {
        return Err(TypesError::invalid(format!(
            "{field} too long: {} bytes (max {MAX_TEXT_LEN})",
            text.len()
        )));
    }
    Ok(())
}

/// A mood check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mood {
    /// Identifier.
    pub id: String,
    /// Mood level, 1 (lowest) to 5 (highest).
    pub level: u8,
    /// Optional free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Activity tags attached to the check-in.
    #[serde(default)]
    pub activities: Vec<String>,
    /// When the mood was recorded (Unix millis).
    pub timestamp: i64,
}

impl Mood {
    /// Lowest valid level.
    pub const MIN_LEVEL: u8 = 1;
    /// Highest valid level.
    pub const MAX_LEVEL: u8 = 5;

    /// Create a mood recorded now, with a fresh id.
    pub fn new(level: u8) -> Self {
        Self {
            id: new_entity_id(),
            level,
            note: None,
            activities: Vec::new(),
            timestamp: now_millis(),
        }
    }

    /// Attach a note.
    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

impl Entity for Mood {
    const KIND: EntityKind = EntityKind::Mood;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> i64 {
        self.timestamp
    }

    fn validate(&self) -> Result<(), TypesError> {
        check_id(Self::KIND, &self.id)?;
        if !(Self::MIN_LEVEL..=Self::MAX_LEVEL).contains(&self.level) {
            return Err(TypesError::invalid(format!(
                "mood level {} out of range {}..={}",
                self.level,
                Self::MIN_LEVEL,
                Self::MAX_LEVEL
            )));
        }
        if let Some(note) = &self.note {
            check_text("mood note", note)?;
        }
        Ok(())
    }

    fn into_record(self) -> EntityRecord {
        EntityRecord::Mood(self)
    }

    fn from_record(record: EntityRecord) -> Option<Self> {
        match record {
            EntityRecord::Mood(m) => Some(m),
            _ => None,
        }
    }
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Identifier.
    pub id: String,
    /// Optional title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    pub content: String,
    /// Mood check-in this entry was written alongside, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_id: Option<String>,
    /// When the entry was written (Unix millis).
    pub timestamp: i64,
}

impl JournalEntry {
    /// Create an entry written now, with a fresh id.
    pub fn new(content: &str) -> Self {
        Self {
            id: new_entity_id(),
            title: None,
            content: content.to_string(),
            mood_id: None,
            timestamp: now_millis(),
        }
    }
}

impl Entity for JournalEntry {
    const KIND: EntityKind = EntityKind::Journal;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> i64 {
        self.timestamp
    }

    fn validate(&self) -> Result<(), TypesError> {
        check_id(Self::KIND, &self.id)?;
        if self.content.trim().is_empty() {
            return Err(TypesError::invalid("journal content must not be empty"));
        }
        check_text("journal content", &self.content)?;
        if let Some(title) = &self.title {
            check_text("journal title", title)?;
        }
        Ok(())
    }

    fn into_record(self) -> EntityRecord {
        EntityRecord::Journal(self)
    }

    fn from_record(record: EntityRecord) -> Option<Self> {
        match record {
            EntityRecord::Journal(j) => Some(j),
            _ => None,
        }
    }
}

/// How often a habit is meant to be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitFrequency {
    /// Once a day
    Daily,
    /// Once a week
    Weekly,
}

/// A tracked habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target frequency.
    pub frequency: HabitFrequency,
    /// Completion times (Unix millis).
    #[serde(default)]
    pub completions: Vec<i64>,
    /// When the habit was created (Unix millis).
    pub created_at: i64,
}

impl Habit {
    /// Create a habit now, with a fresh id.
    pub fn new(name: &str, frequency: HabitFrequency) -> Self {
        Self {
            id: new_entity_id(),
            name: name.to_string(),
            description: None,
            frequency,
            completions: Vec::new(),
            created_at: now_millis(),
        }
    }
}

impl Entity for Habit {
    const KIND: EntityKind = EntityKind::Habit;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> i64 {
        self.created_at
    }

    fn validate(&self) -> Result<(), TypesError> {
        check_id(Self::KIND, &self.id)?;
        if self.name.trim().is_empty() {
            return Err(TypesError::invalid("habit name must not be empty"));
        }
        check_text("habit name", &self.name)?;
        Ok(())
    }

    fn into_record(self) -> EntityRecord {
        EntityRecord::Habit(self)
    }

    fn from_record(record: EntityRecord) -> Option<Self> {
        match record {
            EntityRecord::Habit(h) => Some(h),
            _ => None,
        }
    }
}

/// A daily reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Identifier.
    pub id: String,
    /// Text shown when the reminder fires.
    pub title: String,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Whether the reminder is active.
    pub enabled: bool,
    /// When the reminder was created (Unix millis).
    pub created_at: i64,
}

impl Reminder {
    /// Create an enabled reminder now, with a fresh id.
    pub fn new(title: &str, hour: u8, minute: u8) -> Self {
        Self {
            id: new_entity_id(),
            title: title.to_string(),
            hour,
            minute,
            enabled: true,
            created_at: now_millis(),
        }
    }
}

impl Entity for Reminder {
    const KIND: EntityKind = EntityKind::Reminder;

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> i64 {
        self.created_at
    }

    fn validate(&self) -> Result<(), TypesError> {
        check_id(Self::KIND, &self.id)?;
        if self.hour > 23 || self.minute > 59 {
            return Err(TypesError::invalid(format!(
                "invalid reminder time {:02}:{:02}",
                self.hour, self.minute
            )));
        }
        check_text("reminder title", &self.title)?;
        Ok(())
    }

    fn into_record(self) -> EntityRecord {
        EntityRecord::Reminder(self)
    }

    fn from_record(record: EntityRecord) -> Option<Self> {
        match record {
            EntityRecord::Reminder(r) => Some(r),
            _ => None,
        }
    }
}

/// Tagged union over every syncable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
pub enum EntityRecord {
    /// A mood check-in
    Mood(Mood),
    /// A journal entry
    Journal(JournalEntry),
    /// A habit
    Habit(Habit),
    /// A reminder
    Reminder(Reminder),
}

impl EntityRecord {
    /// Kind tag of the wrapped entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Mood(_) => EntityKind::Mood,
            EntityRecord::Journal(_) => EntityKind::Journal,
            EntityRecord::Habit(_) => EntityKind::Habit,
            EntityRecord::Reminder(_) => EntityKind::Reminder,
        }
    }

    /// Id of the wrapped entity.
    pub fn id(&self) -> &str {
        match self {
            EntityRecord::Mood(e) => e.id(),
            EntityRecord::Journal(e) => e.id(),
            EntityRecord::Habit(e) => e.id(),
            EntityRecord::Reminder(e) => e.id(),
        }
    }

    /// Validate the wrapped entity.
    pub fn validate(&self) -> Result<(), TypesError> {
        match self {
            EntityRecord::Mood(e) => e.validate(),
            EntityRecord::Journal(e) => e.validate(),
            EntityRecord::Habit(e) => e.validate(),
            EntityRecord::Reminder(e) => e.validate(),
        }
    }

    /// Remote row form of the wrapped entity (a JSON object).
    pub fn to_row(&self) -> Result<serde_json::Value, TypesError> {
        let row = match self {
            EntityRecord::Mood(e) => serde_json::to_value(e)?,
            EntityRecord::Journal(e) => serde_json::to_value(e)?,
            EntityRecord::Habit(e) => serde_json::to_value(e)?,
            EntityRecord::Reminder(e) => serde_json::to_value(e)?,
        };
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mood(id: &str, level: u8) -> Mood {
        Mood {
            id: id.to_string(),
            level,
            note: None,
            activities: vec![],
            timestamp: 1_705_000_000_000,
        }
    }

    // ===========================================
    // EntityKind Tests
    // ===========================================

    #[test]
    fn kind_tables_and_categories() {
        assert_eq!(EntityKind::Mood.table(), "moods");
        assert_eq!(EntityKind::Journal.table(), "journal_entries");
        assert_eq!(EntityKind::Journal.category(), Category::Journal);
        assert_eq!(EntityKind::from_table("habits"), Some(EntityKind::Habit));
        assert_eq!(EntityKind::from_table("settings"), None);
    }

    #[test]
    fn kind_parses_category_or_table_name() {
        assert_eq!("mood".parse::<EntityKind>().unwrap(), EntityKind::Mood);
        assert_eq!("reminders".parse::<EntityKind>().unwrap(), EntityKind::Reminder);
        assert!(matches!(
            "settings".parse::<EntityKind>(),
            Err(TypesError::UnknownKind(_))
        ));
    }

    // ===========================================
    // Validation Tests
    // ===========================================

    #[test]
    fn mood_level_range_is_enforced() {
        assert!(mood("a", 1).validate().is_ok());
        assert!(mood("a", 5).validate().is_ok());
        assert!(mood("a", 0).validate().is_err());
        assert!(mood("a", 6).validate().is_err());
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(mood("", 3).validate().is_err());
        assert!(mood("   ", 3).validate().is_err());
    }

    #[test]
    fn journal_requires_content() {
        let mut entry = JournalEntry::new("today was fine");
        assert!(entry.validate().is_ok());
        entry.content = "  ".into();
        assert!(entry.validate().is_err());
    }

    #[test]
    fn reminder_time_is_checked() {
        assert!(Reminder::new("breathe", 23, 59).validate().is_ok());
        assert!(Reminder::new("breathe", 24, 0).validate().is_err());
        assert!(Reminder::new("breathe", 8, 60).validate().is_err());
    }

    #[test]
    fn oversized_note_is_rejected() {
        let m = mood("a", 3).with_note(&"x".repeat(MAX_TEXT_LEN + 1));
        assert!(m.validate().is_err());
    }

    // ===========================================
    // EntityRecord Tests
    // ===========================================

    #[test]
    fn record_wraps_and_unwraps() {
        let m = mood("m1", 4);
        let record = m.clone().into_record();
        assert_eq!(record.kind(), EntityKind::Mood);
        assert_eq!(record.id(), "m1");
        assert_eq!(Mood::from_record(record.clone()), Some(m));
        assert_eq!(Habit::from_record(record), None);
    }

    #[test]
    fn record_json_is_tagged() {
        let record = mood("m1", 2).into_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "mood");
        assert_eq!(json["record"]["level"], 2);

        let back: EntityRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn row_is_flat_object() {
        let row = mood("m1", 3).into_record().to_row().unwrap();
        assert_eq!(row["id"], "m1");
        assert_eq!(row["level"], 3);
        assert!(row.get("note").is_none());
    }

    #[test]
    fn rows_with_extra_columns_decode() {
        // Remote rows carry owner columns the entity doesn't know about
        let row = serde_json::json!({
            "id": "m9",
            "level": 2,
            "timestamp": 5,
            "user_id": "owner-1",
        });
        let m: Mood = serde_json::from_value(row).unwrap();
        assert_eq!(m.id, "m9");
        assert!(m.activities.is_empty());
    }
}
