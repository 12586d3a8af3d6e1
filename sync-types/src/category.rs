//! Storage categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// The closed set of storage domains a record can live in.
///
/// `Sync` is reserved for the coordinator's own bookkeeping (the pending
/// change queue) and is never exposed as an entity collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Mood check-ins
    Mood,
    /// Journal entries
    Journal,
    /// Habits and their completions
    Habit,
    /// Reminder schedules
    Reminder,
    /// Application settings
    Settings,
    /// Sync bookkeeping (reserved)
    Sync,
}

impl Category {
    /// Every category, in a stable order.
    pub const ALL: [Category; 6] = [
        Category::Mood,
        Category::Journal,
        Category::Habit,
        Category::Reminder,
        Category::Settings,
        Category::Sync,
    ];

    /// The category name used in composite storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mood => "mood",
            Category::Journal => "journal",
            Category::Habit => "habit",
            Category::Reminder => "reminder",
            Category::Settings => "settings",
            Category::Sync => "sync",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TypesError::UnknownCategory(s.to_string()))
    }
}
