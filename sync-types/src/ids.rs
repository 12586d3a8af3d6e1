//! Identifier and clock helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a pending change.
///
/// UUID v4 format (16 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeId(uuid::Uuid);

impl ChangeId {
    /// Create a new random ChangeId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a ChangeId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeId({})", self.0)
    }
}

/// Generate a fresh entity id (hyphenated UUID v4).
pub fn new_entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current Unix time in milliseconds.
///
/// Clocks set before 1970 read as 0.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
