//! Error types for Hearth Sync records.

use thiserror::Error;

/// Errors that can occur while building, validating or (de)serializing records.
#[derive(Debug, Error)]
pub enum TypesError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Conversion between a value and its canonical JSON form failed
    #[error("value conversion failed: {0}")]
    Value(#[from] serde_json::Error),

    /// Envelope written by a newer, unknown format version
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// Envelope checksum does not match its data
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum recorded in the envelope
        expected: String,
        /// Checksum recomputed from the data
        actual: String,
    },

    /// Unknown storage category name
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Unknown entity kind or table name
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    /// Entity or change failed schema validation
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl TypesError {
    /// Shorthand for an [`TypesError::InvalidPayload`] with a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}
