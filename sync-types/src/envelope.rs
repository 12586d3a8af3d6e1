//! The versioned, checksummed wrapper stored in place of a raw value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::now_millis;
use crate::TypesError;

/// Current envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Canonical byte form of a value: compact JSON with object keys sorted.
///
/// Values go through [`serde_json::Value`] first, whose objects are ordered
/// maps, so two equal values always produce identical bytes regardless of
/// struct field order.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TypesError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Hex SHA-256 of some canonical bytes.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A value wrapped with its write time, checksum and format version.
///
/// After every decode, `checksum == sha256(canonical(data))`.
/// A mismatch is reported, never repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The wrapped value in canonical JSON form.
    pub data: serde_json::Value,
    /// When the envelope was sealed (Unix millis).
    pub timestamp: i64,
    /// Hex SHA-256 over the canonical bytes of `data`.
    pub checksum: String,
    /// Format version.
    pub version: u32,
}

impl Envelope {
    /// Wrap a value, stamping it with the current time.
    pub fn seal<T: Serialize + ?Sized>(value: &T) -> Result<Self, TypesError> {
        let data = serde_json::to_value(value)?;
        let checksum = checksum(&serde_json::to_vec(&data)?);
        Ok(Self {
            data,
            timestamp: now_millis(),
            checksum,
            version: ENVELOPE_VERSION,
        })
    }

    /// Check version and checksum.
    pub fn verify(&self) -> Result<(), TypesError> {
        if self.version != ENVELOPE_VERSION {
            return Err(TypesError::UnsupportedVersion(self.version));
        }
        let actual = checksum(&canonical_bytes(&self.data)?);
        if actual != self.checksum {
            return Err(TypesError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify, then unwrap into `T`.
    pub fn open<T: DeserializeOwned>(self) -> Result<T, TypesError> {
        self.verify()?;
        Ok(serde_json::from_value(self.data)?)
    }

    /// Serialize to MessagePack bytes (named fields).
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        rmp_serde::to_vec_named(self).map_err(TypesError::Serialization)
    }

    /// Deserialize from MessagePack bytes. Does not verify.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        rmp_serde::from_slice(bytes).map_err(TypesError::Deserialization)
    }
}
