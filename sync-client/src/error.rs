//! Error types for the Hearth vault.

use hearth_sync_types::TypesError;
use thiserror::Error;

use crate::keys::KeystoreError;
use crate::remote::RemoteError;
use crate::store::StorageError;

/// Errors surfaced by the vault, its store and its coordinator.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The key manager was used before `initialize()`.
    #[error("encryption key not initialized")]
    KeyNotInitialized,

    /// Keystore read/write failed.
    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    /// Sealing a record failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext could not be opened (wrong key, truncated or malformed bytes).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Envelope checksum does not match its data: tampering or corruption.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity {
        /// Checksum recorded in the envelope.
        expected: String,
        /// Checksum recomputed from the data.
        actual: String,
    },

    /// Envelope written by an unknown format version.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// Underlying key/value store failed.
    #[error("storage error: {0}")]
    StorageIo(#[from] StorageError),

    /// Value could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entity or change failed validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Transient transport failure talking to the remote backend.
    #[error("network error: {0}")]
    Network(String),

    /// The remote backend rejected the request.
    #[error("remote error: {0}")]
    Remote(String),

    /// No remote backend or no signed-in identity.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A sync run is already in flight.
    #[error("already syncing")]
    AlreadySyncing,
}

impl VaultError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::Network(_) | VaultError::AlreadySyncing)
    }

    /// Short, stable name of the error kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::KeyNotInitialized => "key_not_initialized",
            VaultError::Keystore(_) => "keystore",
            VaultError::Encryption(_) => "encryption",
            VaultError::Decryption(_) => "decryption",
            VaultError::Integrity { .. } => "integrity",
            VaultError::UnsupportedVersion(_) => "unsupported_version",
            VaultError::StorageIo(_) => "storage_io",
            VaultError::Serialization(_) => "serialization",
            VaultError::InvalidPayload(_) => "invalid_payload",
            VaultError::Network(_) => "network",
            VaultError::Remote(_) => "remote",
            VaultError::BackendUnavailable(_) => "backend_unavailable",
            VaultError::AlreadySyncing => "already_syncing",
        }
    }
}

impl From<TypesError> for VaultError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::ChecksumMismatch { expected, actual } => {
                VaultError::Integrity { expected, actual }
            }
            TypesError::UnsupportedVersion(v) => VaultError::UnsupportedVersion(v),
            TypesError::InvalidPayload(msg) => VaultError::InvalidPayload(msg),
            err @ (TypesError::UnknownCategory(_) | TypesError::UnknownKind(_)) => {
                VaultError::InvalidPayload(err.to_string())
            }
            err @ (TypesError::Serialization(_)
            | TypesError::Deserialization(_)
            | TypesError::Value(_)) => VaultError::Serialization(err.to_string()),
        }
    }
}

impl From<RemoteError> for VaultError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotConfigured | RemoteError::NoIdentity => {
                VaultError::BackendUnavailable(err.to_string())
            }
            RemoteError::Network(_) | RemoteError::Timeout => VaultError::Network(err.to_string()),
            RemoteError::Rejected { .. } if err.is_retryable() => {
                VaultError::Network(err.to_string())
            }
            RemoteError::Rejected { .. } => VaultError::Remote(err.to_string()),
            RemoteError::InvalidRow(msg) => VaultError::Serialization(msg),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_maps_to_integrity() {
        let err: VaultError = TypesError::ChecksumMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .into();
        assert!(matches!(err, VaultError::Integrity { .. }));
        assert_eq!(err.kind(), "integrity");
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_errors_are_retryable() {
        let err: VaultError = RemoteError::Timeout.into();
        assert!(err.is_retryable());

        let err: VaultError = RemoteError::Rejected {
            status: 503,
            message: "maintenance".into(),
        }
        .into();
        assert!(matches!(err, VaultError::Network(_)));
    }

    #[test]
    fn client_rejections_are_not_retryable() {
        let err: VaultError = RemoteError::Rejected {
            status: 400,
            message: "bad column".into(),
        }
        .into();
        assert!(matches!(err, VaultError::Remote(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_identity_is_unavailable() {
        let err: VaultError = RemoteError::NoIdentity.into();
        assert!(matches!(err, VaultError::BackendUnavailable(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VaultError>();
    }
}
