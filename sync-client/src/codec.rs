//! Record encoding for the Hearth vault.
//!
//! A value is sealed into an [`Envelope`] (canonical JSON data, timestamp,
//! SHA-256 checksum, version), serialized with MessagePack and encrypted
//! with XChaCha20-Poly1305:
//!
//! ```text
//! stored bytes = nonce (24) || ciphertext+tag
//! ```
//!
//! Failure classes stay distinct: bytes that cannot be opened (wrong key,
//! truncation, a record moved under another key, garbage) are
//! [`VaultError::Decryption`]; an opened envelope whose checksum disagrees
//! with its data is [`VaultError::Integrity`]. Neither returns a partial value.

use std::sync::Arc;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hearth_sync_types::Envelope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::keys::KeyManager;

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Encrypts and decrypts records with the installation key.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    keys: Arc<KeyManager>,
}

impl RecordCodec {
    /// Create a codec using the key held by `keys`.
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Encode `value` into encrypted envelope bytes.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, VaultError> {
        self.encode_bound(value, &[])
    }

    /// Decode bytes produced by [`RecordCodec::encode`].
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, VaultError> {
        self.decode_bound(bytes, &[])
    }

    /// Encode `value`, binding `associated_data` into the authentication tag.
    ///
    /// The same associated data must be supplied to decode.
    pub fn encode_bound<T: Serialize + ?Sized>(
        &self,
        value: &T,
        associated_data: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        let key = self.keys.key()?;

        let envelope = Envelope::seal(value)?;
        let plaintext = Zeroizing::new(envelope.to_bytes()?);

        // Fresh random 192-bit nonce per call
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| VaultError::Encryption(format!("nonce generation failed: {e}")))?;

        let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: associated_data,
                },
            )
            .map_err(|_| VaultError::Encryption("aead encrypt failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decode bytes produced by [`RecordCodec::encode_bound`].
    pub fn decode_bound<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        associated_data: &[u8],
    ) -> Result<T, VaultError> {
        let envelope = self.open_envelope(bytes, associated_data)?;
        envelope.verify()?;
        serde_json::from_value(envelope.data).map_err(VaultError::from)
    }

    /// Decrypt and parse the envelope without checking its checksum.
    fn open_envelope(&self, bytes: &[u8], associated_data: &[u8]) -> Result<Envelope, VaultError> {
        let key = self.keys.key()?;

        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::Decryption(format!(
                "ciphertext too short: {} bytes",
                bytes.len()
            )));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);

        let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| VaultError::Decryption(e.to_string()))?;

        let plaintext = cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Decryption("authentication failed".into()))?;

        Envelope::from_bytes(&plaintext)
            .map_err(|e| VaultError::Decryption(format!("malformed envelope: {e}")))
    }
}
