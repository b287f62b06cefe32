//! Authenticated envelopes for secret values.
//!
//! Uses AES-256-GCM under the user's master key. A sealed value is a single
//! self-contained string: `hush:v1:BASE64(nonce || ciphertext || tag)`, so the
//! server can store it verbatim and hand it back without any side channel.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use super::master_key::{MasterKey, KEY_LENGTH};

/// Nonce length in bytes (96 bits for AES-GCM)
const NONCE_LENGTH: usize = 12;

/// GCM authentication tag length in bytes
const TAG_LENGTH: usize = 16;

/// Prefix carrying the envelope format version
const ENVELOPE_PREFIX: &str = "hush:v1:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("encryption failed")]
    EncryptionFailed,

    /// Wrong key, corruption, tampering or a value that was never sealed.
    #[error("decryption failed: invalid key or corrupted envelope")]
    DecryptionFailed,
}

/// Check if a value has the envelope shape. Does not authenticate it.
pub fn is_envelope(value: &str) -> bool {
    match value.strip_prefix(ENVELOPE_PREFIX) {
        Some(payload) => BASE64
            .decode(payload)
            .map(|raw| raw.len() >= NONCE_LENGTH + TAG_LENGTH)
            .unwrap_or(false),
        None => false,
    }
}

/// Seal a plaintext value under the master key.
///
/// Every call draws a fresh nonce from the OS CSPRNG; there is deliberately no
/// way for a caller to supply one.
pub fn seal(key: &MasterKey, plaintext: &str) -> Result<String, EnvelopeError> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = cipher_for(key.as_bytes());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| EnvelopeError::EncryptionFailed)?;

    let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENVELOPE_PREFIX, BASE64.encode(&combined)))
}

/// Open an envelope produced by [`seal`].
///
/// Every failure collapses into [`EnvelopeError::DecryptionFailed`]; no
/// plaintext is returned unless the tag verified.
pub fn open(key: &MasterKey, envelope: &str) -> Result<String, EnvelopeError> {
    let payload = envelope
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or(EnvelopeError::DecryptionFailed)?;

    let combined = BASE64
        .decode(payload)
        .map_err(|_| EnvelopeError::DecryptionFailed)?;

    if combined.len() < NONCE_LENGTH + TAG_LENGTH {
        return Err(EnvelopeError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);

    let plaintext = cipher_for(key.as_bytes())
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EnvelopeError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| EnvelopeError::DecryptionFailed)
}

fn cipher_for(key: &[u8; KEY_LENGTH]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Extract the nonce of an envelope without authenticating it.
#[cfg(test)]
fn nonce_of(envelope: &str) -> Vec<u8> {
    let payload = envelope.strip_prefix(ENVELOPE_PREFIX).unwrap();
    BASE64.decode(payload).unwrap()[..NONCE_LENGTH].to_vec()
}
