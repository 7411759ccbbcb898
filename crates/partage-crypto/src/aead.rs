//! Symmetric AEAD used to encrypt entry payloads and key packages.
//!
//! Ciphertexts are self-contained: `[nonce (12 bytes) || aes-gcm ciphertext]`.
//! Nonces are drawn fresh from the OS RNG per call, which is safe for
//! AES-256-GCM at the volume a single group's ledger produces.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use partage_core::{PartageError, Result};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;

/// A symmetric AEAD key, one per group-key version.
#[derive(Clone, Serialize, Deserialize)]
pub struct AeadKey(pub [u8; 32]);

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl AeadKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Generate a fresh 256-bit group key.
pub fn generate_group_key() -> AeadKey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    AeadKey(bytes)
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
/// Returns `nonce || ciphertext`.
pub fn aead_encrypt(key: &AeadKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| PartageError::crypto(format!("AEAD encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`aead_encrypt`]. Fails with
/// `PartageError::DecryptionFailed` on tag mismatch (including a wrong key).
pub fn aead_decrypt(key: &AeadKey, blob: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(PartageError::decryption_failed("ciphertext shorter than nonce"));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| PartageError::decryption_failed("authentication tag mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_matching_aad() {
        let key = generate_group_key();
        let plaintext = b"expense payload".to_vec();
        let aad = b"entry-id-123";

        let ciphertext = aead_encrypt(&key, &plaintext, aad).unwrap();
        let decrypted = aead_decrypt(&key, &ciphertext, aad).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn fails_on_wrong_key() {
        let key_a = generate_group_key();
        let key_b = generate_group_key();

        let ciphertext = aead_encrypt(&key_a, b"secret", b"aad").unwrap();
        let result = aead_decrypt(&key_b, &ciphertext, b"aad");

        assert!(matches!(result, Err(PartageError::DecryptionFailed { .. })));
    }

    #[test]
    fn fails_on_mismatched_aad() {
        let key = generate_group_key();
        let ciphertext = aead_encrypt(&key, b"secret", b"correct-aad").unwrap();
        let result = aead_decrypt(&key, &ciphertext, b"wrong-aad");
        assert!(result.is_err());
    }

    #[test]
    fn nonces_are_not_reused_across_calls() {
        let key = generate_group_key();
        let a = aead_encrypt(&key, b"same", b"").unwrap();
        let b = aead_encrypt(&key, b"same", b"").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }
}
