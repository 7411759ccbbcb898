//! Key packages: the signed, per-recipient-encrypted blobs used to hand the
//! full group-key history to a joining or existing member.
//!
//! Wrapping is ECDH(sender, recipient) -> HKDF-SHA256 -> AES-256-GCM, with
//! the ciphertext signed by the sender's Ed25519 signing key so the
//! recipient can authenticate *who* rotated the key, not just that they hold
//! the shared secret.

use crate::aead::{aead_decrypt, aead_encrypt, AeadKey};
use crate::identity::{verify_signature, EcdhPublicKey, EcdhSecretKey};
use hkdf::Hkdf;
use partage_core::{PartageError, Result};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const KEY_PACKAGE_INFO: &[u8] = b"partage.key_package.v1";

/// A signed, encrypted blob addressed to one recipient's ECDH public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPackage {
    /// `publicKeyHash` of the intended recipient, for relay-side routing.
    pub recipient_hash: String,
    /// Sender's ECDH public key, needed by the recipient to redo the ECDH.
    pub sender_ecdh_public: EcdhPublicKey,
    /// `nonce || AES-256-GCM(payload)`.
    pub ciphertext: Vec<u8>,
    /// Ed25519 signature over `ciphertext`, by the sender's signing key.
    pub signature: [u8; 64],
    /// Sender's Ed25519 verifying key, so the recipient can check the
    /// signature without a separate directory lookup.
    pub sender_verifying_key: [u8; 32],
}

fn wrapping_key(shared_secret: &[u8; 32]) -> Result<AeadKey> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = [0u8; 32];
    hkdf.expand(KEY_PACKAGE_INFO, &mut okm)
        .map_err(|e| PartageError::crypto(format!("HKDF expansion failed: {}", e)))?;
    Ok(AeadKey::from_bytes(okm))
}

/// Build a key package: encrypt `payload` for `recipient_ecdh_pub` and sign
/// the ciphertext with the sender's signing key.
pub fn key_package(
    payload: &[u8],
    recipient_hash: &str,
    recipient_ecdh_pub: &EcdhPublicKey,
    sender_ecdh_priv: &EcdhSecretKey,
    sender_signing_key: &ed25519_dalek::SigningKey,
) -> Result<KeyPackage> {
    let shared_secret = sender_ecdh_priv.diffie_hellman(recipient_ecdh_pub);
    let wrap_key = wrapping_key(&shared_secret)?;
    let ciphertext = aead_encrypt(&wrap_key, payload, recipient_hash.as_bytes())?;

    let sender_ecdh_public = sender_ecdh_priv.public_key();
    let signature = sender_signing_key.sign_raw(&ciphertext);

    Ok(KeyPackage {
        recipient_hash: recipient_hash.to_string(),
        sender_ecdh_public,
        ciphertext,
        signature,
        sender_verifying_key: sender_signing_key.verifying_key().to_bytes(),
    })
}

/// Open a key package addressed to this recipient: verify the sender's
/// signature, then decrypt the payload. Signature failure is fatal for the
/// incoming package — the caller must not fall back to trusting it anyway.
pub fn open_key_package(package: &KeyPackage, recipient_ecdh_priv: &EcdhSecretKey) -> Result<Vec<u8>> {
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&package.sender_verifying_key)
        .map_err(|e| PartageError::signature_invalid(format!("malformed sender key: {}", e)))?;

    verify_signature(&verifying_key, &package.ciphertext, &package.signature)?;

    let shared_secret = recipient_ecdh_priv.diffie_hellman(&package.sender_ecdh_public);
    let wrap_key = wrapping_key(&shared_secret)?;

    aead_decrypt(&wrap_key, &package.ciphertext, package.recipient_hash.as_bytes())
}

trait SignRaw {
    fn sign_raw(&self, message: &[u8]) -> [u8; 64];
}

impl SignRaw for ed25519_dalek::SigningKey {
    fn sign_raw(&self, message: &[u8]) -> [u8; 64] {
        use ed25519_dalek::Signer;
        self.sign(message).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generate_identity;

    #[test]
    fn round_trips_for_intended_recipient() {
        let sender = generate_identity();
        let recipient = generate_identity();
        let payload = b"group key history payload".to_vec();

        let package = key_package(
            &payload,
            &recipient.public_key_hash,
            &recipient.ecdh_public,
            &sender.ecdh_secret,
            &sender.signing_key,
        )
        .unwrap();

        let opened = open_key_package(&package, &recipient.ecdh_secret).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let sender = generate_identity();
        let recipient = generate_identity();

        let mut package = key_package(
            b"payload",
            &recipient.public_key_hash,
            &recipient.ecdh_public,
            &sender.ecdh_secret,
            &sender.signing_key,
        )
        .unwrap();

        // Flip a byte after signing: signature verification must now fail.
        let last = package.ciphertext.len() - 1;
        package.ciphertext[last] ^= 0xFF;

        let result = open_key_package(&package, &recipient.ecdh_secret);
        assert!(matches!(result, Err(PartageError::SignatureInvalid { .. })));
    }

    #[test]
    fn wrong_recipient_cannot_open() {
        let sender = generate_identity();
        let recipient = generate_identity();
        let impostor = generate_identity();

        let package = key_package(
            b"payload",
            &recipient.public_key_hash,
            &recipient.ecdh_public,
            &sender.ecdh_secret,
            &sender.signing_key,
        )
        .unwrap();

        let result = open_key_package(&package, &impostor.ecdh_secret);
        assert!(result.is_err());
    }
}
