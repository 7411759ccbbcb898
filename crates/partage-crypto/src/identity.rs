//! Per-device identity: one X25519 keypair for ECDH and one Ed25519 keypair
//! for signing. The member ID used throughout the rest of the system is a
//! short stable hash of the ECDH public key, not the raw key itself.

use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::clamp_integer;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use partage_core::Result;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A 32-byte X25519 public key, stored and shipped around as plain bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdhPublicKey(pub [u8; 32]);

/// A 32-byte X25519 private scalar. Zeroized on drop; never serialized.
#[derive(Clone)]
pub struct EcdhSecretKey([u8; 32]);

impl Drop for EcdhSecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl EcdhSecretKey {
    /// Generate a fresh secret scalar from OS randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Restore a secret scalar from raw bytes, e.g. when loading an
    /// identity back out of local storage.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw scalar bytes, for persisting an identity to local storage. Never
    /// sent over the wire.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Derive the matching public key (clamped X25519 base-point multiply).
    pub fn public_key(&self) -> EcdhPublicKey {
        EcdhPublicKey(MontgomeryPoint::mul_base_clamped(self.0).to_bytes())
    }

    /// Diffie-Hellman with a peer's public key: `clamp(self) * peer`.
    pub fn diffie_hellman(&self, peer: &EcdhPublicKey) -> [u8; 32] {
        MontgomeryPoint(peer.0).mul_clamped(self.0).to_bytes()
    }

    /// Clamp and expose the raw scalar bytes (used only by tests/vectors).
    #[cfg(test)]
    fn clamped(&self) -> [u8; 32] {
        clamp_integer(self.0)
    }
}

/// Full device identity: ECDH keypair, signing keypair, and the derived
/// `publicKeyHash` member ID.
#[derive(Clone)]
pub struct Identity {
    pub ecdh_secret: EcdhSecretKey,
    pub ecdh_public: EcdhPublicKey,
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
    pub public_key_hash: String,
}

/// The subset of an identity that is safe to persist and share: no private
/// key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub ecdh_public: EcdhPublicKey,
    pub verifying_key: [u8; 32],
    pub public_key_hash: String,
}

impl Identity {
    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            ecdh_public: self.ecdh_public,
            verifying_key: self.verifying_key.to_bytes(),
            public_key_hash: self.public_key_hash.clone(),
        }
    }

    /// Sign an arbitrary message with the device's Ed25519 signing key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Generate a fresh device/user identity: ECDH keypair + signing keypair,
/// and the stable `publicKeyHash` member ID derived from the ECDH public key.
pub fn generate_identity() -> Identity {
    let ecdh_secret = EcdhSecretKey::generate();
    let ecdh_public = ecdh_secret.public_key();

    let mut signing_seed = [0u8; 32];
    OsRng.fill_bytes(&mut signing_seed);
    let signing_key = SigningKey::from_bytes(&signing_seed);
    signing_seed.zeroize();
    let verifying_key = signing_key.verifying_key();

    let public_key_hash = partage_core::short_hash_hex(&ecdh_public.0);

    Identity {
        ecdh_secret,
        ecdh_public,
        signing_key,
        verifying_key,
        public_key_hash,
    }
}

/// Reconstruct an identity from its two raw secrets, as stored locally by a
/// persistence layer. The inverse of generating fresh ones in
/// [`generate_identity`].
pub fn identity_from_secrets(ecdh_secret_bytes: [u8; 32], signing_seed: [u8; 32]) -> Identity {
    let ecdh_secret = EcdhSecretKey::from_bytes(ecdh_secret_bytes);
    let ecdh_public = ecdh_secret.public_key();
    let signing_key = SigningKey::from_bytes(&signing_seed);
    let verifying_key = signing_key.verifying_key();
    let public_key_hash = partage_core::short_hash_hex(&ecdh_public.0);

    Identity { ecdh_secret, ecdh_public, signing_key, verifying_key, public_key_hash }
}

/// Verify an Ed25519 signature against a message with the given public key.
pub fn verify_signature(verifying_key: &VerifyingKey, message: &[u8], signature: &[u8; 64]) -> Result<()> {
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    verifying_key
        .verify(message, &sig)
        .map_err(|e| partage_core::PartageError::signature_invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdh_agrees_on_shared_secret() {
        let alice = EcdhSecretKey::generate();
        let bob = EcdhSecretKey::generate();

        let alice_pub = alice.public_key();
        let bob_pub = bob.public_key();

        let shared_a = alice.diffie_hellman(&bob_pub);
        let shared_b = bob.diffie_hellman(&alice_pub);

        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn public_key_hash_is_stable() {
        let identity = generate_identity();
        let expected = partage_core::short_hash_hex(&identity.ecdh_public.0);
        assert_eq!(identity.public_key_hash, expected);
    }

    #[test]
    fn sign_and_verify_round_trips() {
        let identity = generate_identity();
        let message = b"partage entry payload";
        let sig = identity.sign(message);
        verify_signature(&identity.verifying_key, message, &sig).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let identity = generate_identity();
        let sig = identity.sign(b"original");
        let result = verify_signature(&identity.verifying_key, b"tampered", &sig);
        assert!(result.is_err());
    }

    #[test]
    fn secret_key_clamping_sets_x25519_bits() {
        let secret = EcdhSecretKey::generate();
        let clamped = secret.clamped();
        assert_eq!(clamped[0] & 0b0000_0111, 0);
        assert_eq!(clamped[31] & 0b1000_0000, 0);
        assert_eq!(clamped[31] & 0b0100_0000, 0b0100_0000);
    }
}
