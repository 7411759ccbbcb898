//! Cryptographic primitives for Partage: per-device identity, symmetric
//! AEAD for entries and snapshots, and signed per-recipient key packages
//! for distributing group-key history.

pub mod aead;
pub mod identity;
pub mod key_package;

pub use aead::{aead_decrypt, aead_encrypt, generate_group_key, AeadKey};
pub use identity::{generate_identity, identity_from_secrets, verify_signature, EcdhPublicKey, EcdhSecretKey, Identity, PublicIdentity};
pub use key_package::{key_package, open_key_package, KeyPackage};
