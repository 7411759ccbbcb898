//! Foundation types shared across every Partage crate: the unified error
//! type, identifier newtypes, version vectors, time, and cent-precision
//! money helpers.
//!
//! Nothing in this crate knows about encryption, CRDT documents, or the
//! relay — it exists so those crates (and the app shells around them) share
//! one vocabulary instead of redefining `GroupId` five times.

pub mod error;
pub mod ids;
pub mod money;
pub mod time;
pub mod version_vector;

pub use error::{PartageError, Result};
pub use ids::{EntryId, GroupId, InvitationId, MemberEventId, MemberId, ReplicaId};
pub use version_vector::VersionVector;

/// Stable short hash used for `publicKeyHash` / member IDs: first 16 bytes
/// of BLAKE3, hex-encoded. Collisions are not a security boundary here (the
/// full public key is still carried on `member_created`); this is a routing
/// key, not a commitment.
pub fn short_hash_hex(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    hex::encode(&hash.as_bytes()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_deterministic_and_16_bytes_hex() {
        let a = short_hash_hex(b"member-public-key");
        let b = short_hash_hex(b"member-public-key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32); // 16 bytes, hex-encoded
    }

    #[test]
    fn short_hash_differs_for_different_input() {
        assert_ne!(short_hash_hex(b"a"), short_hash_hex(b"b"));
    }
}
