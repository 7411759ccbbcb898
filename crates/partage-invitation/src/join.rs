//! The join flow: join requests, key rotation on join, and per-recipient
//! key package distribution (§4.10).

use partage_core::{GroupId, InvitationId, MemberId, PartageError, Result};
use partage_crdt::{CrdtDocument, CrdtPayload, MemberEventRow};
use partage_crypto::{generate_group_key, key_package, EcdhPublicKey, Identity, KeyPackage};
use partage_entries::KeyRing;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub invitation_id: InvitationId,
    pub group_id: GroupId,
    pub requester_public_key: EcdhPublicKey,
    pub requester_public_key_hash: String,
    pub requester_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupKeyEntry {
    pub version: u32,
    /// Raw 32-byte AEAD key. In transit this only ever travels inside an
    /// encrypted, signed [`KeyPackage`] — never written to the relay bare.
    pub key: [u8; 32],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupKeysPayload {
    pub group_id: GroupId,
    pub keys: Vec<GroupKeyEntry>,
    pub current_key_version: u32,
}

/// A real (non-virtual) member's routing info: where to address a key
/// package and which ECDH public key to encrypt it under.
pub struct KeyPackageRecipient {
    pub member_id: MemberId,
    pub ecdh_public: EcdhPublicKey,
}

/// Append the joiner's `member_created` event, rotate the group key, and
/// return a signed key package for every recipient (existing members plus
/// the joiner). The caller is responsible for persisting the returned
/// `KeyRing` and pushing `doc`'s delta to the relay.
pub fn approve_join(
    doc: &mut CrdtDocument,
    keyring: &mut KeyRing,
    group_id: &GroupId,
    approver: &Identity,
    joiner_member_id: MemberId,
    joiner_name: String,
    recipients: &[KeyPackageRecipient],
    now_ms: i64,
) -> Result<Vec<KeyPackage>> {
    doc.apply_local_op(CrdtPayload::MemberEventAppend(MemberEventRow {
        id: partage_core::MemberEventId::new(),
        member_id: joiner_member_id,
        actor_id: MemberId::from_public_key_hash(&approver.public_key_hash),
        timestamp: now_ms,
        kind: serde_json::json!({
            "type": "member_created",
            "name": joiner_name,
            "public_key": null,
            "is_virtual": false,
        }),
    }));

    let new_version = rotate_group_key(keyring);
    let payload = build_group_keys_payload(group_id, keyring)?;
    let payload_bytes = serde_json::to_vec(&payload).map_err(|e| PartageError::serialization(e.to_string()))?;

    recipients
        .iter()
        .map(|recipient| {
            key_package(&payload_bytes, recipient.member_id.as_str(), &recipient.ecdh_public, &approver.ecdh_secret, &approver.signing_key)
        })
        .collect::<Result<Vec<_>>>()
        .map(|packages| {
            tracing::info!(version = new_version, recipients = packages.len(), "rotated group key and issued key packages");
            packages
        })
}

/// Generate a fresh group key, bump `currentKeyVersion`, and retain every
/// previous version (the invariant from §3: history is never discarded).
pub fn rotate_group_key(keyring: &mut KeyRing) -> u32 {
    let new_version = keyring.current_version() + 1;
    keyring.insert(new_version, generate_group_key());
    new_version
}

pub fn build_group_keys_payload(group_id: &GroupId, keyring: &KeyRing) -> Result<GroupKeysPayload> {
    let keys = (1..=keyring.current_version())
        .map(|version| {
            keyring
                .get(version)
                .map(|key| GroupKeyEntry { version, key: key.0 })
                .ok_or_else(|| PartageError::missing_previous_key(format!("missing group key version {version}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupKeysPayload { group_id: group_id.clone(), keys, current_key_version: keyring.current_version() })
}

/// Import every historical key from a received payload into a fresh
/// keyring, as the joiner does right after decrypting its key package.
pub fn import_group_keys(payload: &GroupKeysPayload) -> KeyRing {
    let mut keyring = KeyRing::new();
    for entry in &payload.keys {
        keyring.insert(entry.version, partage_crypto::AeadKey::from_bytes(entry.key));
    }
    keyring
}

#[cfg(test)]
mod tests {
    use super::*;
    use partage_core::ReplicaId;
    use partage_crypto::generate_identity;

    #[test]
    fn approve_join_rotates_key_and_issues_one_package_per_recipient() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let mut keyring = KeyRing::new();
        keyring.insert(1, generate_group_key());

        let approver = generate_identity();
        let existing_member = generate_identity();
        let joiner = generate_identity();

        let recipients = vec![
            KeyPackageRecipient { member_id: MemberId::from_public_key_hash(&existing_member.public_key_hash), ecdh_public: existing_member.ecdh_public },
            KeyPackageRecipient { member_id: MemberId::from_public_key_hash(&joiner.public_key_hash), ecdh_public: joiner.ecdh_public },
        ];

        let packages = approve_join(
            &mut doc,
            &mut keyring,
            &GroupId::from("g1"),
            &approver,
            MemberId::from_public_key_hash(&joiner.public_key_hash),
            "Joiner".into(),
            &recipients,
            0,
        )
        .unwrap();

        assert_eq!(packages.len(), 2);
        assert_eq!(keyring.current_version(), 2);
        assert_eq!(doc.member_events().len(), 1);
    }

    #[test]
    fn joiner_can_open_its_package_and_recover_full_key_history() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let mut keyring = KeyRing::new();
        keyring.insert(1, generate_group_key());

        let approver = generate_identity();
        let joiner = generate_identity();
        let recipients = vec![KeyPackageRecipient { member_id: MemberId::from_public_key_hash(&joiner.public_key_hash), ecdh_public: joiner.ecdh_public }];

        let packages = approve_join(
            &mut doc,
            &mut keyring,
            &GroupId::from("g1"),
            &approver,
            MemberId::from_public_key_hash(&joiner.public_key_hash),
            "Joiner".into(),
            &recipients,
            0,
        )
        .unwrap();

        let opened = partage_crypto::open_key_package(&packages[0], &joiner.ecdh_secret).unwrap();
        let payload: GroupKeysPayload = serde_json::from_slice(&opened).unwrap();
        let joiner_keyring = import_group_keys(&payload);

        assert_eq!(joiner_keyring.current_version(), 2);
        assert!(joiner_keyring.get(1).is_some());
        assert!(joiner_keyring.get(2).is_some());
    }
}
