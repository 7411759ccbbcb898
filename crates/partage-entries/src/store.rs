//! Operations over the CRDT document's `entries` container: encrypting
//! plaintext entries into rows on write, decrypting rows back into entries
//! on read, with the version-chain bookkeeping the data model requires.

use crate::entry::{Entry, EntryStatus};
use crate::keyring::KeyRing;
use partage_core::{EntryId, MemberId, PartageError, Result};
use partage_crdt::{CrdtDocument, CrdtPayload, EntryRow, EntryRowStatus};
use std::collections::{HashMap, HashSet};

fn row_status(status: EntryStatus) -> EntryRowStatus {
    match status {
        EntryStatus::Active => EntryRowStatus::Active,
        EntryStatus::Deleted => EntryRowStatus::Deleted,
    }
}

/// Encrypt `entry` under the keyring's current key and insert it as a new
/// row. `entry.key_version` is overwritten to match the key actually used.
pub fn create_entry(doc: &mut CrdtDocument, mut entry: Entry, keyring: &KeyRing) -> Result<EntryId> {
    let key = keyring.current_key().ok_or_else(|| PartageError::key_not_found("no current group key"))?;
    entry.key_version = keyring.current_version();
    let id = entry.id.clone();
    let status = row_status(entry.status);
    let previous_version_id = entry.previous_version_id.clone();

    let plaintext = serde_json::to_vec(&entry).map_err(|e| PartageError::serialization(e.to_string()))?;
    let ciphertext = partage_crypto::aead_encrypt(key, &plaintext, id.as_str().as_bytes())?;

    doc.apply_local_op(CrdtPayload::EntryPut(EntryRow {
        id: id.clone(),
        key_version: entry.key_version,
        ciphertext,
        previous_version_id,
        status,
    }));
    Ok(id)
}

/// Append a new version in `original_id`'s chain.
pub fn modify_entry(doc: &mut CrdtDocument, original_id: &EntryId, mut new_entry: Entry, keyring: &KeyRing) -> Result<EntryId> {
    new_entry.previous_version_id = Some(original_id.clone());
    create_entry(doc, new_entry, keyring)
}

/// Emit a successor row with `status=deleted`.
pub fn delete_entry(
    doc: &mut CrdtDocument,
    id: &EntryId,
    actor: MemberId,
    reason: Option<String>,
    keyring: &KeyRing,
    now_ms: i64,
) -> Result<EntryId> {
    let current = get_entry(doc, id, keyring)?;
    let mut successor = current;
    successor.id = EntryId::new();
    successor.version += 1;
    successor.previous_version_id = Some(id.clone());
    successor.status = EntryStatus::Deleted;
    successor.deleted_at = Some(now_ms);
    successor.deleted_by = Some(actor);
    successor.deletion_reason = reason;
    create_entry(doc, successor, keyring)
}

/// Emit a successor row with `status=active`, reversing a delete.
pub fn undelete_entry(doc: &mut CrdtDocument, id: &EntryId, actor: MemberId, keyring: &KeyRing, now_ms: i64) -> Result<EntryId> {
    let current = get_entry(doc, id, keyring)?;
    let mut successor = current;
    successor.id = EntryId::new();
    successor.version += 1;
    successor.previous_version_id = Some(id.clone());
    successor.status = EntryStatus::Active;
    successor.modified_at = Some(now_ms);
    successor.modified_by = Some(actor);
    successor.deleted_at = None;
    successor.deleted_by = None;
    successor.deletion_reason = None;
    create_entry(doc, successor, keyring)
}

fn decrypt_row(row: &EntryRow, keyring: &KeyRing) -> Result<Entry> {
    for (_, key) in keyring.fallback_order(row.key_version) {
        if let Ok(plaintext) = partage_crypto::aead_decrypt(key, &row.ciphertext, row.id.as_str().as_bytes()) {
            return serde_json::from_slice(&plaintext).map_err(|e| PartageError::serialization(e.to_string()));
        }
    }
    Err(PartageError::decryption_failed(format!("no known key version could decrypt entry {}", row.id)))
}

pub fn get_entry(doc: &CrdtDocument, id: &EntryId, keyring: &KeyRing) -> Result<Entry> {
    let row = doc.entry(id.as_str()).ok_or_else(|| PartageError::not_found(format!("entry {} not found", id)))?;
    decrypt_row(row, keyring)
}

pub fn get_entry_ids(doc: &CrdtDocument) -> Vec<EntryId> {
    doc.entry_ids().map(EntryId::from).collect()
}

pub fn get_entries_by_ids(doc: &CrdtDocument, ids: &[EntryId], keyring: &KeyRing) -> Vec<Result<Entry>> {
    ids.iter().map(|id| get_entry(doc, id, keyring)).collect()
}

pub fn get_all_entries(doc: &CrdtDocument, keyring: &KeyRing) -> Vec<Entry> {
    doc.entries().filter_map(|row| decrypt_row(row, keyring).ok()).collect()
}

/// Rows that are nobody's predecessor: the tail of each version chain.
///
/// A `previous_version_id` cycle (e.g. A points back to B which points to A)
/// would otherwise leave every member of the cycle superseded by another
/// member and none of them reachable as a tail, silently dropping the whole
/// chain. Per §4.3/§7 that's tolerated on read: each cycle member is instead
/// treated as an independent current entry.
fn tail_ids(doc: &CrdtDocument) -> HashSet<String> {
    let prev_of: HashMap<String, String> = doc
        .entries()
        .filter_map(|row| row.previous_version_id.as_ref().map(|prev| (row.id.as_str().to_string(), prev.as_str().to_string())))
        .collect();
    let superseded: HashSet<&str> = prev_of.values().map(String::as_str).collect();

    let mut tails: HashSet<String> =
        doc.entries().map(|row| row.id.as_str().to_string()).filter(|id| !superseded.contains(id.as_str())).collect();

    for id in prev_of.keys() {
        if tails.contains(id) {
            continue;
        }
        if let Some(cycle_root) = find_cycle_from(id, &prev_of) {
            let reason = PartageError::conflicting_chain(format!("previous_version_id cycle through {cycle_root}")).to_string();
            tracing::warn!(entry_id = %id, %cycle_root, %reason, "treating cyclic entry as an independent current entry");
            tails.insert(id.clone());
        }
    }
    tails
}

/// Walk `id`'s predecessor chain; returns the first id revisited (the
/// cycle's entry point) if the chain loops back on itself, `None` if it
/// terminates normally.
fn find_cycle_from(id: &str, prev_of: &HashMap<String, String>) -> Option<String> {
    let mut seen = HashSet::new();
    let mut current = id;
    loop {
        if !seen.insert(current.to_string()) {
            return Some(current.to_string());
        }
        match prev_of.get(current) {
            Some(prev) => current = prev.as_str(),
            None => return None,
        }
    }
}

/// Tails only, regardless of status.
pub fn get_current_entries(doc: &CrdtDocument, keyring: &KeyRing) -> Vec<Entry> {
    let tails = tail_ids(doc);
    doc.entries()
        .filter(|row| tails.contains(row.id.as_str()))
        .filter_map(|row| decrypt_row(row, keyring).ok())
        .collect()
}

/// Tails whose status is active.
pub fn get_active_entries(doc: &CrdtDocument, keyring: &KeyRing) -> Vec<Entry> {
    get_current_entries(doc, keyring).into_iter().filter(|e| e.status == EntryStatus::Active).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, TransferFields};
    use partage_core::ReplicaId;

    fn base_entry(id: EntryId, amount: f64) -> Entry {
        Entry {
            id,
            group_id: "g1".into(),
            kind: EntryKind::Transfer(TransferFields { from: MemberId::from_public_key_hash("a"), to: MemberId::from_public_key_hash("b") }),
            version: 1,
            created_at: 0,
            created_by: MemberId::from_public_key_hash("a"),
            status: EntryStatus::Active,
            previous_version_id: None,
            modified_at: None,
            modified_by: None,
            deleted_at: None,
            deleted_by: None,
            deletion_reason: None,
            amount,
            currency: "USD".into(),
            default_currency_amount: None,
            date: 0,
            notes: None,
            key_version: 0,
        }
    }

    fn keyring_with_one_key() -> KeyRing {
        let mut keyring = KeyRing::new();
        keyring.insert(1, partage_crypto::generate_group_key());
        keyring
    }

    #[test]
    fn round_trips_through_create_and_get() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = keyring_with_one_key();
        let id = create_entry(&mut doc, base_entry(EntryId::from("e1"), 100.0), &keyring).unwrap();

        let fetched = get_entry(&doc, &id, &keyring).unwrap();
        assert_eq!(fetched.amount, 100.0);
    }

    #[test]
    fn decrypt_falls_back_across_key_history() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let mut keyring = KeyRing::new();
        keyring.insert(1, partage_crypto::generate_group_key());
        let id = create_entry(&mut doc, base_entry(EntryId::from("e1"), 50.0), &keyring).unwrap();

        // Rotate: version 1 is now history, version 2 is current.
        keyring.insert(2, partage_crypto::generate_group_key());

        let fetched = get_entry(&doc, &id, &keyring).unwrap();
        assert_eq!(fetched.amount, 50.0);
    }

    #[test]
    fn modify_then_current_entries_returns_only_tail() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = keyring_with_one_key();
        let e1 = create_entry(&mut doc, base_entry(EntryId::from("e1"), 100.0), &keyring).unwrap();
        let mut e2 = base_entry(EntryId::from("e2"), 60.0);
        e2.version = 2;
        modify_entry(&mut doc, &e1, e2, &keyring).unwrap();

        let current = get_current_entries(&doc, &keyring);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].amount, 60.0);
    }

    #[test]
    fn delete_then_active_entries_is_empty_and_current_entries_is_not() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = keyring_with_one_key();
        let e1 = create_entry(&mut doc, base_entry(EntryId::from("e1"), 100.0), &keyring).unwrap();
        delete_entry(&mut doc, &e1, MemberId::from_public_key_hash("a"), None, &keyring, 1).unwrap();

        assert!(get_active_entries(&doc, &keyring).is_empty());
        assert_eq!(get_current_entries(&doc, &keyring).len(), 1);
    }

    #[test]
    fn previous_version_id_cycle_keeps_both_entries_as_current() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = keyring_with_one_key();
        let e1 = create_entry(&mut doc, base_entry(EntryId::from("e1"), 100.0), &keyring).unwrap();
        let e2 = create_entry(&mut doc, base_entry(EntryId::from("e2"), 60.0), &keyring).unwrap();

        // Force a cycle: e1 -> e2 -> e1. A well-formed chain never produces
        // this, but a malicious or buggy peer's op could; neither entry
        // should vanish because of it.
        let mut e1_again = base_entry(e1.clone(), 100.0);
        e1_again.previous_version_id = Some(e2.clone());
        create_entry(&mut doc, e1_again, &keyring).unwrap();
        let mut e2_again = base_entry(e2.clone(), 60.0);
        e2_again.previous_version_id = Some(e1.clone());
        create_entry(&mut doc, e2_again, &keyring).unwrap();

        let current = get_current_entries(&doc, &keyring);
        let mut ids: Vec<_> = current.iter().map(|e| e.id.as_str().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec![e1.as_str().to_string(), e2.as_str().to_string()]);
    }

    #[test]
    fn missing_entry_is_not_found() {
        let doc = CrdtDocument::new(ReplicaId::new());
        let keyring = keyring_with_one_key();
        let result = get_entry(&doc, &EntryId::from("missing"), &keyring);
        assert!(matches!(result, Err(PartageError::NotFound { .. })));
    }
}
