//! The convergent document itself: four materialized containers built by
//! replaying an append-only, per-replica-stamped operation log.
//!
//! `import` is idempotent under replay and commutative across peers because
//! every container is either grow-only (`entries`, `memberEvents`,
//! `members`) or a last-writer-wins register resolved by a total order over
//! op stamps (`settlementPreferences`) — there is nothing in the document
//! that can diverge given the same set of observed ops.

use crate::op::{CrdtOp, CrdtOpId, CrdtPayload, EntryRow, MemberEventRow};
use partage_core::{MemberId, PartageError, ReplicaId, Result, VersionVector};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
struct PreferenceRegister {
    winner: CrdtOpId,
    preferred_recipients: Vec<MemberId>,
}

/// One replica's view of a group's replicated ledger.
pub struct CrdtDocument {
    replica_id: ReplicaId,
    counter: u64,
    version: VersionVector,
    /// The full op log, keyed by stamp — the source of truth for export and
    /// idempotency; everything else below is a materialized projection.
    ops: BTreeMap<CrdtOpId, CrdtPayload>,
    entries: BTreeMap<String, EntryRow>,
    member_events: Vec<MemberEventRow>,
    preferences: BTreeMap<MemberId, PreferenceRegister>,
    legacy_members: Vec<serde_json::Value>,
}

/// Wire form of an `export_snapshot`/`export_from` result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Delta {
    ops: Vec<CrdtOp>,
}

impl CrdtDocument {
    pub fn new(replica_id: ReplicaId) -> Self {
        Self {
            replica_id,
            counter: 0,
            version: VersionVector::new(),
            ops: BTreeMap::new(),
            entries: BTreeMap::new(),
            member_events: Vec::new(),
            preferences: BTreeMap::new(),
            legacy_members: Vec::new(),
        }
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    /// Stamp `payload` as originating from this replica and apply it.
    pub fn apply_local_op(&mut self, payload: CrdtPayload) -> CrdtOpId {
        self.counter += 1;
        let id = CrdtOpId { counter: self.counter, replica: self.replica_id };
        self.apply(CrdtOp { id, payload });
        id
    }

    fn apply(&mut self, op: CrdtOp) {
        if self.ops.contains_key(&op.id) {
            return;
        }
        self.version.set(op.id.replica, op.id.counter);
        self.materialize(&op.payload, op.id);
        self.ops.insert(op.id, op.payload);
    }

    fn materialize(&mut self, payload: &CrdtPayload, id: CrdtOpId) {
        match payload {
            CrdtPayload::EntryPut(row) => {
                // Grow-only: the first writer for a given entry id wins,
                // which is always correct because entry ids are minted
                // fresh per version node and never reused.
                self.entries.entry(row.id.as_str().to_string()).or_insert_with(|| row.clone());
            }
            CrdtPayload::MemberEventAppend(row) => {
                if !self.member_events.iter().any(|existing| existing.id == row.id) {
                    self.member_events.push(row.clone());
                }
            }
            CrdtPayload::PreferenceSet { member_id, preferred_recipients } => {
                let incoming = PreferenceRegister { winner: id, preferred_recipients: preferred_recipients.clone() };
                match self.preferences.get(member_id) {
                    Some(current) if current.winner >= id => {}
                    _ => {
                        self.preferences.insert(member_id.clone(), incoming);
                    }
                }
            }
            CrdtPayload::LegacyMemberPut(value) => {
                self.legacy_members.push(value.clone());
            }
        }
    }

    pub fn version(&self) -> VersionVector {
        self.version.clone()
    }

    /// Full state, as a delta from the empty version vector.
    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        self.export_from(&VersionVector::new())
    }

    /// Every op this replica holds that `since` has not observed yet.
    pub fn export_from(&self, since: &VersionVector) -> Result<Vec<u8>> {
        let ops: Vec<CrdtOp> = self
            .ops
            .iter()
            .filter(|(id, _)| id.counter > since.get(&id.replica))
            .map(|(id, payload)| CrdtOp { id: *id, payload: payload.clone() })
            .collect();
        bincode::serialize(&Delta { ops }).map_err(|e| PartageError::serialization(e.to_string()))
    }

    /// Apply a snapshot or incremental delta produced by `export_snapshot`
    /// or `export_from`. Safe to call twice with the same bytes.
    pub fn import(&mut self, bytes: &[u8]) -> Result<()> {
        let delta: Delta = bincode::deserialize(bytes).map_err(|e| PartageError::serialization(e.to_string()))?;
        for op in delta.ops {
            self.apply(op);
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &EntryRow> {
        self.entries.values()
    }

    pub fn entry(&self, id: &str) -> Option<&EntryRow> {
        self.entries.get(id)
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Member events in the deterministic replay order from §4.4: ascending
    /// timestamp, ties broken by event id.
    pub fn member_events(&self) -> Vec<&MemberEventRow> {
        let mut events: Vec<&MemberEventRow> = self.member_events.iter().collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        events
    }

    pub fn preferred_recipients(&self, member_id: &MemberId) -> Option<&[MemberId]> {
        self.preferences.get(member_id).map(|r| r.preferred_recipients.as_slice())
    }

    pub fn legacy_members(&self) -> &[serde_json::Value] {
        &self.legacy_members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::EntryRowStatus;
    use partage_core::EntryId;

    fn entry_op(id: &str) -> CrdtPayload {
        CrdtPayload::EntryPut(EntryRow {
            id: EntryId::from(id),
            key_version: 1,
            ciphertext: vec![1, 2, 3],
            previous_version_id: None,
            status: EntryRowStatus::Active,
        })
    }

    #[test]
    fn export_from_empty_version_is_a_full_snapshot() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        doc.apply_local_op(entry_op("e1"));
        doc.apply_local_op(entry_op("e2"));

        let snapshot = doc.export_snapshot().unwrap();
        let from_zero = doc.export_from(&VersionVector::new()).unwrap();
        assert_eq!(snapshot, from_zero);
    }

    #[test]
    fn import_is_idempotent_under_replay() {
        let mut source = CrdtDocument::new(ReplicaId::new());
        source.apply_local_op(entry_op("e1"));
        let delta = source.export_snapshot().unwrap();

        let mut dest = CrdtDocument::new(ReplicaId::new());
        dest.import(&delta).unwrap();
        dest.import(&delta).unwrap();

        assert_eq!(dest.entries().count(), 1);
    }

    #[test]
    fn merge_of_two_replicas_is_commutative() {
        let mut r1 = CrdtDocument::new(ReplicaId::new());
        r1.apply_local_op(entry_op("from-r1"));
        let mut r2 = CrdtDocument::new(ReplicaId::new());
        r2.apply_local_op(entry_op("from-r2"));

        let r1_delta = r1.export_snapshot().unwrap();
        let r2_delta = r2.export_snapshot().unwrap();

        let mut a = CrdtDocument::new(ReplicaId::new());
        a.import(&r1_delta).unwrap();
        a.import(&r2_delta).unwrap();

        let mut b = CrdtDocument::new(ReplicaId::new());
        b.import(&r2_delta).unwrap();
        b.import(&r1_delta).unwrap();

        let mut a_ids: Vec<&str> = a.entry_ids().collect();
        let mut b_ids: Vec<&str> = b.entry_ids().collect();
        a_ids.sort();
        b_ids.sort();
        assert_eq!(a_ids, b_ids);
    }

    #[test]
    fn export_from_excludes_already_observed_ops() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        doc.apply_local_op(entry_op("e1"));
        let version_after_first = doc.version();
        doc.apply_local_op(entry_op("e2"));

        let delta = doc.export_from(&version_after_first).unwrap();
        let mut fresh = CrdtDocument::new(ReplicaId::new());
        fresh.import(&delta).unwrap();

        assert_eq!(fresh.entries().count(), 1);
        assert_eq!(fresh.entry("e2").unwrap().id.as_str(), "e2");
    }

    #[test]
    fn preference_register_resolves_ties_deterministically() {
        let replica = ReplicaId::new();
        let mut doc = CrdtDocument::new(replica);
        let member = MemberId::from_public_key_hash("m1");

        doc.apply_local_op(CrdtPayload::PreferenceSet {
            member_id: member.clone(),
            preferred_recipients: vec![MemberId::from_public_key_hash("a")],
        });
        doc.apply_local_op(CrdtPayload::PreferenceSet {
            member_id: member.clone(),
            preferred_recipients: vec![MemberId::from_public_key_hash("b")],
        });

        // Later local op has a higher counter, so it wins the register.
        assert_eq!(
            doc.preferred_recipients(&member).unwrap(),
            &[MemberId::from_public_key_hash("b")]
        );
    }
}
