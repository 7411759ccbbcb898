//! The incremental state manager: on every observed update, recompute
//! balances and activities in O(new ops), not O(full log) (§4.8).

use partage_activity::{activity_for_entry, generate_member_activities, insert_activity, Activity};
use partage_balance::{apply_delta, calculate_balances, entry_delta, Balance};
use partage_core::{EntryId, MemberId};
use partage_crdt::CrdtDocument;
use partage_entries::{get_entry, Entry, EntryStatus, KeyRing};
use partage_members::{build_canonical_id_map, compute_member_states, MemberEvent, MemberState};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Per-group derived state, maintained incrementally as the CRDT document
/// observes new entries and member events.
pub struct GroupState {
    processed_entry_ids: HashSet<String>,
    processed_member_event_ids: HashSet<String>,
    entries_by_id: HashMap<String, Entry>,
    active_entry_ids: HashSet<String>,
    superseded_entry_ids: HashSet<String>,
    balances_cents: BTreeMap<MemberId, (i64, i64)>,
    activities: Vec<Activity>,
    member_states: BTreeMap<MemberId, MemberState>,
    canonical_id_map: BTreeMap<MemberId, MemberId>,
}

impl GroupState {
    pub fn balances(&self) -> BTreeMap<MemberId, Balance> {
        self.balances_cents
            .iter()
            .map(|(member, (paid, owed))| {
                (
                    member.clone(),
                    Balance {
                        total_paid: partage_core::money::from_cents(*paid),
                        total_owed: partage_core::money::from_cents(*owed),
                        net_balance: partage_core::money::from_cents(paid - owed),
                    },
                )
            })
            .collect()
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn member_states(&self) -> &BTreeMap<MemberId, MemberState> {
        &self.member_states
    }

    pub fn canonical_id_map(&self) -> &BTreeMap<MemberId, MemberId> {
        &self.canonical_id_map
    }

    pub fn is_active(&self, entry_id: &EntryId) -> bool {
        self.active_entry_ids.contains(entry_id.as_str())
    }
}

fn member_events_from_doc(doc: &CrdtDocument) -> Vec<MemberEvent> {
    doc.member_events()
        .into_iter()
        .filter_map(|row| {
            let parsed = MemberEvent::from_row(row);
            if parsed.is_none() {
                tracing::warn!(event_id = %row.id, "dropping member event with unparseable kind");
            }
            parsed
        })
        .collect()
}

/// Full from-scratch recompute: decrypt every entry, derive member state,
/// build the canonical map, and compute balances/activities over the
/// complete current active set.
pub fn initialize(doc: &CrdtDocument, keyring: &KeyRing) -> GroupState {
    let member_events = member_events_from_doc(doc);
    let member_states = compute_member_states(&member_events);
    let canonical_id_map = build_canonical_id_map(&member_events);

    let mut entries_by_id = HashMap::new();
    let mut active_entry_ids = HashSet::new();
    let mut superseded_entry_ids = HashSet::new();
    let mut processed_entry_ids = HashSet::new();

    for id in doc.entry_ids() {
        let Ok(entry) = get_entry(doc, &EntryId::from(id), keyring) else {
            tracing::warn!(entry_id = id, "skipping entry that could not be decrypted during initialize");
            continue;
        };
        processed_entry_ids.insert(id.to_string());
        if let Some(prev) = &entry.previous_version_id {
            superseded_entry_ids.insert(prev.as_str().to_string());
        }
        entries_by_id.insert(id.to_string(), entry);
    }

    let mut active_entries: Vec<&Entry> = Vec::new();
    for (id, entry) in &entries_by_id {
        if entry.status == EntryStatus::Active && !superseded_entry_ids.contains(id) {
            active_entry_ids.insert(id.clone());
            active_entries.push(entry);
        }
    }

    let balances = calculate_balances(&active_entries.iter().map(|e| (*e).clone()).collect::<Vec<_>>(), &canonical_id_map);
    let balances_cents = balances
        .into_iter()
        .map(|(member, balance)| (member, (partage_core::money::to_cents(balance.total_paid), partage_core::money::to_cents(balance.total_owed))))
        .collect();

    let mut activities: Vec<Activity> = entries_by_id
        .values()
        .map(|entry| {
            let prev = entry.previous_version_id.as_ref().and_then(|id| entries_by_id.get(id.as_str()));
            activity_for_entry(entry, prev)
        })
        .collect();
    activities.extend(generate_member_activities(&member_events));
    partage_activity::sort_activities(&mut activities);

    GroupState {
        processed_entry_ids,
        processed_member_event_ids: member_events.iter().map(|e| e.id.clone()).collect(),
        entries_by_id,
        active_entry_ids,
        superseded_entry_ids,
        balances_cents,
        activities,
        member_states,
        canonical_id_map,
    }
}

impl GroupState {
    /// Apply a single delta to the running cent totals. `sign` is `1` to add
    /// a contribution and `-1` to reverse one — the same delta both ways is
    /// what keeps incremental application commutative (§4.8).
    fn apply_balance_delta(&mut self, entry: &Entry, sign: i64) {
        let delta = entry_delta(entry, &self.canonical_id_map);
        apply_delta(&mut self.balances_cents, &delta, sign);
    }

    /// Fold one newly observed entry into active set, balances, and
    /// activities.
    pub fn apply_entry(&mut self, entry: Entry) {
        let id = entry.id.as_str().to_string();
        if self.processed_entry_ids.contains(&id) {
            return;
        }
        self.processed_entry_ids.insert(id.clone());

        let prev_id = entry.previous_version_id.clone();
        let prev = prev_id.as_ref().and_then(|p| self.entries_by_id.get(p.as_str()).cloned());

        match (&prev_id, entry.status) {
            (None, EntryStatus::Active) => {
                self.active_entry_ids.insert(id.clone());
                self.apply_balance_delta(&entry, 1);
            }
            (Some(prev_id_val), EntryStatus::Active) => {
                self.superseded_entry_ids.insert(prev_id_val.as_str().to_string());
                if let Some(prev_entry) = &prev {
                    if self.active_entry_ids.remove(prev_id_val.as_str()) {
                        self.apply_balance_delta(prev_entry, -1);
                    }
                }
                self.active_entry_ids.insert(id.clone());
                self.apply_balance_delta(&entry, 1);
            }
            (Some(prev_id_val), EntryStatus::Deleted) => {
                self.superseded_entry_ids.insert(prev_id_val.as_str().to_string());
                if let Some(prev_entry) = &prev {
                    if self.active_entry_ids.remove(prev_id_val.as_str()) {
                        self.apply_balance_delta(prev_entry, -1);
                    }
                }
            }
            (None, EntryStatus::Deleted) => {
                // A brand-new entry that arrives already deleted contributes nothing.
            }
        }

        let activity = activity_for_entry(&entry, prev.as_ref());
        insert_activity(&mut self.activities, activity);
        self.entries_by_id.insert(id, entry);
    }

    /// Recompute member states, the canonical map, and (if the canonical
    /// map changed) balances from the current active set, then insert
    /// member activities for any newly observed events.
    fn apply_member_events(&mut self, new_events: &[MemberEvent], all_events: &[MemberEvent]) {
        let old_canonical_id_map = self.canonical_id_map.clone();
        self.member_states = compute_member_states(all_events);
        self.canonical_id_map = build_canonical_id_map(all_events);

        if self.canonical_id_map != old_canonical_id_map {
            let active_entries: Vec<Entry> = self
                .active_entry_ids
                .iter()
                .filter_map(|id| self.entries_by_id.get(id).cloned())
                .collect();
            let balances = calculate_balances(&active_entries, &self.canonical_id_map);
            self.balances_cents = balances
                .into_iter()
                .map(|(member, balance)| (member, (partage_core::money::to_cents(balance.total_paid), partage_core::money::to_cents(balance.total_owed))))
                .collect();
        }

        for activity in generate_member_activities(new_events) {
            insert_activity(&mut self.activities, activity);
        }
    }

    /// Diff the document against what this state has already processed and
    /// fold in anything new: member events first (since a canonical-id
    /// change can redirect existing balances), then new entries.
    pub fn handle_update(&mut self, doc: &CrdtDocument, keyring: &KeyRing) {
        let all_events = member_events_from_doc(doc);
        let new_events: Vec<MemberEvent> =
            all_events.iter().filter(|e| !self.processed_member_event_ids.contains(&e.id)).cloned().collect();

        if !new_events.is_empty() {
            for event in &new_events {
                self.processed_member_event_ids.insert(event.id.clone());
            }
            self.apply_member_events(&new_events, &all_events);
        }

        let new_entry_ids: Vec<String> =
            doc.entry_ids().filter(|id| !self.processed_entry_ids.contains(*id)).map(str::to_string).collect();

        for id in new_entry_ids {
            match get_entry(doc, &EntryId::from(id.as_str()), keyring) {
                Ok(entry) => self.apply_entry(entry),
                Err(err) => tracing::warn!(entry_id = id, error = %err, "skipping entry that failed to decrypt during handle_update"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partage_core::ReplicaId;
    use partage_crdt::{CrdtDocument, CrdtPayload, MemberEventRow};
    use partage_entries::{create_entry, delete_entry, EntryKind, TransferFields};

    fn new_keyring() -> KeyRing {
        let mut keyring = KeyRing::new();
        keyring.insert(1, partage_crypto::generate_group_key());
        keyring
    }

    fn transfer(id: &str, amount: f64) -> Entry {
        Entry {
            id: EntryId::from(id),
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
            key_version: 1,
        }
    }

    #[test]
    fn initialize_computes_balances_from_scratch() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = new_keyring();
        create_entry(&mut doc, transfer("e1", 25.0), &keyring).unwrap();

        let state = initialize(&doc, &keyring);
        let balances = state.balances();
        assert_eq!(balances[&MemberId::from_public_key_hash("a")].total_paid, 25.0);
        assert_eq!(balances[&MemberId::from_public_key_hash("b")].total_owed, 25.0);
    }

    #[test]
    fn handle_update_only_processes_new_entries() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = new_keyring();
        create_entry(&mut doc, transfer("e1", 10.0), &keyring).unwrap();

        let mut state = initialize(&doc, &keyring);
        let e1 = create_entry(&mut doc, transfer("e2", 20.0), &keyring).unwrap();
        state.handle_update(&doc, &keyring);

        assert!(state.is_active(&e1));
        let balances = state.balances();
        assert_eq!(balances[&MemberId::from_public_key_hash("a")].total_paid, 30.0);

        // Re-running handle_update with no new ops must not double-count.
        state.handle_update(&doc, &keyring);
        let balances_again = state.balances();
        assert_eq!(balances_again[&MemberId::from_public_key_hash("a")].total_paid, 30.0);
    }

    #[test]
    fn deleting_an_active_entry_removes_its_balance_contribution() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = new_keyring();
        let e1 = create_entry(&mut doc, transfer("e1", 40.0), &keyring).unwrap();

        let mut state = initialize(&doc, &keyring);
        delete_entry(&mut doc, &e1, MemberId::from_public_key_hash("a"), None, &keyring, 5).unwrap();
        state.handle_update(&doc, &keyring);

        assert!(state.balances().is_empty());
    }

    #[test]
    fn canonical_map_change_redirects_existing_balances() {
        let mut doc = CrdtDocument::new(ReplicaId::new());
        let keyring = new_keyring();
        create_entry(&mut doc, transfer("e1", 15.0), &keyring).unwrap();
        let mut state = initialize(&doc, &keyring);

        doc.apply_local_op(CrdtPayload::MemberEventAppend(MemberEventRow {
            id: partage_core::MemberEventId::from("ev1"),
            member_id: MemberId::from_public_key_hash("b"),
            actor_id: MemberId::from_public_key_hash("b"),
            timestamp: 1,
            kind: serde_json::json!({"type": "member_created", "name": "B", "public_key": null, "is_virtual": false}),
        }));
        doc.apply_local_op(CrdtPayload::MemberEventAppend(MemberEventRow {
            id: partage_core::MemberEventId::from("ev2"),
            member_id: MemberId::from_public_key_hash("b"),
            actor_id: MemberId::from_public_key_hash("b"),
            timestamp: 2,
            kind: serde_json::json!({"type": "member_replaced", "replaced_by_id": "canonical-b"}),
        }));
        state.handle_update(&doc, &keyring);

        let balances = state.balances();
        assert!(!balances.contains_key(&MemberId::from_public_key_hash("b")));
        assert_eq!(balances[&MemberId::from_public_key_hash("canonical-b")].total_owed, 15.0);
    }
}
