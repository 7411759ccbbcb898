//! Derives current member state from the ordered event stream.

use crate::event::{sorted_events, MemberEvent, MemberEventKind};
use partage_core::MemberId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberState {
    pub name: String,
    pub is_virtual: bool,
    pub public_key: Option<String>,
    pub is_retired: bool,
    pub is_replaced: bool,
    pub replaced_by_id: Option<MemberId>,
}

impl MemberState {
    pub fn is_active(&self) -> bool {
        !self.is_retired && !self.is_replaced
    }
}

/// Replay `events` in `(timestamp, id)` order, applying each only if it is
/// valid against the member's current state; invalid events are discarded
/// rather than failing the whole replay.
pub fn compute_member_states(events: &[MemberEvent]) -> BTreeMap<MemberId, MemberState> {
    let mut states: BTreeMap<MemberId, MemberState> = BTreeMap::new();

    for event in sorted_events(events) {
        let existing = states.get(&event.member_id);
        match &event.kind {
            MemberEventKind::MemberCreated { name, public_key, is_virtual } => {
                if existing.is_some() {
                    tracing::debug!(member_id = %event.member_id, "skipping duplicate member_created");
                    continue;
                }
                states.insert(
                    event.member_id.clone(),
                    MemberState {
                        name: name.clone(),
                        is_virtual: *is_virtual,
                        public_key: public_key.clone(),
                        is_retired: false,
                        is_replaced: false,
                        replaced_by_id: None,
                    },
                );
            }
            MemberEventKind::MemberRenamed { new_name, .. } => {
                // Always valid, but only meaningful once the member exists.
                if let Some(state) = states.get_mut(&event.member_id) {
                    state.name = new_name.clone();
                }
            }
            MemberEventKind::MemberRetired => {
                if let Some(state) = states.get_mut(&event.member_id) {
                    if state.is_active() {
                        state.is_retired = true;
                    }
                }
            }
            MemberEventKind::MemberUnretired => {
                if let Some(state) = states.get_mut(&event.member_id) {
                    if state.is_retired && !state.is_replaced {
                        state.is_retired = false;
                    }
                }
            }
            MemberEventKind::MemberReplaced { replaced_by_id } => {
                if let Some(state) = states.get_mut(&event.member_id) {
                    if state.is_active() {
                        state.is_replaced = true;
                        state.replaced_by_id = Some(replaced_by_id.clone());
                    }
                }
            }
        }
    }

    states
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, member: &str, ts: i64, kind: MemberEventKind) -> MemberEvent {
        MemberEvent {
            id: id.to_string(),
            member_id: MemberId::from_public_key_hash(member),
            actor_id: MemberId::from_public_key_hash(member),
            timestamp: ts,
            kind,
        }
    }

    #[test]
    fn created_then_renamed_reflects_latest_name() {
        let events = vec![
            event("e1", "alice", 1, MemberEventKind::MemberCreated { name: "Alice".into(), public_key: None, is_virtual: false }),
            event("e2", "alice", 2, MemberEventKind::MemberRenamed { previous_name: "Alice".into(), new_name: "Al".into() }),
        ];
        let states = compute_member_states(&events);
        let alice = &states[&MemberId::from_public_key_hash("alice")];
        assert_eq!(alice.name, "Al");
        assert!(alice.is_active());
    }

    #[test]
    fn retire_only_valid_on_active_member() {
        let events = vec![
            event("e1", "bob", 1, MemberEventKind::MemberCreated { name: "Bob".into(), public_key: None, is_virtual: false }),
            event("e2", "bob", 2, MemberEventKind::MemberRetired),
            event("e3", "bob", 3, MemberEventKind::MemberRetired),
        ];
        let states = compute_member_states(&events);
        let bob = &states[&MemberId::from_public_key_hash("bob")];
        assert!(bob.is_retired);
    }

    #[test]
    fn unretire_only_valid_on_retired_member() {
        let events = vec![
            event("e1", "carol", 1, MemberEventKind::MemberCreated { name: "Carol".into(), public_key: None, is_virtual: false }),
            event("e2", "carol", 2, MemberEventKind::MemberUnretired),
        ];
        let states = compute_member_states(&events);
        let carol = &states[&MemberId::from_public_key_hash("carol")];
        assert!(!carol.is_retired, "unretire on a never-retired member must be a no-op");
    }

    #[test]
    fn replace_only_valid_on_active_member() {
        let events = vec![
            event("e1", "dan", 1, MemberEventKind::MemberCreated { name: "Dan".into(), public_key: None, is_virtual: false }),
            event("e2", "dan", 2, MemberEventKind::MemberRetired),
            event(
                "e3",
                "dan",
                3,
                MemberEventKind::MemberReplaced { replaced_by_id: MemberId::from_public_key_hash("dan2") },
            ),
        ];
        let states = compute_member_states(&events);
        let dan = &states[&MemberId::from_public_key_hash("dan")];
        assert!(!dan.is_replaced, "replace on a retired (non-active) member must be discarded");
    }

    #[test]
    fn ties_broken_by_event_id_lexicographically() {
        // Same timestamp, two creates with the applicable one decided by id.
        let events = vec![
            event("b-rename", "erin", 5, MemberEventKind::MemberRenamed { previous_name: "Erin".into(), new_name: "E2".into() }),
            event("a-create", "erin", 5, MemberEventKind::MemberCreated { name: "Erin".into(), public_key: None, is_virtual: false }),
        ];
        let states = compute_member_states(&events);
        let erin = &states[&MemberId::from_public_key_hash("erin")];
        assert_eq!(erin.name, "E2", "create (a-create) must replay before rename (b-rename) at equal timestamps");
    }
}
