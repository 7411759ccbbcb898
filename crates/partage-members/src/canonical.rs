//! Transitive resolution of `member_replaced` chains into a canonical-id map.

use crate::event::{sorted_events, MemberEvent, MemberEventKind};
use partage_core::MemberId;
use std::collections::BTreeMap;

/// One `member_replaced` edge and the event that produced it, kept so a
/// cycle break can compare "earliest" edges.
struct ReplaceEdge {
    target: MemberId,
    timestamp: i64,
    event_id: String,
}

/// Build the map from every member id that has ever been replaced to its
/// terminal (canonical) id. Members with no outgoing edge are simply absent
/// from the map; callers should treat a missing entry as "canonical is
/// itself".
pub fn build_canonical_id_map(events: &[MemberEvent]) -> BTreeMap<MemberId, MemberId> {
    let mut edges: BTreeMap<MemberId, ReplaceEdge> = BTreeMap::new();
    let mut active: BTreeMap<MemberId, bool> = BTreeMap::new();

    for event in sorted_events(events) {
        match &event.kind {
            MemberEventKind::MemberCreated { .. } => {
                active.entry(event.member_id.clone()).or_insert(true);
            }
            MemberEventKind::MemberRetired => {
                active.insert(event.member_id.clone(), false);
            }
            MemberEventKind::MemberUnretired => {
                if !edges.contains_key(&event.member_id) {
                    active.insert(event.member_id.clone(), true);
                }
            }
            MemberEventKind::MemberReplaced { replaced_by_id } => {
                let is_active = active.get(&event.member_id).copied().unwrap_or(false);
                if is_active && !edges.contains_key(&event.member_id) {
                    edges.insert(
                        event.member_id.clone(),
                        ReplaceEdge {
                            target: replaced_by_id.clone(),
                            timestamp: event.timestamp,
                            event_id: event.id.clone(),
                        },
                    );
                    active.insert(event.member_id.clone(), false);
                }
            }
            MemberEventKind::MemberRenamed { .. } => {}
        }
    }

    let mut canonical = BTreeMap::new();
    let starts: Vec<MemberId> = edges.keys().cloned().collect();
    for start in starts {
        canonical.insert(start.clone(), resolve(&start, &edges));
    }
    canonical
}

/// Walk the replace chain from `start`. On revisiting a node, the cycle is
/// broken at the node whose own `member_replaced` event is earliest
/// (by timestamp, then event id) — that node becomes the sink.
fn resolve(start: &MemberId, edges: &BTreeMap<MemberId, ReplaceEdge>) -> MemberId {
    let mut path = vec![start.clone()];
    let mut current = start.clone();

    loop {
        let Some(edge) = edges.get(&current) else {
            return current;
        };
        if let Some(cycle_start) = path.iter().position(|m| *m == edge.target) {
            let cycle_nodes = &path[cycle_start..];
            return cycle_nodes
                .iter()
                .min_by(|a, b| {
                    let ea = &edges[*a];
                    let eb = &edges[*b];
                    (ea.timestamp, ea.event_id.as_str()).cmp(&(eb.timestamp, eb.event_id.as_str()))
                })
                .cloned()
                .unwrap_or_else(|| current.clone());
        }
        path.push(edge.target.clone());
        current = edge.target.clone();
    }
}

/// Resolve a single member id against the canonical map, defaulting to
/// itself when it has never been replaced.
pub fn resolve_canonical(member_id: &MemberId, canonical_map: &BTreeMap<MemberId, MemberId>) -> MemberId {
    canonical_map.get(member_id).cloned().unwrap_or_else(|| member_id.clone())
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

    fn created(id: &str, member: &str, ts: i64) -> MemberEvent {
        event(id, member, ts, MemberEventKind::MemberCreated { name: member.into(), public_key: None, is_virtual: false })
    }

    #[test]
    fn transitive_chain_resolves_to_terminal_member() {
        let events = vec![
            created("c1", "a", 1),
            created("c2", "b", 1),
            created("c3", "c", 1),
            event("r1", "a", 2, MemberEventKind::MemberReplaced { replaced_by_id: MemberId::from_public_key_hash("b") }),
            event("r2", "b", 3, MemberEventKind::MemberReplaced { replaced_by_id: MemberId::from_public_key_hash("c") }),
        ];
        let map = build_canonical_id_map(&events);
        assert_eq!(map[&MemberId::from_public_key_hash("a")], MemberId::from_public_key_hash("c"));
        assert_eq!(map[&MemberId::from_public_key_hash("b")], MemberId::from_public_key_hash("c"));
    }

    #[test]
    fn cycle_is_broken_at_earliest_replace_event() {
        let events = vec![
            created("c1", "a", 1),
            created("c2", "b", 1),
            event("r1", "a", 5, MemberEventKind::MemberReplaced { replaced_by_id: MemberId::from_public_key_hash("b") }),
            event("r2", "b", 2, MemberEventKind::MemberReplaced { replaced_by_id: MemberId::from_public_key_hash("a") }),
        ];
        let map = build_canonical_id_map(&events);
        // r2 (timestamp 2) is earlier than r1 (timestamp 5), so "b" is the sink.
        let sink = MemberId::from_public_key_hash("b");
        assert_eq!(map[&MemberId::from_public_key_hash("a")], sink);
        assert_eq!(map[&MemberId::from_public_key_hash("b")], sink);
    }

    #[test]
    fn member_with_no_replace_event_is_absent_from_map() {
        let events = vec![created("c1", "solo", 1)];
        let map = build_canonical_id_map(&events);
        assert!(!map.contains_key(&MemberId::from_public_key_hash("solo")));
        assert_eq!(resolve_canonical(&MemberId::from_public_key_hash("solo"), &map), MemberId::from_public_key_hash("solo"));
    }
}
