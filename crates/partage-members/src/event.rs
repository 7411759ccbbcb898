//! The typed member-event vocabulary. Stored in the CRDT document as an
//! opaque JSON blob (see `partage_crdt::MemberEventRow::kind`); this module
//! owns interpreting and validating it.

use partage_core::MemberId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberEventKind {
    MemberCreated { name: String, public_key: Option<String>, is_virtual: bool },
    MemberRenamed { previous_name: String, new_name: String },
    MemberRetired,
    MemberUnretired,
    /// Aliases `memberId` to `replaced_by_id` going forward.
    MemberReplaced { replaced_by_id: MemberId },
}

/// A member-event log entry, as seen by this crate (the CRDT-level framing
/// of `id`/`member_id`/`actor_id`/`timestamp` plus the typed `kind`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEvent {
    pub id: String,
    pub member_id: MemberId,
    pub actor_id: MemberId,
    pub timestamp: i64,
    pub kind: MemberEventKind,
}

impl MemberEvent {
    pub fn from_row(row: &partage_crdt::MemberEventRow) -> Option<Self> {
        let kind: MemberEventKind = serde_json::from_value(row.kind.clone()).ok()?;
        Some(Self {
            id: row.id.as_str().to_string(),
            member_id: row.member_id.clone(),
            actor_id: row.actor_id.clone(),
            timestamp: row.timestamp,
            kind,
        })
    }
}

/// Sort into the deterministic replay order from the data model: ascending
/// timestamp, ties broken by event id.
pub fn sorted_events(events: &[MemberEvent]) -> Vec<&MemberEvent> {
    let mut sorted: Vec<&MemberEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    sorted
}
