//! The operation log that backs [`crate::document::CrdtDocument`]. Every
//! mutation is wrapped in a [`CrdtOp`] stamped with the replica that
//! produced it and that replica's local counter; replaying the same set of
//! ops in any order onto any replica converges to the same materialized
//! state.

use partage_core::{EntryId, MemberEventId, MemberId, ReplicaId};
use serde::{Deserialize, Serialize};

/// Stamps an op with its origin. Ordered by `(counter, replica)` so ties
/// between replicas resolve the same way everywhere — used only to break
/// ties in the settlement-preference register, never to impose a global
/// causal order (the document doesn't need one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrdtOpId {
    pub counter: u64,
    pub replica: ReplicaId,
}

/// One row of the `entries` container: clear routing metadata plus an
/// opaque ciphertext blob. The plaintext entry fields never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    pub id: EntryId,
    pub key_version: u32,
    pub ciphertext: Vec<u8>,
    pub previous_version_id: Option<EntryId>,
    pub status: EntryRowStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryRowStatus {
    Active,
    Deleted,
}

/// One row of the `memberEvents` container. The event's own type tag and
/// type-specific fields travel as an opaque JSON value: the member-event
/// processor owns interpreting and validating them, the document only
/// needs `member_id`/`timestamp` for the replay order in §4.4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEventRow {
    pub id: MemberEventId,
    pub member_id: MemberId,
    pub actor_id: MemberId,
    pub timestamp: i64,
    pub kind: serde_json::Value,
}

/// The payload of a single CRDT operation, one per container kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrdtPayload {
    /// Insert into `entries`. Rows are never overwritten — a grow-only map.
    EntryPut(EntryRow),
    /// Append to `memberEvents`. Grow-only, ordered by `(timestamp, id)` at
    /// read time rather than insertion time.
    MemberEventAppend(MemberEventRow),
    /// Set one user's ordered list of preferred settlement recipients.
    /// Last-writer-wins: ties between concurrent writers resolve by
    /// `CrdtOpId` so every replica picks the same winner.
    PreferenceSet { member_id: MemberId, preferred_recipients: Vec<MemberId> },
    /// Append to the legacy `members` list, kept for back-compat per the
    /// data model; nothing in this crate reads it back out.
    LegacyMemberPut(serde_json::Value),
}

/// A stamped, self-contained operation. The unit of export/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrdtOp {
    pub id: CrdtOpId,
    pub payload: CrdtPayload,
}
