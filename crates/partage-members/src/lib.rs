//! Member lifecycle: deriving current member state and a canonical-id alias
//! map from the append-only, immutable member-event log.

pub mod canonical;
pub mod event;
pub mod state;

pub use canonical::{build_canonical_id_map, resolve_canonical};
pub use event::{sorted_events, MemberEvent, MemberEventKind};
pub use state::{compute_member_states, MemberState};
