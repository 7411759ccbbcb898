//! The activity feed: typed records derived from the entry chain and
//! member-event log, kept sorted newest-first (§4.7).

pub mod diff;
pub mod filter;
pub mod generate;
pub mod insert;
pub mod types;

pub use filter::{filter_activities, ActivityFilter};
pub use generate::{activity_for_entry, generate_entry_activities, generate_member_activities};
pub use insert::{insert_activity, sort_activities};
pub use types::{Activity, ActivityKind};
