//! Persistence facade: key/value stores for identity, groups, group keys,
//! snapshots, incremental updates, and pending operations (§6).

pub mod memory;
pub mod schema;
pub mod traits;

pub use memory::MemoryStorage;
pub use schema::{
    GroupKeyRecord, GroupRecord, GroupSettings, IdentityRecord, IncrementalUpdateRecord, PendingOperationRecord, SnapshotRecord, UsageStats,
};
pub use traits::Storage;
