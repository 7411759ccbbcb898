//! The persistence facade contract. One async trait so the core never
//! depends on a concrete storage backend; `MemoryStorage` below is the
//! reference implementation used by tests and the CLI shell.

use crate::schema::{GroupKeyRecord, GroupRecord, IdentityRecord, IncrementalUpdateRecord, PendingOperationRecord, SnapshotRecord, UsageStats};
use async_trait::async_trait;
use partage_core::Result;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_identity(&self) -> Result<Option<IdentityRecord>>;
    async fn put_identity(&self, identity: IdentityRecord) -> Result<()>;

    async fn get_group(&self, group_id: &str) -> Result<Option<GroupRecord>>;
    async fn list_groups(&self) -> Result<Vec<GroupRecord>>;
    async fn put_group(&self, group: GroupRecord) -> Result<()>;

    async fn get_group_keys(&self, group_id: &str) -> Result<Vec<GroupKeyRecord>>;
    async fn put_group_key(&self, key: GroupKeyRecord) -> Result<()>;

    async fn get_snapshot(&self, group_id: &str) -> Result<Option<SnapshotRecord>>;
    async fn put_snapshot(&self, snapshot: SnapshotRecord) -> Result<()>;

    /// Updates at or after `since_sequence`, ordered by sequence.
    async fn get_incremental_updates(&self, group_id: &str, since_sequence: u64) -> Result<Vec<IncrementalUpdateRecord>>;
    async fn append_incremental_update(&self, update: IncrementalUpdateRecord) -> Result<()>;

    async fn get_pending_operations(&self, group_id: &str) -> Result<Vec<PendingOperationRecord>>;
    /// Atomically clears and replaces the pending-op queue for one group.
    async fn replace_pending_operations(&self, group_id: &str, operations: Vec<PendingOperationRecord>) -> Result<()>;

    /// Atomically removes the group record, its keys, snapshot, incremental
    /// updates, and pending operations.
    async fn delete_group(&self, group_id: &str) -> Result<()>;

    async fn get_usage_stats(&self) -> Result<UsageStats>;
    async fn put_usage_stats(&self, stats: UsageStats) -> Result<()>;
}
