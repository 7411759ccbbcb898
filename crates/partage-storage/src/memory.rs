//! In-memory reference implementation of [`Storage`]. Every method takes
//! the single mutex so cross-store deletes and the pending-op replace are
//! trivially atomic, matching the transactional-write requirement in §5.

use crate::schema::{GroupKeyRecord, GroupRecord, IdentityRecord, IncrementalUpdateRecord, PendingOperationRecord, SnapshotRecord, UsageStats};
use crate::traits::Storage;
use async_trait::async_trait;
use partage_core::Result;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    identity: Option<IdentityRecord>,
    groups: HashMap<String, GroupRecord>,
    group_keys: HashMap<String, Vec<GroupKeyRecord>>,
    snapshots: HashMap<String, SnapshotRecord>,
    incremental_updates: HashMap<String, Vec<IncrementalUpdateRecord>>,
    pending_operations: HashMap<String, Vec<PendingOperationRecord>>,
    usage_stats: UsageStats,
}

pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_identity(&self) -> Result<Option<IdentityRecord>> {
        Ok(self.inner.lock().await.identity.clone())
    }

    async fn put_identity(&self, identity: IdentityRecord) -> Result<()> {
        self.inner.lock().await.identity = Some(identity);
        Ok(())
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<GroupRecord>> {
        Ok(self.inner.lock().await.groups.get(group_id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        Ok(self.inner.lock().await.groups.values().cloned().collect())
    }

    async fn put_group(&self, group: GroupRecord) -> Result<()> {
        self.inner.lock().await.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn get_group_keys(&self, group_id: &str) -> Result<Vec<GroupKeyRecord>> {
        Ok(self.inner.lock().await.group_keys.get(group_id).cloned().unwrap_or_default())
    }

    async fn put_group_key(&self, key: GroupKeyRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let versions = inner.group_keys.entry(key.group_id.clone()).or_default();
        versions.retain(|existing| existing.version != key.version);
        versions.push(key);
        Ok(())
    }

    async fn get_snapshot(&self, group_id: &str) -> Result<Option<SnapshotRecord>> {
        Ok(self.inner.lock().await.snapshots.get(group_id).cloned())
    }

    async fn put_snapshot(&self, snapshot: SnapshotRecord) -> Result<()> {
        self.inner.lock().await.snapshots.insert(snapshot.group_id.clone(), snapshot);
        Ok(())
    }

    async fn get_incremental_updates(&self, group_id: &str, since_sequence: u64) -> Result<Vec<IncrementalUpdateRecord>> {
        let inner = self.inner.lock().await;
        let mut updates: Vec<IncrementalUpdateRecord> = inner
            .incremental_updates
            .get(group_id)
            .map(|updates| updates.iter().filter(|u| u.sequence >= since_sequence).cloned().collect())
            .unwrap_or_default();
        updates.sort_by_key(|u| u.sequence);
        Ok(updates)
    }

    async fn append_incremental_update(&self, update: IncrementalUpdateRecord) -> Result<()> {
        self.inner.lock().await.incremental_updates.entry(update.group_id.clone()).or_default().push(update);
        Ok(())
    }

    async fn get_pending_operations(&self, group_id: &str) -> Result<Vec<PendingOperationRecord>> {
        Ok(self.inner.lock().await.pending_operations.get(group_id).cloned().unwrap_or_default())
    }

    async fn replace_pending_operations(&self, group_id: &str, operations: Vec<PendingOperationRecord>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if operations.is_empty() {
            inner.pending_operations.remove(group_id);
        } else {
            inner.pending_operations.insert(group_id.to_string(), operations);
        }
        Ok(())
    }

    async fn delete_group(&self, group_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.groups.remove(group_id);
        inner.group_keys.remove(group_id);
        inner.snapshots.remove(group_id);
        inner.incremental_updates.remove(group_id);
        inner.pending_operations.remove(group_id);
        Ok(())
    }

    async fn get_usage_stats(&self) -> Result<UsageStats> {
        Ok(self.inner.lock().await.usage_stats.clone())
    }

    async fn put_usage_stats(&self, stats: UsageStats) -> Result<()> {
        self.inner.lock().await.usage_stats = stats;
        Ok(())
    }
}
