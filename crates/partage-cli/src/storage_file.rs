//! A [`Storage`] implementation that persists the whole logical schema as
//! one JSON document on disk. Simple rather than fast: every mutation
//! rewrites the file, which is fine for a single local CLI replica and
//! keeps this crate free of an embedded-database dependency the rest of
//! the workspace doesn't otherwise need.

use async_trait::async_trait;
use partage_core::Result;
use partage_storage::{GroupKeyRecord, GroupRecord, IdentityRecord, IncrementalUpdateRecord, PendingOperationRecord, SnapshotRecord, Storage, UsageStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    identity: Option<IdentityRecord>,
    groups: HashMap<String, GroupRecord>,
    group_keys: HashMap<String, Vec<GroupKeyRecord>>,
    snapshots: HashMap<String, SnapshotRecord>,
    incremental_updates: HashMap<String, Vec<IncrementalUpdateRecord>>,
    pending_operations: HashMap<String, Vec<PendingOperationRecord>>,
    usage_stats: UsageStats,
}

pub struct FileStorage {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl FileStorage {
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let doc = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Document::default(),
        };
        Ok(Self { path, doc: Mutex::new(doc) })
    }

    async fn persist(&self, doc: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_identity(&self) -> Result<Option<IdentityRecord>> {
        Ok(self.doc.lock().await.identity.clone())
    }

    async fn put_identity(&self, identity: IdentityRecord) -> Result<()> {
        let mut doc = self.doc.lock().await;
        doc.identity = Some(identity);
        self.persist(&doc).await
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<GroupRecord>> {
        Ok(self.doc.lock().await.groups.get(group_id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        Ok(self.doc.lock().await.groups.values().cloned().collect())
    }

    async fn put_group(&self, group: GroupRecord) -> Result<()> {
        let mut doc = self.doc.lock().await;
        doc.groups.insert(group.id.clone(), group);
        self.persist(&doc).await
    }

    async fn get_group_keys(&self, group_id: &str) -> Result<Vec<GroupKeyRecord>> {
        Ok(self.doc.lock().await.group_keys.get(group_id).cloned().unwrap_or_default())
    }

    async fn put_group_key(&self, key: GroupKeyRecord) -> Result<()> {
        let mut doc = self.doc.lock().await;
        let versions = doc.group_keys.entry(key.group_id.clone()).or_default();
        versions.retain(|existing| existing.version != key.version);
        versions.push(key);
        self.persist(&doc).await
    }

    async fn get_snapshot(&self, group_id: &str) -> Result<Option<SnapshotRecord>> {
        Ok(self.doc.lock().await.snapshots.get(group_id).cloned())
    }

    async fn put_snapshot(&self, snapshot: SnapshotRecord) -> Result<()> {
        let mut doc = self.doc.lock().await;
        doc.snapshots.insert(snapshot.group_id.clone(), snapshot);
        self.persist(&doc).await
    }

    async fn get_incremental_updates(&self, group_id: &str, since_sequence: u64) -> Result<Vec<IncrementalUpdateRecord>> {
        let doc = self.doc.lock().await;
        let mut updates: Vec<IncrementalUpdateRecord> =
            doc.incremental_updates.get(group_id).map(|u| u.iter().filter(|u| u.sequence >= since_sequence).cloned().collect()).unwrap_or_default();
        updates.sort_by_key(|u| u.sequence);
        Ok(updates)
    }

    async fn append_incremental_update(&self, update: IncrementalUpdateRecord) -> Result<()> {
        let mut doc = self.doc.lock().await;
        doc.incremental_updates.entry(update.group_id.clone()).or_default().push(update);
        self.persist(&doc).await
    }

    async fn get_pending_operations(&self, group_id: &str) -> Result<Vec<PendingOperationRecord>> {
        Ok(self.doc.lock().await.pending_operations.get(group_id).cloned().unwrap_or_default())
    }

    async fn replace_pending_operations(&self, group_id: &str, operations: Vec<PendingOperationRecord>) -> Result<()> {
        let mut doc = self.doc.lock().await;
        if operations.is_empty() {
            doc.pending_operations.remove(group_id);
        } else {
            doc.pending_operations.insert(group_id.to_string(), operations);
        }
        self.persist(&doc).await
    }

    async fn delete_group(&self, group_id: &str) -> Result<()> {
        let mut doc = self.doc.lock().await;
        doc.groups.remove(group_id);
        doc.group_keys.remove(group_id);
        doc.snapshots.remove(group_id);
        doc.incremental_updates.remove(group_id);
        doc.pending_operations.remove(group_id);
        self.persist(&doc).await
    }

    async fn get_usage_stats(&self) -> Result<UsageStats> {
        Ok(self.doc.lock().await.usage_stats.clone())
    }

    async fn put_usage_stats(&self, stats: UsageStats) -> Result<()> {
        let mut doc = self.doc.lock().await;
        doc.usage_stats = stats;
        self.persist(&doc).await
    }
}
