//! The sync manager (§4.9): owns one group's CRDT doc and derived state,
//! drives initial/incremental sync against a [`RelayClient`], and queues
//! pushes that fail while offline for retry with backoff.

use crate::backoff::BackoffPolicy;
use crate::relay::{RelayClient, UpdateEnvelope};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use partage_core::{GroupId, MemberId, PartageError, Result, VersionVector};
use partage_crdt::CrdtDocument;
use partage_entries::KeyRing;
use partage_state::{initialize, GroupState};
use partage_storage::{PendingOperationRecord, SnapshotRecord, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
struct PendingPush {
    bytes_base64: String,
    base_version_base64: Option<String>,
}

struct Inner {
    doc: CrdtDocument,
    keyring: KeyRing,
    state: GroupState,
    cursor: Vec<u8>,
    sync_state: SyncState,
}

/// One group's live sync session. `group_id`/`author_id` identify who we
/// push as; `doc`/`state`/`keyring` are the single in-memory owner of this
/// group's replicated data for as long as this manager is alive (§5).
pub struct SyncManager<R: RelayClient> {
    relay: Arc<R>,
    storage: Arc<dyn Storage>,
    group_id: GroupId,
    author_id: MemberId,
    backoff: BackoffPolicy,
    inner: Mutex<Inner>,
}

impl<R: RelayClient> SyncManager<R> {
    pub fn new(relay: Arc<R>, storage: Arc<dyn Storage>, group_id: GroupId, author_id: MemberId, doc: CrdtDocument, keyring: KeyRing) -> Self {
        let state = initialize(&doc, &keyring);
        Self {
            relay,
            storage,
            group_id,
            author_id,
            backoff: BackoffPolicy::default(),
            inner: Mutex::new(Inner { doc, keyring, state, cursor: Vec::new(), sync_state: SyncState::Idle }),
        }
    }

    pub async fn state(&self) -> SyncState {
        self.inner.lock().await.sync_state
    }

    /// Run `f` against the current derived state under the manager's lock.
    pub async fn with_state<T>(&self, f: impl FnOnce(&GroupState) -> T) -> T {
        let inner = self.inner.lock().await;
        f(&inner.state)
    }

    /// Pull everything since cursor zero, import it, persist a snapshot.
    /// Run once when a group is first opened on this device (§4.9).
    pub async fn initial_sync(&self) -> Result<()> {
        self.sync_since(Vec::new()).await
    }

    /// Pull since the last persisted cursor and import; idempotent and
    /// order-independent because the CRDT doc is commutative (§4.9).
    pub async fn incremental_sync(&self) -> Result<()> {
        let cursor = self.inner.lock().await.cursor.clone();
        self.sync_since(cursor).await
    }

    async fn sync_since(&self, cursor: Vec<u8>) -> Result<()> {
        self.set_sync_state(SyncState::Syncing).await;

        let result = self.relay.pull_updates_since(&self.group_id, cursor).await;
        let updates = match result {
            Ok(updates) => updates,
            Err(err) => {
                self.set_sync_state(SyncState::Error).await;
                return Err(err);
            }
        };

        let mut inner = self.inner.lock().await;
        for update in &updates {
            inner.doc.import(&update.bytes)?;
        }
        if let Some(last) = updates.last() {
            inner.cursor = last.cursor.clone();
        }
        let doc_snapshot = inner.doc.export_snapshot()?;
        let version_bytes = bincode::serialize(&inner.doc.version()).map_err(|e| PartageError::serialization(e.to_string()))?;
        let (doc_ref, keyring_ref, state_ref) = (&inner.doc, &inner.keyring, &mut inner.state);
        state_ref.handle_update(doc_ref, keyring_ref);
        drop(inner);

        self.storage
            .put_snapshot(SnapshotRecord { group_id: self.group_id.as_str().to_string(), snapshot_bytes: doc_snapshot, version: version_bytes, updated_at: 0 })
            .await?;

        self.set_sync_state(SyncState::Idle).await;
        Ok(())
    }

    /// Apply a local mutation (through `mutate`, which gets exclusive access
    /// to the doc and keyring), then push the resulting delta. On push
    /// failure the delta is queued for later retry rather than lost.
    pub async fn apply_and_push(&self, mutate: impl FnOnce(&mut CrdtDocument, &KeyRing) -> Result<()>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let version_before = inner.doc.version();
        mutate(&mut inner.doc, &inner.keyring)?;
        let delta = inner.doc.export_from(&version_before)?;
        let (doc_ref, keyring_ref, state_ref) = (&inner.doc, &inner.keyring, &mut inner.state);
        state_ref.handle_update(doc_ref, keyring_ref);
        drop(inner);

        let base_version = bincode::serialize(&version_before).map_err(|e| PartageError::serialization(e.to_string()))?;
        self.push_or_enqueue(delta, base_version).await
    }

    async fn push_or_enqueue(&self, delta: Vec<u8>, base_version: Vec<u8>) -> Result<()> {
        match self.relay.push_update(&self.group_id, &self.author_id, delta.clone(), Some(base_version.clone())).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(group_id = %self.group_id, error = %err, "push failed, queuing for retry");
                self.enqueue_pending(delta, base_version).await?;
                Ok(())
            }
        }
    }

    async fn enqueue_pending(&self, bytes: Vec<u8>, base_version: Vec<u8>) -> Result<()> {
        let payload = PendingPush { bytes_base64: BASE64.encode(bytes), base_version_base64: Some(BASE64.encode(base_version)) };
        let operation_json = serde_json::to_string(&payload).map_err(|e| PartageError::serialization(e.to_string()))?;
        let mut operations = self.storage.get_pending_operations(self.group_id.as_str()).await?;
        operations.push(PendingOperationRecord { id: uuid::Uuid::new_v4().to_string(), group_id: self.group_id.as_str().to_string(), operation_json, created_at: 0 });
        self.storage.replace_pending_operations(self.group_id.as_str(), operations).await
    }

    /// Retry every queued push with exponential backoff. Operations are
    /// idempotent CRDT deltas, so replaying one that already landed is
    /// harmless (§5: "no hard cap ... operations are idempotent").
    pub async fn flush_pending(&self) -> Result<()> {
        let operations = self.storage.get_pending_operations(self.group_id.as_str()).await?;
        let mut remaining = Vec::new();
        let mut attempt = 0;

        for op in operations {
            let payload: PendingPush = serde_json::from_str(&op.operation_json).map_err(|e| PartageError::serialization(e.to_string()))?;
            let bytes = BASE64.decode(&payload.bytes_base64).map_err(|e| PartageError::invalid(e.to_string()))?;
            let base_version = payload.base_version_base64.as_deref().map(|s| BASE64.decode(s)).transpose().map_err(|e| PartageError::invalid(e.to_string()))?;

            match self.relay.push_update(&self.group_id, &self.author_id, bytes, base_version).await {
                Ok(()) => {}
                Err(_) => {
                    tokio::time::sleep(self.backoff.delay_for(attempt)).await;
                    attempt += 1;
                    remaining.push(op);
                }
            }
        }

        self.storage.replace_pending_operations(self.group_id.as_str(), remaining).await
    }

    /// Import one inbound delta from a live subscription and fold it into
    /// derived state; the caller owns pumping the subscription stream.
    pub async fn handle_inbound(&self, update: UpdateEnvelope) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.doc.import(&update.bytes)?;
        inner.cursor = update.cursor;
        let (doc_ref, keyring_ref, state_ref) = (&inner.doc, &inner.keyring, &mut inner.state);
        state_ref.handle_update(doc_ref, keyring_ref);
        Ok(())
    }

    /// Full snapshot bytes plus the bincode-encoded version vector, for the
    /// caller to persist after a local mutation.
    pub async fn snapshot_and_version(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let inner = self.inner.lock().await;
        let snapshot = inner.doc.export_snapshot()?;
        let version = bincode::serialize(&inner.doc.version()).map_err(|e| PartageError::serialization(e.to_string()))?;
        Ok((snapshot, version))
    }

    /// All group keys as `(version, raw key bytes)`, for the caller to
    /// persist into the `groupKeys` store.
    pub async fn keyring_entries(&self) -> Vec<(u32, [u8; 32])> {
        let inner = self.inner.lock().await;
        (1..=inner.keyring.current_version()).filter_map(|v| inner.keyring.get(v).map(|k| (v, k.0))).collect()
    }

    pub async fn cursor(&self) -> Vec<u8> {
        self.inner.lock().await.cursor.clone()
    }

    pub async fn version(&self) -> VersionVector {
        self.inner.lock().await.doc.version()
    }

    async fn set_sync_state(&self, state: SyncState) {
        self.inner.lock().await.sync_state = state;
    }
}
