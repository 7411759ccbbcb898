//! A filesystem-backed [`RelayClient`]: every "relay" endpoint is a file or
//! directory under `relay_dir`, shared by every replica that points at the
//! same directory. This is the relay server from §6 stood up without a
//! network stack — good enough for driving the CLI end to end and for
//! multi-replica demos on one machine; a real deployment swaps this for an
//! HTTP/WebSocket client behind the same trait.

use async_trait::async_trait;
use partage_core::{GroupId, MemberId, PartageError, Result};
use partage_sync::relay::{GroupSummary, InvitationRecord, JoinRequestEnvelope, JoinRequestStatus, UpdateEnvelope};
use partage_sync::RelayClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct LocalFsRelay {
    root: PathBuf,
}

impl LocalFsRelay {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn group_dir(&self, group_id: &GroupId) -> PathBuf {
        self.root.join("groups").join(group_id.as_str())
    }

    fn updates_dir(&self, group_id: &GroupId) -> PathBuf {
        self.group_dir(group_id).join("updates")
    }

    fn key_packages_dir(&self, recipient_hash: &str) -> PathBuf {
        self.root.join("key_packages").join(recipient_hash)
    }

    async fn ensure_dir(path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await.map_err(|e| PartageError::relay_error(e.to_string()))
    }

    fn cursor_of(sequence: u64) -> Vec<u8> {
        bincode::serialize(&sequence).expect("u64 always serializes")
    }

    fn sequence_of(cursor: &[u8]) -> u64 {
        if cursor.is_empty() {
            0
        } else {
            bincode::deserialize(cursor).unwrap_or(0)
        }
    }
}

#[async_trait]
impl RelayClient for LocalFsRelay {
    async fn create_group(&self, group: GroupSummary) -> Result<()> {
        Self::ensure_dir(&self.group_dir(&group.id)).await?;
        let path = self.group_dir(&group.id).join("info.json");
        let contents = serde_json::to_string_pretty(&group)?;
        tokio::fs::write(path, contents).await.map_err(|e| PartageError::relay_error(e.to_string()))
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<Option<GroupSummary>> {
        let path = self.group_dir(group_id).join("info.json");
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(_) => Ok(None),
        }
    }

    async fn push_update(&self, group_id: &GroupId, author_id: &MemberId, bytes: Vec<u8>, _base_version: Option<Vec<u8>>) -> Result<()> {
        let dir = self.updates_dir(group_id);
        Self::ensure_dir(&dir).await?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| PartageError::relay_error(e.to_string()))?;
        let mut next_sequence = 0u64;
        while let Some(entry) = entries.next_entry().await.map_err(|e| PartageError::relay_error(e.to_string()))? {
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(seq) = name.trim_end_matches(".update").parse::<u64>() {
                    next_sequence = next_sequence.max(seq + 1);
                }
            }
        }
        let envelope = UpdateEnvelope { group_id: group_id.clone(), author_id: author_id.clone(), bytes, cursor: Self::cursor_of(next_sequence + 1) };
        let path = dir.join(format!("{:020}.update", next_sequence));
        let contents = bincode::serialize(&envelope).map_err(|e| PartageError::serialization(e.to_string()))?;
        tokio::fs::write(path, contents).await.map_err(|e| PartageError::relay_error(e.to_string()))
    }

    async fn pull_updates_since(&self, group_id: &GroupId, cursor: Vec<u8>) -> Result<Vec<UpdateEnvelope>> {
        let since = Self::sequence_of(&cursor);
        let dir = self.updates_dir(group_id);
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| PartageError::relay_error(e.to_string()))? {
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(seq) = name.trim_end_matches(".update").parse::<u64>() else { continue };
            if seq < since {
                continue;
            }
            let bytes = tokio::fs::read(entry.path()).await.map_err(|e| PartageError::relay_error(e.to_string()))?;
            let envelope: UpdateEnvelope = bincode::deserialize(&bytes).map_err(|e| PartageError::serialization(e.to_string()))?;
            out.push(envelope);
        }
        out.sort_by_key(|e| Self::sequence_of(&e.cursor));
        Ok(out)
    }

    async fn subscribe_updates(&self, group_id: &GroupId) -> Result<mpsc::Receiver<UpdateEnvelope>> {
        let (tx, rx) = mpsc::channel(64);
        let dir = self.updates_dir(group_id);
        tokio::spawn(async move {
            let mut seen = std::collections::HashSet::new();
            loop {
                if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
                    while let Ok(Some(entry)) = entries.next_entry().await {
                        let name = entry.file_name().to_string_lossy().to_string();
                        if seen.contains(&name) {
                            continue;
                        }
                        if let Ok(bytes) = tokio::fs::read(entry.path()).await {
                            if let Ok(envelope) = bincode::deserialize::<UpdateEnvelope>(&bytes) {
                                seen.insert(name);
                                if tx.send(envelope).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });
        Ok(rx)
    }

    async fn create_invitation(&self, invitation: InvitationRecord) -> Result<()> {
        let dir = self.root.join("invitations");
        Self::ensure_dir(&dir).await?;
        let path = dir.join(format!("{}.json", invitation.id.as_str()));
        let contents = serde_json::to_string_pretty(&invitation)?;
        tokio::fs::write(path, contents).await.map_err(|e| PartageError::relay_error(e.to_string()))
    }

    async fn post_join_request(&self, request: partage_invitation::JoinRequest) -> Result<String> {
        let dir = self.root.join("join_requests");
        Self::ensure_dir(&dir).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let envelope = JoinRequestEnvelope { id: id.clone(), status: JoinRequestStatus::Pending, request };
        let path = dir.join(format!("{}.json", id));
        let contents = serde_json::to_string_pretty(&envelope)?;
        tokio::fs::write(path, contents).await.map_err(|e| PartageError::relay_error(e.to_string()))?;
        Ok(id)
    }

    async fn list_join_requests(&self, group_id: &GroupId, status: JoinRequestStatus) -> Result<Vec<JoinRequestEnvelope>> {
        let dir = self.root.join("join_requests");
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| PartageError::relay_error(e.to_string()))? {
            let Ok(contents) = tokio::fs::read_to_string(entry.path()).await else { continue };
            let Ok(envelope) = serde_json::from_str::<JoinRequestEnvelope>(&contents) else { continue };
            if envelope.request.group_id == *group_id && envelope.status == status {
                out.push(envelope);
            }
        }
        Ok(out)
    }

    async fn approve_join_request(&self, join_request_id: &str) -> Result<()> {
        let path = self.root.join("join_requests").join(format!("{}.json", join_request_id));
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| PartageError::relay_error(e.to_string()))?;
        let mut envelope: JoinRequestEnvelope = serde_json::from_str(&contents)?;
        envelope.status = JoinRequestStatus::Approved;
        tokio::fs::write(&path, serde_json::to_string_pretty(&envelope)?).await.map_err(|e| PartageError::relay_error(e.to_string()))
    }

    async fn create_key_package(&self, recipient_hash: &str, package: partage_crypto::KeyPackage) -> Result<()> {
        let dir = self.key_packages_dir(recipient_hash);
        Self::ensure_dir(&dir).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let contents = serde_json::to_string_pretty(&package)?;
        tokio::fs::write(dir.join(format!("{}.json", id)), contents).await.map_err(|e| PartageError::relay_error(e.to_string()))
    }

    async fn subscribe_key_packages(&self, recipient_hash: &str) -> Result<mpsc::Receiver<partage_crypto::KeyPackage>> {
        let (tx, rx) = mpsc::channel(16);
        let dir = self.key_packages_dir(recipient_hash);
        tokio::spawn(async move {
            let mut seen = std::collections::HashSet::new();
            loop {
                if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
                    while let Ok(Some(entry)) = entries.next_entry().await {
                        let name = entry.file_name().to_string_lossy().to_string();
                        if seen.contains(&name) {
                            continue;
                        }
                        if let Ok(contents) = tokio::fs::read_to_string(entry.path()).await {
                            if let Ok(package) = serde_json::from_str::<partage_crypto::KeyPackage>(&contents) {
                                seen.insert(name);
                                if tx.send(package).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });
        Ok(rx)
    }
}
