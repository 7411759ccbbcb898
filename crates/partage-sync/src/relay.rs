//! The relay contract (§4.9, §6). Opaque to the core: the relay only ever
//! sees ciphertext, signatures, and routing metadata, never plaintext
//! entries or keys.

use async_trait::async_trait;
use partage_core::{GroupId, InvitationId, MemberId, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub default_currency: String,
    pub created_at: i64,
    pub created_by: MemberId,
}

/// One CRDT delta as it travels over the wire: author-attributed ciphertext
/// bytes plus the opaque cursor the relay assigns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    pub group_id: GroupId,
    pub author_id: MemberId,
    pub bytes: Vec<u8>,
    pub cursor: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinRequestStatus {
    Pending,
    Approved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationRecord {
    pub id: InvitationId,
    pub group_id: GroupId,
    pub group_name: String,
    pub expires_at: Option<i64>,
    pub max_uses: Option<u32>,
    pub used_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequestEnvelope {
    pub id: String,
    pub status: JoinRequestStatus,
    pub request: partage_invitation::JoinRequest,
}

/// Everything the sync manager and invitation flow need from the relay.
/// Endpoints map onto §6's wire protocol one-to-one; this is the only
/// network-shaped seam in the whole crate — every implementation besides
/// [`crate::memory::InMemoryRelay`] lives outside this workspace.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn create_group(&self, group: GroupSummary) -> Result<()>;
    async fn get_group(&self, group_id: &GroupId) -> Result<Option<GroupSummary>>;

    /// `base_version` lets the relay linearize concurrent pushes from the
    /// same author; omit it for the author's first push to a group.
    async fn push_update(&self, group_id: &GroupId, author_id: &MemberId, bytes: Vec<u8>, base_version: Option<Vec<u8>>) -> Result<()>;
    async fn pull_updates_since(&self, group_id: &GroupId, cursor: Vec<u8>) -> Result<Vec<UpdateEnvelope>>;
    async fn subscribe_updates(&self, group_id: &GroupId) -> Result<mpsc::Receiver<UpdateEnvelope>>;

    async fn create_invitation(&self, invitation: InvitationRecord) -> Result<()>;
    async fn post_join_request(&self, request: partage_invitation::JoinRequest) -> Result<String>;
    async fn list_join_requests(&self, group_id: &GroupId, status: JoinRequestStatus) -> Result<Vec<JoinRequestEnvelope>>;
    async fn approve_join_request(&self, join_request_id: &str) -> Result<()>;

    async fn create_key_package(&self, recipient_hash: &str, package: partage_crypto::KeyPackage) -> Result<()>;
    async fn subscribe_key_packages(&self, recipient_hash: &str) -> Result<mpsc::Receiver<partage_crypto::KeyPackage>>;
}
