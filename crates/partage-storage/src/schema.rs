//! Logical persistence schema (§6). Storage-agnostic: an implementation may
//! back these with IndexedDB, SQLite, or anything else — this crate only
//! fixes the shape and the facade contract in [`crate::Storage`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub public_key: String,
    pub private_key: String,
    pub public_key_hash: String,
    pub signing_public_key: String,
    pub signing_private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSettings {
    pub anyone_can_add_entries: bool,
    pub anyone_can_modify_entries: bool,
    pub anyone_can_delete_entries: bool,
    pub anyone_can_invite: bool,
    pub anyone_can_share_keys: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub default_currency: String,
    pub created_at: i64,
    pub created_by: String,
    pub current_key_version: u32,
    pub settings: GroupSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupKeyRecord {
    pub group_id: String,
    pub version: u32,
    pub key_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub group_id: String,
    pub snapshot_bytes: Vec<u8>,
    pub version: Vec<u8>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalUpdateRecord {
    pub group_id: String,
    pub update_data: Vec<u8>,
    pub version: Vec<u8>,
    pub timestamp: i64,
    pub sequence: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperationRecord {
    pub id: String,
    pub group_id: String,
    pub operation_json: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_bytes_transferred: u64,
    pub tracking_since: Option<i64>,
    pub last_storage_estimate_timestamp: Option<i64>,
    pub last_storage_estimate_size_bytes: Option<u64>,
    pub total_storage_cost: f64,
}
