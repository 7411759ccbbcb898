use partage_core::{EntryId, MemberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivityKind {
    EntryAdded { entry_id: EntryId },
    EntryModified { entry_id: EntryId, changes: BTreeMap<String, (serde_json::Value, serde_json::Value)> },
    EntryDeleted { entry_id: EntryId, reason: Option<String> },
    EntryUndeleted { entry_id: EntryId },
    MemberJoined { member_id: MemberId },
    MemberRenamed { member_id: MemberId, previous_name: String, new_name: String },
    MemberRetired { member_id: MemberId },
    MemberLinked { old_member_id: MemberId, new_member_id: MemberId },
}

impl ActivityKind {
    pub fn entry_id(&self) -> Option<&EntryId> {
        match self {
            Self::EntryAdded { entry_id } | Self::EntryModified { entry_id, .. } | Self::EntryDeleted { entry_id, .. } | Self::EntryUndeleted { entry_id } => {
                Some(entry_id)
            }
            _ => None,
        }
    }

    pub fn member_id(&self) -> Option<&MemberId> {
        match self {
            Self::MemberJoined { member_id } | Self::MemberRenamed { member_id, .. } | Self::MemberRetired { member_id } => Some(member_id),
            Self::MemberLinked { old_member_id, .. } => Some(old_member_id),
            _ => None,
        }
    }

    /// The short discriminant name used for type-set filtering.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::EntryAdded { .. } => "entry_added",
            Self::EntryModified { .. } => "entry_modified",
            Self::EntryDeleted { .. } => "entry_deleted",
            Self::EntryUndeleted { .. } => "entry_undeleted",
            Self::MemberJoined { .. } => "member_joined",
            Self::MemberRenamed { .. } => "member_renamed",
            Self::MemberRetired { .. } => "member_retired",
            Self::MemberLinked { .. } => "member_linked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub timestamp: i64,
    pub actor_id: MemberId,
    pub kind: ActivityKind,
}
