//! Invitation and key rotation: invite links, join requests, and encrypted
//! key-package distribution on join (§4.10).

pub mod join;
pub mod link;

pub use join::{approve_join, build_group_keys_payload, import_group_keys, rotate_group_key, GroupKeyEntry, GroupKeysPayload, JoinRequest, KeyPackageRecipient};
pub use link::{build_invite_link, parse_invite_link, InviteLinkPayload};
