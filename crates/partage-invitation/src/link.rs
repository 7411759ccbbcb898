//! Invite-link encode/decode: `{origin}/join/{base64url(JSON(payload))}`.
//!
//! Inbound parsing also accepts the deprecated fragment-embedded-key
//! variant for backward compatibility (§9, Open Question); the key itself
//! is ignored on that path since key material now only ever arrives via
//! `keyPackages`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use partage_core::{GroupId, InvitationId, PartageError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteLinkPayload {
    pub invitation_id: InvitationId,
    pub group_id: GroupId,
    pub group_name: String,
}

/// Legacy payload shape from the fragment-embedded-key variant. Only
/// `invitation_id`/`group_id`/`group_name` are kept; `embedded_key` is
/// dropped on read.
#[derive(Debug, Clone, Deserialize)]
struct LegacyInviteLinkPayload {
    invitation_id: InvitationId,
    group_id: GroupId,
    group_name: String,
    #[serde(default)]
    #[allow(dead_code)]
    embedded_key: Option<String>,
}

pub fn build_invite_link(origin: &str, payload: &InviteLinkPayload) -> Result<String> {
    let json = serde_json::to_vec(payload).map_err(|e| PartageError::serialization(e.to_string()))?;
    let encoded = URL_SAFE_NO_PAD.encode(json);
    Ok(format!("{}/join/{}", origin.trim_end_matches('/'), encoded))
}

/// Parse either a full invite URL or a bare base64url blob.
pub fn parse_invite_link(input: &str) -> Result<InviteLinkPayload> {
    let blob = input.rsplit('/').next().unwrap_or(input);
    let bytes = URL_SAFE_NO_PAD
        .decode(blob)
        .map_err(|e| PartageError::invalid(format!("invite link is not valid base64url: {}", e)))?;

    if let Ok(payload) = serde_json::from_slice::<InviteLinkPayload>(&bytes) {
        return Ok(payload);
    }

    let legacy: LegacyInviteLinkPayload =
        serde_json::from_slice(&bytes).map_err(|e| PartageError::invalid(format!("malformed invite link payload: {}", e)))?;
    Ok(InviteLinkPayload { invitation_id: legacy.invitation_id, group_id: legacy.group_id, group_name: legacy.group_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_build_and_parse() {
        let payload = InviteLinkPayload { invitation_id: InvitationId::from("inv1"), group_id: GroupId::from("g1"), group_name: "Ski Trip".into() };
        let link = build_invite_link("https://partage.app", &payload).unwrap();
        let parsed = parse_invite_link(&link).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn accepts_legacy_fragment_payload_with_embedded_key() {
        let legacy = serde_json::json!({
            "invitation_id": "inv1",
            "group_id": "g1",
            "group_name": "Ski Trip",
            "embedded_key": "deadbeef",
        });
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&legacy).unwrap());
        let parsed = parse_invite_link(&encoded).unwrap();
        assert_eq!(parsed.group_name, "Ski Trip");
    }

    #[test]
    fn rejects_non_base64_input() {
        assert!(parse_invite_link("not base64!!").is_err());
    }
}
