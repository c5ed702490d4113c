//! Entity and presence records exchanged with clients.
//!
//! A [`EntitySnapshot`] is the projection of one stored entity: it is
//! what `FullLoad` returns and what the state stream pushes each tick.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ClientToken, ClientType, EntityId};

/// One named data slot of an entity.
///
/// `data` is owned by the client and never interpreted by the service.
/// Only the client holding `authoritative_owner` may replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MemberState {
    /// Member name, unique within its entity.
    pub name: String,
    /// Opaque payload.
    pub data: Vec<u8>,
    /// Token of the only client allowed to write `data`.
    pub authoritative_owner: ClientToken,
}

/// Point-in-time projection of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntitySnapshot {
    /// Entity identifier.
    pub id: EntityId,
    /// Opaque classification string.
    pub prefab_name: String,
    /// Members in creation order.
    pub members: Vec<MemberState>,
}

impl EntitySnapshot {
    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberState> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// A single member write inside an update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MemberEdit {
    /// Name of the member to overwrite.
    pub member_name: String,
    /// Replacement payload.
    pub data: Vec<u8>,
}

/// Notification that a client has connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PresenceEvent {
    /// Token issued to the new client.
    pub token: ClientToken,
    /// Category the client declared.
    #[serde(rename = "type")]
    pub client_type: ClientType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_event_uses_type_key() {
        let event = PresenceEvent {
            token: ClientToken::from("t1"),
            client_type: ClientType::from("unity"),
        };
        let json = serde_json::to_value(&event).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({"token": "t1", "type": "unity"}))
        );
    }

    #[test]
    fn member_lookup_by_name() {
        let snapshot = EntitySnapshot {
            id: EntityId::from("e1"),
            prefab_name: String::from("ship"),
            members: vec![MemberState {
                name: String::from("hp"),
                data: b"100".to_vec(),
                authoritative_owner: ClientToken::from("t1"),
            }],
        };
        assert_eq!(
            snapshot.member("hp").map(|m| m.data.as_slice()),
            Some(&b"100"[..])
        );
        assert!(snapshot.member("shield").is_none());
    }
}
