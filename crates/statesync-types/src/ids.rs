//! Identifier newtypes used across the service.
//!
//! Tokens and entity ids are both strings on the wire. They are wrapped
//! in distinct types so a token can never be passed where an entity id is
//! expected.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a transparent newtype wrapper around [`String`].
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl core::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id! {
    /// Opaque identifier issued to a client on connect.
    ///
    /// The token is the sole basis for authorization. The server mints
    /// tokens from random UUIDs, but any string is accepted on the wire;
    /// an unrecognized value is simply an unknown client.
    ClientToken
}

define_string_id! {
    /// Caller-chosen identifier of an entity. Unique within the store.
    EntityId
}

define_string_id! {
    /// Category a client declares for itself when connecting.
    ///
    /// The service echoes it back in presence events and never
    /// interprets it.
    ClientType
}

impl ClientToken {
    /// Mint a fresh token from a random (v4) UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl EntityId {
    /// Whether the id is usable as a store key.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_distinct() {
        let a = ClientToken::generate();
        let b = ClientToken::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = EntityId::from("ship-1");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"ship-1\""));
    }

    #[test]
    fn blank_entity_id_is_invalid() {
        assert!(!EntityId::from("  ").is_valid());
        assert!(EntityId::from("e1").is_valid());
    }
}
