//! Identifier types.
//!
//! Sessions and turns are opaque UUIDs minted by the external front-end.
//! Entities, items, locations, and exits are addressed by
//! human-readable string keys assigned by the external stores
//! (`village_square`, `wooden_chest`, `to_tavern`) — the Grounding Manifest is
//! the core's only view onto that keyspace, so these are thin newtypes
//! around `String` rather than UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

define_uuid_id!(SessionId);
define_uuid_id!(TurnId);

macro_rules! define_string_key {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Key for an entity (NPC, player character, or creature) reachable this turn.
define_string_key!(EntityKey);
/// Key for an item, whether lying in a scene or sitting in someone's inventory.
define_string_key!(ItemKey);
/// Key for a location in the world graph.
define_string_key!(LocationKey);
/// Key for an exit out of the current location.
define_string_key!(ExitKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_displays_as_its_string() {
        let key = EntityKey::from("patron_1");
        assert_eq!(key.to_string(), "patron_1");
        assert_eq!(key.as_str(), "patron_1");
    }

    #[test]
    fn session_id_round_trips_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = SessionId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }
}
