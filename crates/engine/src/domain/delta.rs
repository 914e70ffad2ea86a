//! `StateDelta`: the tagged sum type of atomic world mutations an LLM branch
//! proposes, one variant per delta kind. Uses closed enum types for need
//! names, entity kinds, and fact categories rather than bare strings.

use branchloom_domain::{AttitudeDimension, EntityKey, EntityKind, FactCategory, ItemKey, LocationKey, NeedKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StateDelta {
    #[serde(rename = "CREATE_ENTITY")]
    CreateEntity {
        entity_key: EntityKey,
        entity_type: EntityKind,
        display_name: String,
        parent_key: Option<EntityKey>,
    },

    #[serde(rename = "UPDATE_LOCATION")]
    UpdateLocation {
        subject_key: EntityKey,
        destination_key: LocationKey,
    },

    #[serde(rename = "TRANSFER_ITEM")]
    TransferItem {
        from_entity_key: EntityKey,
        to_entity_key: EntityKey,
        item_key: ItemKey,
        quantity: u32,
    },

    #[serde(rename = "UPDATE_NEED")]
    UpdateNeed {
        subject_key: EntityKey,
        need: NeedKind,
        delta: i32,
    },

    #[serde(rename = "UPDATE_ATTITUDE")]
    UpdateAttitude {
        from_key: EntityKey,
        to_key: EntityKey,
        dimension: AttitudeDimension,
        delta: i32,
    },

    #[serde(rename = "RECORD_FACT")]
    RecordFact {
        subject_type: EntityKind,
        subject_key: EntityKey,
        predicate: String,
        value: String,
        category: FactCategory,
    },

    #[serde(rename = "ADVANCE_TIME")]
    AdvanceTime { minutes: i64 },

    #[serde(rename = "DELETE_ENTITY")]
    DeleteEntity { key: EntityKey },
}

impl StateDelta {
    /// Sort rank for deterministic batch reordering: creates before updates
    /// before transfers before deletes.
    pub fn order_rank(&self) -> u8 {
        match self {
            Self::CreateEntity { .. } => 0,
            Self::UpdateLocation { .. }
            | Self::UpdateNeed { .. }
            | Self::UpdateAttitude { .. }
            | Self::RecordFact { .. }
            | Self::AdvanceTime { .. } => 1,
            Self::TransferItem { .. } => 2,
            Self::DeleteEntity { .. } => 3,
        }
    }

    /// Clamp `UPDATE_NEED`/`UPDATE_ATTITUDE` magnitudes into [-100, 100] and
    /// negative `ADVANCE_TIME` up to 0.
    pub fn clamp_ranges(&mut self) {
        match self {
            Self::UpdateNeed { delta, .. } | Self::UpdateAttitude { delta, .. } => {
                *delta = (*delta).clamp(-100, 100);
            }
            Self::AdvanceTime { minutes } => {
                *minutes = (*minutes).max(0);
            }
            _ => {}
        }
    }

    /// Every entity/item/location key this delta references, for grounding
    /// checks. Does not include the key it *introduces* (`CREATE_ENTITY`'s
    /// `entity_key` is a definition, not a reference).
    pub fn referenced_entity_keys(&self) -> Vec<&EntityKey> {
        match self {
            Self::CreateEntity { parent_key, .. } => parent_key.iter().collect(),
            Self::UpdateLocation { subject_key, .. } => vec![subject_key],
            Self::TransferItem {
                from_entity_key,
                to_entity_key,
                ..
            } => vec![from_entity_key, to_entity_key],
            Self::UpdateNeed { subject_key, .. } => vec![subject_key],
            Self::UpdateAttitude { from_key, to_key, .. } => vec![from_key, to_key],
            Self::RecordFact { subject_key, .. } => vec![subject_key],
            Self::AdvanceTime { .. } => vec![],
            Self::DeleteEntity { key } => vec![key],
        }
    }

    pub fn destination_key(&self) -> Option<&LocationKey> {
        match self {
            Self::UpdateLocation { destination_key, .. } => Some(destination_key),
            _ => None,
        }
    }

    /// Short human-readable summary for prompts and logs -- not shown to
    /// players directly.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateEntity { display_name, .. } => format!("{display_name} appears"),
            Self::UpdateLocation { subject_key, destination_key } => {
                format!("{} moves to {}", subject_key.as_str(), destination_key.as_str())
            }
            Self::TransferItem { from_entity_key, to_entity_key, item_key, quantity } => {
                format!("{quantity}x {} moves from {} to {}", item_key.as_str(), from_entity_key.as_str(), to_entity_key.as_str())
            }
            Self::UpdateNeed { subject_key, need, delta } => format!("{}'s {need} changes by {delta}", subject_key.as_str()),
            Self::UpdateAttitude { from_key, to_key, dimension, delta } => {
                format!("{}'s {dimension} toward {} changes by {delta}", from_key.as_str(), to_key.as_str())
            }
            Self::RecordFact { predicate, value, .. } => format!("{predicate}: {value}"),
            Self::AdvanceTime { minutes } => format!("{minutes} minutes pass"),
            Self::DeleteEntity { key } => format!("{} is removed", key.as_str()),
        }
    }
}
