//! The Grounding Manifest: the single source of truth for what an LLM call
//! may reference during a turn.

use std::collections::{BTreeMap, BTreeSet};

use branchloom_domain::{AttitudeDimension, EntityKey, EntityKind, ExitKey, FactCategory, ItemKey, LocationKey, NeedKind};
use serde::{Deserialize, Serialize};

/// A grounded entity (NPC, player, or creature) reachable this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntity {
    pub display: String,
    pub kind: EntityKind,
    pub short_ref: String,
}

/// A grounded item, whether lying in the scene or held in an inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub display: String,
    pub stackable: bool,
    pub quantity: u32,
    pub short_ref: String,
}

/// A grounded exit out of the current location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestExit {
    pub destination_key: LocationKey,
    pub display: String,
    pub direction: Option<String>,
}

/// Immutable, per-turn snapshot of every key an LLM call is allowed to
/// reference. Built once by the Context Builder and never mutated after
/// that; `additional_valid_keys` only grows via entities created earlier in
/// the same turn's delta batch, which is applied by cloning a new Manifest
/// rather than mutating this one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub session_id: branchloom_domain::SessionId,
    pub turn_number: u64,
    pub location_key: LocationKey,
    pub location_display: String,

    pub entities: BTreeMap<EntityKey, ManifestEntity>,
    pub items: BTreeMap<ItemKey, ManifestItem>,
    pub exits: BTreeMap<ExitKey, ManifestExit>,

    pub candidate_locations: BTreeSet<LocationKey>,
    pub additional_valid_keys: BTreeSet<EntityKey>,

    pub valid_needs: Vec<NeedKind>,
    pub valid_entity_types: Vec<EntityKind>,
    pub valid_fact_categories: Vec<FactCategory>,
    pub valid_attitude_dimensions: Vec<AttitudeDimension>,
}

/// How a reference resolved: by short ref, by full key, or by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    ShortRef,
    Key,
    DisplayName,
}

impl Manifest {
    /// Assign deterministic short refs (A, B, ... Z, AA, AB, ...) to a set of
    /// keys in ASCII order. Stable across retries within the same turn
    /// because callers always pass the same sorted key set.
    pub fn short_ref_for_index(index: usize) -> String {
        let mut n = index;
        let mut letters = Vec::new();
        loop {
            let rem = (n % 26) as u8;
            letters.push(b'A' + rem);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        letters.reverse();
        String::from_utf8(letters).expect("ASCII letters are valid UTF-8")
    }

    /// Resolve an entity reference that may be a short ref, a full key, or a
    /// case-insensitive display name. Returns `None` if none agree on a
    /// single entity -- a malformed manifest is treated as "does not
    /// resolve" rather than picking arbitrarily.
    pub fn resolve_entity(&self, reference: &str) -> Option<(&EntityKey, &ManifestEntity)> {
        if let Some((key, entity)) = self
            .entities
            .iter()
            .find(|(_, entity)| entity.short_ref == reference)
        {
            return Some((key, entity));
        }
        if let Some(entity) = self.entities.get(reference) {
            return self.entities.get_key_value(reference).map(|(k, _)| (k, entity));
        }
        let lower = reference.to_ascii_lowercase();
        self.entities
            .iter()
            .find(|(_, entity)| entity.display.to_ascii_lowercase() == lower)
    }

    pub fn resolve_item(&self, reference: &str) -> Option<(&ItemKey, &ManifestItem)> {
        if let Some((key, item)) = self.items.iter().find(|(_, item)| item.short_ref == reference) {
            return Some((key, item));
        }
        if self.items.get(reference).is_some() {
            return self.items.get_key_value(reference);
        }
        let lower = reference.to_ascii_lowercase();
        self.items
            .iter()
            .find(|(_, item)| item.display.to_ascii_lowercase() == lower)
    }

    /// Whether `key` is anything the pipeline may legally reference this
    /// turn: a manifest entity, an entity created earlier in the batch, an
    /// exit destination, or a candidate location.
    pub fn is_known_entity_key(&self, key: &str) -> bool {
        self.entities.contains_key(key) || self.additional_valid_keys.contains(key)
    }

    pub fn is_known_location(&self, key: &LocationKey) -> bool {
        self.exits.values().any(|exit| &exit.destination_key == key)
            || self.candidate_locations.contains(key)
    }

    /// Stable digest of this manifest's key set, used as half of a branch
    /// fingerprint. Covers the sorted set of entity/item/exit keys plus the
    /// location key, so two manifests with the same reachable keys always
    /// digest identically regardless of insertion order.
    pub fn digest(&self) -> String {
        use std::fmt::Write;
        let mut buf = String::new();
        write!(buf, "loc:{}|", self.location_key.as_str()).ok();
        for key in self.entities.keys() {
            write!(buf, "e:{}|", key.as_str()).ok();
        }
        for key in self.items.keys() {
            write!(buf, "i:{}|", key.as_str()).ok();
        }
        for key in self.exits.keys() {
            write!(buf, "x:{}|", key.as_str()).ok();
        }
        format!("{:x}", crate::cache::fingerprint::fnv1a(buf.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ref_sequence_rolls_over_after_z() {
        assert_eq!(Manifest::short_ref_for_index(0), "A");
        assert_eq!(Manifest::short_ref_for_index(25), "Z");
        assert_eq!(Manifest::short_ref_for_index(26), "AA");
        assert_eq!(Manifest::short_ref_for_index(27), "AB");
        assert_eq!(Manifest::short_ref_for_index(51), "AZ");
        assert_eq!(Manifest::short_ref_for_index(52), "BA");
    }

    fn sample_manifest() -> Manifest {
        let mut entities = BTreeMap::new();
        entities.insert(
            EntityKey::from("patron_1"),
            ManifestEntity {
                display: "a patron".into(),
                kind: EntityKind::Npc,
                short_ref: "A".into(),
            },
        );
        Manifest {
            session_id: branchloom_domain::SessionId::new(),
            turn_number: 1,
            location_key: LocationKey::from("village_tavern"),
            location_display: "the tavern".into(),
            entities,
            items: BTreeMap::new(),
            exits: BTreeMap::new(),
            candidate_locations: BTreeSet::new(),
            additional_valid_keys: BTreeSet::new(),
            valid_needs: NeedKind::ALL.to_vec(),
            valid_entity_types: vec![EntityKind::Npc, EntityKind::Player, EntityKind::Creature],
            valid_fact_categories: vec![FactCategory::Personal],
            valid_attitude_dimensions: vec![AttitudeDimension::Trust],
        }
    }

    #[test]
    fn resolve_entity_agrees_across_ref_key_and_display_name() {
        let manifest = sample_manifest();
        assert_eq!(manifest.resolve_entity("A").unwrap().0.as_str(), "patron_1");
        assert_eq!(
            manifest.resolve_entity("patron_1").unwrap().0.as_str(),
            "patron_1"
        );
        assert_eq!(
            manifest.resolve_entity("A PATRON").unwrap().0.as_str(),
            "patron_1"
        );
        assert!(manifest.resolve_entity("nonexistent").is_none());
    }

    #[test]
    fn digest_is_stable_across_calls() {
        let manifest = sample_manifest();
        assert_eq!(manifest.digest(), manifest.digest());
    }
}
