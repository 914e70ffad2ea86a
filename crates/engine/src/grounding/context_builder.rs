//! Context Builder: assembles scene context and the turn's Grounding
//! Manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use branchloom_domain::{AttitudeDimension, EntityKey, FactCategory, NeedKind};

use crate::domain::manifest::{Manifest, ManifestEntity, ManifestExit, ManifestItem};
use crate::ports::{EntityStore, InventoryStore, LocationStore, StoreError};

/// Additional context handed to downstream LLM calls alongside the
/// Manifest. Recent-turn excerpts ride along in the prompt payload but are
/// deliberately excluded from the manifest's validity set.
#[derive(Debug, Clone, Default)]
pub struct SceneContext {
    pub recent_turn_excerpts: Vec<String>,
}

pub struct ContextBuilder {
    entity_store: Arc<dyn EntityStore>,
    inventory_store: Arc<dyn InventoryStore>,
    location_store: Arc<dyn LocationStore>,
}

impl ContextBuilder {
    pub fn new(
        entity_store: Arc<dyn EntityStore>,
        inventory_store: Arc<dyn InventoryStore>,
        location_store: Arc<dyn LocationStore>,
    ) -> Self {
        Self {
            entity_store,
            inventory_store,
            location_store,
        }
    }

    /// Build the Manifest for one turn. `destination_hint` is the raw player
    /// input, scanned against `known_locations` (display name, key pairs a
    /// caller already has cheaply available, e.g. from a world atlas) for a
    /// fuzzy destination mention; matches below `destination_match_threshold`
    /// are dropped.
    pub async fn build(
        &self,
        session_id: branchloom_domain::SessionId,
        turn_number: u64,
        player_key: &EntityKey,
        location_key: &branchloom_domain::LocationKey,
        destination_hint: Option<&str>,
        known_locations: &[(branchloom_domain::LocationKey, String)],
        destination_match_threshold: f64,
    ) -> Result<Manifest, StoreError> {
        let location = self.location_store.get(location_key).await?;
        let exits = self.location_store.list_exits(location_key).await?;
        let present_entities = self.entity_store.get_at_location(location_key).await?;
        let scene_items = self.inventory_store.items_at_location(location_key).await?;
        let held_items = self.inventory_store.items_held_by(player_key).await?;

        let mut sorted_keys: Vec<&EntityKey> = present_entities.iter().map(|e| &e.key).collect();
        sorted_keys.sort();

        let mut entities = BTreeMap::new();
        for (index, record) in present_entities.iter().enumerate() {
            let ordinal = sorted_keys.iter().position(|k| **k == record.key).unwrap_or(index);
            entities.insert(
                record.key.clone(),
                ManifestEntity {
                    display: record.display_name.clone(),
                    kind: record.kind,
                    short_ref: Manifest::short_ref_for_index(ordinal),
                },
            );
        }

        let mut item_keys: Vec<&branchloom_domain::ItemKey> =
            scene_items.iter().chain(held_items.iter()).map(|i| &i.key).collect();
        item_keys.sort();
        item_keys.dedup();

        let mut items = BTreeMap::new();
        for record in scene_items.iter().chain(held_items.iter()) {
            let ordinal = item_keys.iter().position(|k| **k == record.key).unwrap_or(0);
            items.entry(record.key.clone()).or_insert(ManifestItem {
                display: record.display_name.clone(),
                stackable: record.stackable,
                quantity: record.quantity,
                short_ref: Manifest::short_ref_for_index(ordinal),
            });
        }

        let exit_map = exits
            .into_iter()
            .map(|exit| {
                (
                    exit.exit_key,
                    ManifestExit {
                        destination_key: exit.destination_key,
                        display: exit.display,
                        direction: exit.direction,
                    },
                )
            })
            .collect();

        let mut candidate_locations = BTreeSet::new();
        if let Some(hint) = destination_hint {
            candidate_locations.extend(Self::match_destination_hint(
                hint,
                known_locations,
                destination_match_threshold,
            ));
        }

        Ok(Manifest {
            session_id,
            turn_number,
            location_key: location.key,
            location_display: location.display_name,
            entities,
            items,
            exits: exit_map,
            candidate_locations,
            additional_valid_keys: BTreeSet::new(),
            valid_needs: NeedKind::ALL.to_vec(),
            valid_entity_types: vec![
                branchloom_domain::EntityKind::Npc,
                branchloom_domain::EntityKind::Player,
                branchloom_domain::EntityKind::Creature,
            ],
            valid_fact_categories: vec![
                FactCategory::Personal,
                FactCategory::World,
                FactCategory::Relationship,
                FactCategory::Quest,
                FactCategory::Secret,
            ],
            valid_attitude_dimensions: vec![
                AttitudeDimension::Trust,
                AttitudeDimension::Fear,
                AttitudeDimension::Affection,
                AttitudeDimension::Respect,
            ],
        })
    }

    /// Scans `input` for any known location's display name via Jaro-Winkler
    /// similarity; a location qualifies as a candidate if its display name
    /// is similar enough to some contiguous word run in the input.
    fn match_destination_hint(
        input: &str,
        known_locations: &[(branchloom_domain::LocationKey, String)],
        threshold: f64,
    ) -> Option<branchloom_domain::LocationKey> {
        let words: Vec<&str> = input.split_whitespace().collect();
        known_locations
            .iter()
            .filter_map(|(key, display)| {
                let display_lower = display.to_ascii_lowercase();
                let display_words = display_lower.split_whitespace().count().max(1);
                words
                    .windows(display_words)
                    .map(|window| window.join(" ").to_ascii_lowercase())
                    .map(|phrase| strsim::jaro_winkler(&phrase, &display_lower))
                    .fold(0.0_f64, f64::max)
                    .gt(&threshold)
                    .then(|| key.clone())
            })
            .next()
    }
}
