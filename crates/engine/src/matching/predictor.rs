//! Action Predictor: enumerates plausible next actions from scene context,
//! consulted both by the Matcher's candidate pool and by the Anticipation
//! Engine.

use crate::domain::Manifest;

/// A predicted next action: a normalized `verb+target` key plus the
/// original verb/target and a human-readable label for prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCandidate {
    pub key: String,
    pub verb: String,
    pub target_key: Option<String>,
    pub label: String,
}

pub struct ActionPredictor;

impl ActionPredictor {
    /// Enumerate 3-8 candidates from exits, visible items, and present NPCs.
    /// `max_candidates` truncates the list.
    pub fn predict(manifest: &Manifest, max_candidates: usize) -> Vec<ActionCandidate> {
        let mut candidates = Vec::new();

        for (exit_key, exit) in &manifest.exits {
            candidates.push(ActionCandidate {
                key: format!("go:{}", exit_key.as_str()),
                verb: "go".to_string(),
                target_key: Some(exit_key.as_str().to_string()),
                label: format!("go to {}", exit.display),
            });
        }

        for (item_key, item) in &manifest.items {
            candidates.push(ActionCandidate {
                key: format!("take:{}", item_key.as_str()),
                verb: "take".to_string(),
                target_key: Some(item_key.as_str().to_string()),
                label: format!("take {}", item.display),
            });
        }

        for (entity_key, entity) in &manifest.entities {
            candidates.push(ActionCandidate {
                key: format!("talk:{}", entity_key.as_str()),
                verb: "talk".to_string(),
                target_key: Some(entity_key.as_str().to_string()),
                label: format!("talk to {}", entity.display),
            });
        }

        candidates.truncate(max_candidates.clamp(3, 8));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manifest::{ManifestEntity, ManifestExit, ManifestItem};
    use branchloom_domain::{EntityKind, ExitKey, ItemKey, LocationKey};
    use std::collections::{BTreeMap, BTreeSet};

    fn manifest_with_one_of_each() -> Manifest {
        let mut entities = BTreeMap::new();
        entities.insert(
            branchloom_domain::EntityKey::from("patron_1"),
            ManifestEntity {
                display: "a patron".into(),
                kind: EntityKind::Npc,
                short_ref: "A".into(),
            },
        );
        let mut items = BTreeMap::new();
        items.insert(
            ItemKey::from("copper_coin"),
            ManifestItem {
                display: "a copper coin".into(),
                stackable: true,
                quantity: 1,
                short_ref: "B".into(),
            },
        );
        let mut exits = BTreeMap::new();
        exits.insert(
            ExitKey::from("to_tavern"),
            ManifestExit {
                destination_key: LocationKey::from("village_tavern"),
                display: "the tavern".into(),
                direction: None,
            },
        );
        Manifest {
            session_id: branchloom_domain::SessionId::new(),
            turn_number: 1,
            location_key: LocationKey::from("village_square"),
            location_display: "the square".into(),
            entities,
            items,
            exits,
            candidate_locations: BTreeSet::new(),
            additional_valid_keys: BTreeSet::new(),
            valid_needs: vec![],
            valid_entity_types: vec![],
            valid_fact_categories: vec![],
            valid_attitude_dimensions: vec![],
        }
    }

    #[test]
    fn predicts_one_candidate_per_exit_item_and_entity() {
        let manifest = manifest_with_one_of_each();
        let candidates = ActionPredictor::predict(&manifest, 8);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().any(|c| c.key == "go:to_tavern"));
        assert!(candidates.iter().any(|c| c.key == "take:copper_coin"));
        assert!(candidates.iter().any(|c| c.key == "talk:patron_1"));
    }

    #[test]
    fn max_candidates_is_clamped_between_three_and_eight() {
        let manifest = manifest_with_one_of_each();
        assert!(ActionPredictor::predict(&manifest, 0).len() <= 8);
    }
}
