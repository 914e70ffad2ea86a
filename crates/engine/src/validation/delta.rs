//! Delta Validator: enum membership, required fields, destination legality,
//! and batch-level acyclicity.

use std::collections::{BTreeMap, BTreeSet};

use branchloom_domain::EntityKey;

use crate::domain::{Branch, Manifest, StateDelta};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaIssue {
    InvalidEntityType(String),
    MissingRequiredField(String),
    IllegalDestination(String),
    ParentCycle(String),
}

pub struct DeltaValidator;

impl DeltaValidator {
    pub fn validate(branch: &Branch, manifest: &Manifest) -> Vec<DeltaIssue> {
        let mut issues = Vec::new();
        let mut parents: BTreeMap<EntityKey, EntityKey> = BTreeMap::new();

        for delta in &branch.deltas {
            match delta {
                StateDelta::CreateEntity { entity_type, parent_key, entity_key, .. } => {
                    if !manifest.valid_entity_types.is_empty() && !manifest.valid_entity_types.contains(entity_type) {
                        issues.push(DeltaIssue::InvalidEntityType(entity_type.to_string()));
                    }
                    if let Some(parent) = parent_key {
                        parents.insert(entity_key.clone(), parent.clone());
                    }
                }
                StateDelta::RecordFact { predicate, value, .. } => {
                    if predicate.trim().is_empty() {
                        issues.push(DeltaIssue::MissingRequiredField("predicate".into()));
                    }
                    if value.trim().is_empty() {
                        issues.push(DeltaIssue::MissingRequiredField("value".into()));
                    }
                }
                StateDelta::UpdateLocation { destination_key, .. } => {
                    if !manifest.is_known_location(destination_key) {
                        issues.push(DeltaIssue::IllegalDestination(destination_key.as_str().to_string()));
                    }
                }
                _ => {}
            }
        }

        for start in parents.keys() {
            if Self::has_cycle(start, &parents) {
                issues.push(DeltaIssue::ParentCycle(start.as_str().to_string()));
            }
        }

        issues
    }

    fn has_cycle(start: &EntityKey, parents: &BTreeMap<EntityKey, EntityKey>) -> bool {
        let mut seen: BTreeSet<EntityKey> = BTreeSet::new();
        let mut current = start.clone();
        loop {
            if !seen.insert(current.clone()) {
                return true;
            }
            match parents.get(&current) {
                Some(parent) if parent != start => current = parent.clone(),
                Some(parent) if parent == start => return true,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchloom_domain::{EntityKind, LocationKey, OutcomeTier};
    use std::collections::BTreeMap as Map;

    fn manifest() -> Manifest {
        Manifest {
            session_id: branchloom_domain::SessionId::new(),
            turn_number: 1,
            location_key: LocationKey::from("village_square"),
            location_display: "the square".into(),
            entities: Map::new(),
            items: Map::new(),
            exits: Map::new(),
            candidate_locations: BTreeSet::new(),
            additional_valid_keys: BTreeSet::new(),
            valid_needs: vec![],
            valid_entity_types: vec![EntityKind::Npc, EntityKind::Player],
            valid_fact_categories: vec![],
            valid_attitude_dimensions: vec![],
        }
    }

    fn branch(deltas: Vec<StateDelta>) -> Branch {
        Branch {
            variant_id: "success".into(),
            outcome_tier: OutcomeTier::Success,
            deltas,
            narrative_hint: "hint".into(),
        }
    }

    #[test]
    fn record_fact_with_empty_predicate_is_flagged() {
        let b = branch(vec![StateDelta::RecordFact {
            subject_type: EntityKind::Npc,
            subject_key: EntityKey::from("npc_1"),
            predicate: "".into(),
            value: "likes ale".into(),
            category: branchloom_domain::FactCategory::Personal,
        }]);
        let issues = DeltaValidator::validate(&b, &manifest());
        assert!(issues.contains(&DeltaIssue::MissingRequiredField("predicate".into())));
    }

    #[test]
    fn unknown_entity_type_is_flagged() {
        let b = branch(vec![StateDelta::CreateEntity {
            entity_key: EntityKey::from("beast_1"),
            entity_type: EntityKind::Creature,
            display_name: "a wolf".into(),
            parent_key: None,
        }]);
        let issues = DeltaValidator::validate(&b, &manifest());
        assert!(matches!(issues[0], DeltaIssue::InvalidEntityType(_)));
    }

    #[test]
    fn illegal_destination_is_flagged() {
        let b = branch(vec![StateDelta::UpdateLocation {
            subject_key: EntityKey::from("player"),
            destination_key: LocationKey::from("nowhere"),
        }]);
        let issues = DeltaValidator::validate(&b, &manifest());
        assert!(matches!(issues[0], DeltaIssue::IllegalDestination(_)));
    }

    #[test]
    fn parent_cycle_between_two_creates_is_detected() {
        let b = branch(vec![
            StateDelta::CreateEntity {
                entity_key: EntityKey::from("crate_a"),
                entity_type: EntityKind::Npc,
                display_name: "crate a".into(),
                parent_key: Some(EntityKey::from("crate_b")),
            },
            StateDelta::CreateEntity {
                entity_key: EntityKey::from("crate_b"),
                entity_type: EntityKind::Npc,
                display_name: "crate b".into(),
                parent_key: Some(EntityKey::from("crate_a")),
            },
        ]);
        let issues = DeltaValidator::validate(&b, &manifest());
        assert!(issues.iter().any(|i| matches!(i, DeltaIssue::ParentCycle(_))));
    }

    #[test]
    fn well_formed_batch_has_no_issues() {
        let b = branch(vec![StateDelta::CreateEntity {
            entity_key: EntityKey::from("npc_1"),
            entity_type: EntityKind::Npc,
            display_name: "a traveler".into(),
            parent_key: None,
        }]);
        assert!(DeltaValidator::validate(&b, &manifest()).is_empty());
    }
}
