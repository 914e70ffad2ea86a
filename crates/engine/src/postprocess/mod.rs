//! Delta Post-Processor: deterministic repair pipeline applied to every
//! branch before collapse.

use std::collections::BTreeSet;
use std::sync::Arc;

use branchloom_domain::{EntityKey, EntityKind, FactCategory, ItemKey};

use crate::domain::{Branch, Manifest, StateDelta};
use crate::ports::{CompletionParams, LlmClient};

/// Patterns recognized as ambient NPCs eligible for auto-injection.
const AMBIENT_NPC_PATTERNS: &[&str] = &["patron", "traveler", "traveller", "guard", "hermit", "merchant", "beggar"];

#[derive(Debug, Clone)]
pub struct PostProcessOutcome {
    pub deltas: Vec<StateDelta>,
    pub additional_created_keys: BTreeSet<EntityKey>,
    pub soft_errors: Vec<String>,
    /// Set when a `DestinationHallucination` forced delta removal; the
    /// orchestrator regenerates the branch once.
    pub needs_regeneration: bool,
}

pub struct DeltaPostProcessor {
    llm: Option<Arc<dyn LlmClient>>,
    unknown_key_rewrite_threshold: f64,
}

impl DeltaPostProcessor {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, unknown_key_rewrite_threshold: f64) -> Self {
        Self {
            llm,
            unknown_key_rewrite_threshold,
        }
    }

    /// Run the full repair pipeline over one branch's deltas.
    pub async fn process(&self, branch: &Branch, manifest: &Manifest) -> PostProcessOutcome {
        let mut soft_errors = Vec::new();
        let mut needs_regeneration = false;
        let mut additional_created_keys = BTreeSet::new();
        let mut ambient_display_names: std::collections::BTreeMap<EntityKey, String> = std::collections::BTreeMap::new();
        let mut known_keys: BTreeSet<EntityKey> = manifest.entities.keys().cloned().collect();
        known_keys.extend(manifest.additional_valid_keys.iter().cloned());
        let known_item_keys: BTreeSet<ItemKey> = manifest.items.keys().cloned().collect();

        // 1. Ref resolution.
        let mut deltas: Vec<StateDelta> = branch
            .deltas
            .iter()
            .cloned()
            .map(|delta| self.resolve_refs(delta, manifest, &mut soft_errors))
            .collect();

        // 2. Unknown-key detection and repair (entity and item keys alike).
        let mut repaired = Vec::with_capacity(deltas.len());
        for delta in deltas.drain(..) {
            match self
                .repair_unknown_keys(delta, manifest, &known_keys, &known_item_keys, &mut additional_created_keys, &mut ambient_display_names)
                .await
            {
                Some(delta) => repaired.push(delta),
                None => soft_errors.push("dropped delta: unresolvable entity or item reference".to_string()),
            }
        }
        deltas = repaired;

        // 2b. Synthesize a CREATE_ENTITY for every ambient NPC auto-injected
        // above, so it actually exists in the EntityStore by the time the
        // deltas that reference it apply. Ordering is fixed by step 8.
        for (key, display_name) in &ambient_display_names {
            deltas.insert(
                0,
                StateDelta::CreateEntity {
                    entity_key: key.clone(),
                    entity_type: EntityKind::Npc,
                    display_name: display_name.clone(),
                    parent_key: None,
                },
            );
        }

        // 3. Enum normalization (fact category fallback).
        for delta in deltas.iter_mut() {
            if let StateDelta::RecordFact { category, .. } = delta {
                if !manifest.valid_fact_categories.contains(category) {
                    soft_errors.push(format!("unrecognized fact category {category}, falling back to personal"));
                    *category = FactCategory::Personal;
                }
            }
        }

        // 4. Destination validation.
        let mut destination_ok = Vec::with_capacity(deltas.len());
        for delta in deltas.drain(..) {
            if let Some(destination) = delta.destination_key() {
                if !manifest.is_known_location(destination) {
                    soft_errors.push(format!("destination hallucination: {:?}", destination.as_str()));
                    needs_regeneration = true;
                    continue;
                }
            }
            destination_ok.push(delta);
        }
        deltas = destination_ok;

        // 5. Conflict resolution.
        deltas = Self::resolve_conflicts(deltas, &known_keys, &mut soft_errors);

        // 6. Range clamping.
        for delta in deltas.iter_mut() {
            delta.clamp_ranges();
        }

        // 7. Parent auto-injection.
        deltas = Self::inject_missing_parents(deltas, &known_keys);

        // 8. Deterministic reordering.
        deltas.sort_by_key(|d| d.order_rank());

        PostProcessOutcome {
            deltas,
            additional_created_keys,
            soft_errors,
            needs_regeneration,
        }
    }

    fn resolve_refs(&self, delta: StateDelta, manifest: &Manifest, soft_errors: &mut Vec<String>) -> StateDelta {
        let resolve = |reference: &EntityKey| -> EntityKey {
            match manifest.resolve_entity(reference.as_str()) {
                Some((key, _)) => key.clone(),
                None => reference.clone(),
            }
        };
        match delta {
            StateDelta::UpdateLocation { subject_key, destination_key } => StateDelta::UpdateLocation {
                subject_key: resolve(&subject_key),
                destination_key,
            },
            StateDelta::TransferItem { from_entity_key, to_entity_key, item_key, quantity } => {
                let resolved_item = manifest.resolve_item(item_key.as_str()).map(|(key, _)| key.clone()).unwrap_or(item_key);
                StateDelta::TransferItem {
                    from_entity_key: resolve(&from_entity_key),
                    to_entity_key: resolve(&to_entity_key),
                    item_key: resolved_item,
                    quantity,
                }
            }
            StateDelta::UpdateNeed { subject_key, need, delta } => StateDelta::UpdateNeed {
                subject_key: resolve(&subject_key),
                need,
                delta,
            },
            StateDelta::UpdateAttitude { from_key, to_key, dimension, delta } => StateDelta::UpdateAttitude {
                from_key: resolve(&from_key),
                to_key: resolve(&to_key),
                dimension,
                delta,
            },
            StateDelta::RecordFact { subject_type, subject_key, predicate, value, category } => StateDelta::RecordFact {
                subject_type,
                subject_key: resolve(&subject_key),
                predicate,
                value,
                category,
            },
            StateDelta::DeleteEntity { key } => StateDelta::DeleteEntity { key: resolve(&key) },
            other @ (StateDelta::CreateEntity { .. } | StateDelta::AdvanceTime { .. }) => {
                let _ = soft_errors;
                other
            }
        }
    }

    async fn repair_unknown_keys(
        &self,
        delta: StateDelta,
        manifest: &Manifest,
        known_keys: &BTreeSet<EntityKey>,
        known_item_keys: &BTreeSet<ItemKey>,
        additional_created_keys: &mut BTreeSet<EntityKey>,
        ambient_display_names: &mut std::collections::BTreeMap<EntityKey, String>,
    ) -> Option<StateDelta> {
        let referenced: Vec<EntityKey> = delta.referenced_entity_keys().into_iter().cloned().collect();
        let mut delta = delta;

        for key in referenced {
            if known_keys.contains(&key) || additional_created_keys.contains(&key) {
                continue;
            }

            if let Some((resolved, _)) = manifest.resolve_entity(key.as_str()) {
                if resolved != &key {
                    delta = Self::rewrite_key(delta, &key, resolved);
                }
                continue;
            }

            let best_match = known_keys
                .iter()
                .map(|candidate| (candidate, strsim::jaro_winkler(key.as_str(), candidate.as_str())))
                .fold(None, |best: Option<(&EntityKey, f64)>, (candidate, score)| match best {
                    Some((_, best_score)) if best_score >= score => best,
                    _ => Some((candidate, score)),
                });

            if let Some((candidate, score)) = best_match {
                if score >= self.unknown_key_rewrite_threshold {
                    tracing::info!(from = key.as_str(), to = candidate.as_str(), score, "rewriting unknown key to close match");
                    let candidate = candidate.clone();
                    delta = Self::rewrite_key(delta, &key, &candidate);
                    continue;
                }
            }

            if let Some(pattern) = Self::ambient_npc_pattern(key.as_str()) {
                additional_created_keys.insert(key.clone());
                ambient_display_names.entry(key.clone()).or_insert_with(|| format!("a {pattern}"));
                continue;
            }

            if let Some(llm) = &self.llm {
                if let Some(resolved) = Self::clarify_with_llm(llm.as_ref(), &key, manifest).await {
                    delta = Self::rewrite_key(delta, &key, &resolved);
                    continue;
                }
            }

            return None;
        }

        // `TRANSFER_ITEM` is the only delta carrying an item key; items have
        // no wire-level CREATE, so unlike entities there is no ambient
        // auto-injection path for them -- an unresolvable item key either
        // rewrites to a close match or the delta is dropped.
        if let StateDelta::TransferItem { item_key, .. } = &delta {
            if !known_item_keys.contains(item_key) {
                if let Some((resolved, _)) = manifest.resolve_item(item_key.as_str()) {
                    let resolved = resolved.clone();
                    delta = Self::rewrite_item_key(delta, resolved);
                } else {
                    let best_match = known_item_keys
                        .iter()
                        .map(|candidate| (candidate, strsim::jaro_winkler(item_key.as_str(), candidate.as_str())))
                        .fold(None, |best: Option<(&ItemKey, f64)>, (candidate, score)| match best {
                            Some((_, best_score)) if best_score >= score => best,
                            _ => Some((candidate, score)),
                        });

                    let rewritten = match best_match {
                        Some((candidate, score)) if score >= self.unknown_key_rewrite_threshold => {
                            tracing::info!(from = item_key.as_str(), to = candidate.as_str(), score, "rewriting unknown item key to close match");
                            Some(candidate.clone())
                        }
                        _ => None,
                    };

                    let resolved = match rewritten {
                        Some(key) => Some(key),
                        None => match &self.llm {
                            Some(llm) => Self::clarify_item_with_llm(llm.as_ref(), item_key, manifest).await,
                            None => None,
                        },
                    };

                    match resolved {
                        Some(resolved) => delta = Self::rewrite_item_key(delta, resolved),
                        None => return None,
                    }
                }
            }
        }

        Some(delta)
    }

    fn ambient_npc_pattern(key: &str) -> Option<&'static str> {
        let lower = key.to_ascii_lowercase();
        AMBIENT_NPC_PATTERNS.iter().find(|pattern| lower.contains(*pattern)).copied()
    }

    async fn clarify_with_llm(llm: &dyn LlmClient, unresolved: &EntityKey, manifest: &Manifest) -> Option<EntityKey> {
        let refs: Vec<String> = manifest.entities.values().map(|e| e.short_ref.clone()).collect();
        let prompt = format!(
            "The key {:?} does not exist. Pick the correct ref from: {}",
            unresolved.as_str(),
            refs.join(", ")
        );
        let response = llm.complete(prompt, CompletionParams::default()).await.ok()?;
        manifest.resolve_entity(response.trim()).map(|(key, _)| key.clone())
    }

    async fn clarify_item_with_llm(llm: &dyn LlmClient, unresolved: &ItemKey, manifest: &Manifest) -> Option<ItemKey> {
        let refs: Vec<String> = manifest.items.values().map(|i| i.short_ref.clone()).collect();
        let prompt = format!(
            "The item key {:?} does not exist. Pick the correct ref from: {}",
            unresolved.as_str(),
            refs.join(", ")
        );
        let response = llm.complete(prompt, CompletionParams::default()).await.ok()?;
        manifest.resolve_item(response.trim()).map(|(key, _)| key.clone())
    }

    fn rewrite_item_key(delta: StateDelta, new_item_key: ItemKey) -> StateDelta {
        match delta {
            StateDelta::TransferItem { from_entity_key, to_entity_key, quantity, .. } => StateDelta::TransferItem {
                from_entity_key,
                to_entity_key,
                item_key: new_item_key,
                quantity,
            },
            other => other,
        }
    }

    fn rewrite_key(delta: StateDelta, from: &EntityKey, to: &EntityKey) -> StateDelta {
        let swap = |key: EntityKey| if &key == from { to.clone() } else { key };
        match delta {
            StateDelta::UpdateLocation { subject_key, destination_key } => StateDelta::UpdateLocation {
                subject_key: swap(subject_key),
                destination_key,
            },
            StateDelta::TransferItem { from_entity_key, to_entity_key, item_key, quantity } => StateDelta::TransferItem {
                from_entity_key: swap(from_entity_key),
                to_entity_key: swap(to_entity_key),
                item_key,
                quantity,
            },
            StateDelta::UpdateNeed { subject_key, need, delta } => StateDelta::UpdateNeed {
                subject_key: swap(subject_key),
                need,
                delta,
            },
            StateDelta::UpdateAttitude { from_key, to_key, dimension, delta } => StateDelta::UpdateAttitude {
                from_key: swap(from_key),
                to_key: swap(to_key),
                dimension,
                delta,
            },
            StateDelta::RecordFact { subject_type, subject_key, predicate, value, category } => StateDelta::RecordFact {
                subject_type,
                subject_key: swap(subject_key),
                predicate,
                value,
                category,
            },
            StateDelta::DeleteEntity { key } => StateDelta::DeleteEntity { key: swap(key) },
            other => other,
        }
    }

    /// Rule 5: same-key CREATE+DELETE drop both; duplicate CREATE of an
    /// already-existing key is dropped, whether "existing" means earlier in
    /// this same batch or already present in the manifest before the turn.
    fn resolve_conflicts(deltas: Vec<StateDelta>, known_keys: &BTreeSet<EntityKey>, soft_errors: &mut Vec<String>) -> Vec<StateDelta> {
        let mut create_keys: BTreeSet<EntityKey> = BTreeSet::new();
        let mut delete_keys: BTreeSet<EntityKey> = BTreeSet::new();
        for delta in &deltas {
            match delta {
                StateDelta::CreateEntity { entity_key, .. } => {
                    create_keys.insert(entity_key.clone());
                }
                StateDelta::DeleteEntity { key } => {
                    delete_keys.insert(key.clone());
                }
                _ => {}
            }
        }
        let create_and_delete: BTreeSet<EntityKey> = create_keys.intersection(&delete_keys).cloned().collect();

        let mut seen_creates: BTreeSet<EntityKey> = known_keys.clone();
        deltas
            .into_iter()
            .filter(|delta| match delta {
                StateDelta::CreateEntity { entity_key, .. } => {
                    if create_and_delete.contains(entity_key) {
                        soft_errors.push(format!("dropped CREATE+DELETE conflict for {:?}", entity_key.as_str()));
                        return false;
                    }
                    if !seen_creates.insert(entity_key.clone()) {
                        soft_errors.push(format!("dropped duplicate CREATE for {:?}", entity_key.as_str()));
                        return false;
                    }
                    true
                }
                StateDelta::DeleteEntity { key } => !create_and_delete.contains(key),
                _ => true,
            })
            .collect()
    }

    /// Rule 7: items referencing a parent_key that is neither an existing
    /// entity nor created earlier in the batch get a `CREATE_ENTITY` parent
    /// inserted ahead of them.
    fn inject_missing_parents(deltas: Vec<StateDelta>, known_keys: &BTreeSet<EntityKey>) -> Vec<StateDelta> {
        let mut created_so_far: BTreeSet<EntityKey> = known_keys.clone();
        for delta in &deltas {
            if let StateDelta::CreateEntity { entity_key, .. } = delta {
                created_so_far.insert(entity_key.clone());
            }
        }

        let mut result = Vec::with_capacity(deltas.len());
        for delta in deltas {
            if let StateDelta::CreateEntity { parent_key: Some(parent), .. } = &delta {
                if !created_so_far.contains(parent) {
                    result.push(StateDelta::CreateEntity {
                        entity_key: parent.clone(),
                        entity_type: EntityKind::Npc,
                        display_name: parent.as_str().replace('_', " "),
                        parent_key: None,
                    });
                    created_so_far.insert(parent.clone());
                }
            }
            result.push(delta);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manifest::ManifestEntity;
    use branchloom_domain::{ItemKey, LocationKey};
    use std::collections::BTreeMap;

    fn manifest_with_tavern_exit() -> Manifest {
        use crate::domain::manifest::ManifestExit;
        let mut exits = BTreeMap::new();
        exits.insert(
            branchloom_domain::ExitKey::from("to_tavern"),
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
            entities: BTreeMap::new(),
            items: BTreeMap::new(),
            exits,
            candidate_locations: BTreeSet::new(),
            additional_valid_keys: BTreeSet::new(),
            valid_needs: vec![],
            valid_entity_types: vec![],
            valid_fact_categories: vec![FactCategory::Personal],
            valid_attitude_dimensions: vec![],
        }
    }

    fn branch(deltas: Vec<StateDelta>) -> Branch {
        Branch {
            variant_id: "success".into(),
            outcome_tier: branchloom_domain::OutcomeTier::Success,
            deltas,
            narrative_hint: "hint".into(),
        }
    }

    #[tokio::test]
    async fn ambient_npc_pattern_is_auto_injected_not_dropped() {
        let processor = DeltaPostProcessor::new(None, 0.78);
        let manifest = manifest_with_tavern_exit();
        let b = branch(vec![StateDelta::UpdateAttitude {
            from_key: EntityKey::from("patron_1"),
            to_key: EntityKey::from("player"),
            dimension: branchloom_domain::AttitudeDimension::Trust,
            delta: 5,
        }]);
        let outcome = processor.process(&b, &manifest).await;
        assert!(outcome.additional_created_keys.contains(&EntityKey::from("patron_1")));
        assert_eq!(outcome.deltas.len(), 2);
        assert!(matches!(
            &outcome.deltas[0],
            StateDelta::CreateEntity { entity_key, display_name, .. }
                if entity_key.as_str() == "patron_1" && display_name == "a patron"
        ));
    }

    #[tokio::test]
    async fn hallucinated_destination_is_dropped_and_flags_regeneration() {
        let processor = DeltaPostProcessor::new(None, 0.78);
        let manifest = manifest_with_tavern_exit();
        let b = branch(vec![StateDelta::UpdateLocation {
            subject_key: EntityKey::from("player"),
            destination_key: LocationKey::from("tavern_cellar"),
        }]);
        let outcome = processor.process(&b, &manifest).await;
        assert!(outcome.deltas.is_empty());
        assert!(outcome.needs_regeneration);
    }

    #[tokio::test]
    async fn duplicate_create_of_existing_key_is_dropped() {
        let manifest = manifest_with_tavern_exit();
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![
            StateDelta::CreateEntity {
                entity_key: EntityKey::from("patron_1"),
                entity_type: EntityKind::Npc,
                display_name: "a patron".into(),
                parent_key: None,
            },
            StateDelta::CreateEntity {
                entity_key: EntityKey::from("patron_1"),
                entity_type: EntityKind::Npc,
                display_name: "a patron".into(),
                parent_key: None,
            },
        ]);
        let outcome = processor.process(&b, &manifest).await;
        let create_count = outcome
            .deltas
            .iter()
            .filter(|d| matches!(d, StateDelta::CreateEntity { .. }))
            .count();
        assert_eq!(create_count, 1);
    }

    #[tokio::test]
    async fn create_for_a_key_already_in_the_manifest_is_dropped_entirely() {
        let mut manifest = manifest_with_tavern_exit();
        manifest.entities.insert(
            EntityKey::from("innkeeper"),
            ManifestEntity {
                display: "the innkeeper".into(),
                kind: EntityKind::Npc,
                short_ref: "A".into(),
            },
        );
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![StateDelta::CreateEntity {
            entity_key: EntityKey::from("innkeeper"),
            entity_type: EntityKind::Npc,
            display_name: "the innkeeper".into(),
            parent_key: None,
        }]);
        let outcome = processor.process(&b, &manifest).await;
        let create_count = outcome
            .deltas
            .iter()
            .filter(|d| matches!(d, StateDelta::CreateEntity { .. }))
            .count();
        assert_eq!(create_count, 0, "the pre-existing innkeeper needs no re-creation");
    }

    fn manifest_with_tavern_exit_and_coin() -> Manifest {
        let mut manifest = manifest_with_tavern_exit();
        manifest.entities.insert(
            EntityKey::from("player"),
            ManifestEntity {
                display: "you".into(),
                kind: EntityKind::Player,
                short_ref: "A".into(),
            },
        );
        manifest.entities.insert(
            EntityKey::from("innkeeper"),
            ManifestEntity {
                display: "the innkeeper".into(),
                kind: EntityKind::Npc,
                short_ref: "B".into(),
            },
        );
        manifest.items.insert(
            ItemKey::from("copper_coin"),
            crate::domain::manifest::ManifestItem {
                display: "a copper coin".into(),
                stackable: true,
                quantity: 1,
                short_ref: "C".into(),
            },
        );
        manifest
    }

    #[tokio::test]
    async fn transfer_item_with_a_close_item_key_typo_is_rewritten_not_dropped() {
        let manifest = manifest_with_tavern_exit_and_coin();
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![StateDelta::TransferItem {
            from_entity_key: EntityKey::from("innkeeper"),
            to_entity_key: EntityKey::from("player"),
            item_key: ItemKey::from("coper_coin"),
            quantity: 1,
        }]);
        let outcome = processor.process(&b, &manifest).await;
        assert_eq!(outcome.deltas.len(), 1);
        assert!(matches!(
            &outcome.deltas[0],
            StateDelta::TransferItem { item_key, .. } if item_key.as_str() == "copper_coin"
        ));
    }

    #[tokio::test]
    async fn transfer_item_with_an_unresolvable_item_key_is_dropped() {
        let manifest = manifest_with_tavern_exit_and_coin();
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![StateDelta::TransferItem {
            from_entity_key: EntityKey::from("innkeeper"),
            to_entity_key: EntityKey::from("player"),
            item_key: ItemKey::from("phantom_amulet"),
            quantity: 1,
        }]);
        let outcome = processor.process(&b, &manifest).await;
        assert!(outcome.deltas.is_empty());
        assert!(outcome.soft_errors.iter().any(|e| e.contains("unresolvable")));
    }

    #[tokio::test]
    async fn missing_parent_is_auto_created_before_its_child() {
        let manifest = manifest_with_tavern_exit();
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![StateDelta::CreateEntity {
            entity_key: EntityKey::from("wooden_chest"),
            entity_type: EntityKind::Creature,
            display_name: "a chest".into(),
            parent_key: Some(EntityKey::from("tavern_cellar_room")),
        }]);
        let outcome = processor.process(&b, &manifest).await;
        assert_eq!(outcome.deltas.len(), 2);
        assert!(matches!(&outcome.deltas[0], StateDelta::CreateEntity { entity_key, .. } if entity_key.as_str() == "tavern_cellar_room"));
    }

    #[tokio::test]
    async fn need_delta_out_of_range_is_clamped() {
        let manifest = manifest_with_tavern_exit();
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![StateDelta::UpdateNeed {
            subject_key: EntityKey::from("player"),
            need: branchloom_domain::NeedKind::Hunger,
            delta: 999,
        }]);
        let outcome = processor.process(&b, &manifest).await;
        assert!(matches!(outcome.deltas[0], StateDelta::UpdateNeed { delta: 100, .. }));
    }

    #[tokio::test]
    async fn deltas_are_reordered_creates_before_transfers_before_deletes() {
        let manifest = manifest_with_tavern_exit();
        let processor = DeltaPostProcessor::new(None, 0.78);
        let b = branch(vec![
            StateDelta::DeleteEntity { key: EntityKey::from("player") },
            StateDelta::TransferItem {
                from_entity_key: EntityKey::from("player"),
                to_entity_key: EntityKey::from("player"),
                item_key: ItemKey::from("coin"),
                quantity: 1,
            },
            StateDelta::CreateEntity {
                entity_key: EntityKey::from("npc_1"),
                entity_type: EntityKind::Npc,
                display_name: "npc".into(),
                parent_key: None,
            },
        ]);
        let outcome = processor.process(&b, &manifest).await;
        let ranks: Vec<u8> = outcome.deltas.iter().map(|d| d.order_rank()).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    }
}
