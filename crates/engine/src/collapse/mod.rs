//! Collapse Manager: resolves the dice roll (if any), selects a branch
//! variant, applies its deltas, and populates the TurnResult.

use std::sync::Arc;

use branchloom_domain::{EntityKey, OutcomeTier};

use crate::domain::{Branch, BranchSet, StateDelta, TurnResult};
use crate::ports::{DiceRoller, EntityRecord, EntityStore, FactRecord, FactStore, InventoryStore, LocationStore, NeedsStore, RelationshipStore, StoreError, TimeStore};

/// A best-effort inverse for one already-applied delta, captured at apply
/// time (before the mutation, where the reversal needs the prior value).
/// Run in reverse order when a later delta in the same batch fails, so a
/// partially-applied branch doesn't leave orphaned state behind.
enum Compensation {
    DeleteEntity(EntityKey),
    RecreateEntity(EntityRecord),
    RestoreLocation { subject_key: EntityKey, previous: branchloom_domain::LocationKey, is_player: bool },
    ReverseTransfer { from: EntityKey, to: EntityKey, item_key: branchloom_domain::ItemKey, quantity: u32 },
    AdjustNeed { subject_key: EntityKey, need: branchloom_domain::NeedKind, delta: i32 },
    AdjustAttitude { from_key: EntityKey, to_key: EntityKey, dimension: branchloom_domain::AttitudeDimension, delta: i32 },
    ReverseAdvanceTime(i64),
    /// Facts are append-only; there is no store-level way to un-record one.
    Irreversible(&'static str),
}

pub struct CollapseManager {
    entities: Arc<dyn EntityStore>,
    inventory: Arc<dyn InventoryStore>,
    locations: Arc<dyn LocationStore>,
    time: Arc<dyn TimeStore>,
    facts: Arc<dyn FactStore>,
    relationships: Arc<dyn RelationshipStore>,
    needs: Arc<dyn NeedsStore>,
    dice: Arc<dyn DiceRoller>,
}

impl CollapseManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entities: Arc<dyn EntityStore>,
        inventory: Arc<dyn InventoryStore>,
        locations: Arc<dyn LocationStore>,
        time: Arc<dyn TimeStore>,
        facts: Arc<dyn FactStore>,
        relationships: Arc<dyn RelationshipStore>,
        needs: Arc<dyn NeedsStore>,
        dice: Arc<dyn DiceRoller>,
    ) -> Self {
        Self {
            entities,
            inventory,
            locations,
            time,
            facts,
            relationships,
            needs,
            dice,
        }
    }

    pub async fn collapse(&self, branch_set: &BranchSet, player_key: &EntityKey, skill_modifier: i32) -> CollapseOutcome {
        let tier = if branch_set.required_roll {
            self.dice.roll(skill_modifier).await
        } else {
            branch_set
                .variants
                .first()
                .map(|b| b.outcome_tier)
                .unwrap_or(OutcomeTier::Partial)
        };

        let Some(variant) = branch_set.select(tier) else {
            return CollapseOutcome::NoMatchingVariant(tier);
        };

        match self.apply_deltas(variant, player_key).await {
            Ok((applied, new_location, time_advanced)) => {
                let mut builder = TurnResult::builder()
                    .applied_deltas(applied)
                    .time_advanced(time_advanced)
                    .skill_check_result(tier)
                    .narrative(variant.narrative_hint.clone());
                if let Some(location) = new_location {
                    builder = builder.new_location(location);
                }
                CollapseOutcome::Applied(builder.build())
            }
            Err((partial, err)) => CollapseOutcome::TransactionFailed { partial, error: err },
        }
    }

    /// Applies `branch.deltas` in their post-processor-assigned order inside
    /// a single transactional boundary: on the first store failure, every
    /// delta already applied in this batch is compensated in reverse order
    /// before the error is returned, so a failed turn leaves no partial
    /// mutation behind. Compensation is best-effort (store errors during
    /// rollback are logged, not propagated) and deltas applied before the
    /// failure are still returned alongside the error for diagnostics.
    async fn apply_deltas(
        &self,
        branch: &Branch,
        player_key: &EntityKey,
    ) -> Result<(Vec<StateDelta>, Option<branchloom_domain::LocationKey>, i64), (Vec<StateDelta>, StoreError)> {
        let mut applied = Vec::with_capacity(branch.deltas.len());
        let mut compensations = Vec::with_capacity(branch.deltas.len());
        let mut new_location = None;
        let mut time_advanced = 0i64;

        for delta in &branch.deltas {
            let outcome = match delta {
                StateDelta::CreateEntity { entity_key, entity_type, display_name, .. } => {
                    let result = self.entities.create(entity_key.clone(), *entity_type, display_name.clone()).await;
                    if result.is_ok() {
                        compensations.push(Compensation::DeleteEntity(entity_key.clone()));
                    }
                    result
                }
                StateDelta::UpdateLocation { subject_key, destination_key } => {
                    let previous = self.entities.get_by_key(subject_key).await.ok().map(|record| record.location);
                    let result = self.entities.set_location(subject_key, destination_key.clone()).await;
                    if result.is_ok() {
                        let is_player = subject_key == player_key;
                        if is_player {
                            self.locations.set_player_location(player_key, destination_key.clone()).await.ok();
                            new_location = Some(destination_key.clone());
                        }
                        if let Some(previous) = previous {
                            compensations.push(Compensation::RestoreLocation {
                                subject_key: subject_key.clone(),
                                previous,
                                is_player,
                            });
                        }
                    }
                    result
                }
                StateDelta::TransferItem { from_entity_key, to_entity_key, item_key, quantity } => {
                    let result = self.inventory.transfer(from_entity_key, to_entity_key, item_key, *quantity).await;
                    if result.is_ok() {
                        compensations.push(Compensation::ReverseTransfer {
                            from: to_entity_key.clone(),
                            to: from_entity_key.clone(),
                            item_key: item_key.clone(),
                            quantity: *quantity,
                        });
                    }
                    result
                }
                StateDelta::UpdateNeed { subject_key, need, delta } => {
                    let result = self.needs.adjust(subject_key, *need, *delta).await.map(|_| ());
                    if result.is_ok() {
                        compensations.push(Compensation::AdjustNeed {
                            subject_key: subject_key.clone(),
                            need: *need,
                            delta: -*delta,
                        });
                    }
                    result
                }
                StateDelta::UpdateAttitude { from_key, to_key, dimension, delta } => {
                    let result = self.relationships.adjust(from_key, to_key, *dimension, *delta).await.map(|_| ());
                    if result.is_ok() {
                        compensations.push(Compensation::AdjustAttitude {
                            from_key: from_key.clone(),
                            to_key: to_key.clone(),
                            dimension: *dimension,
                            delta: -*delta,
                        });
                    }
                    result
                }
                StateDelta::RecordFact { subject_type, subject_key, predicate, value, category } => {
                    let result = self
                        .facts
                        .record(FactRecord {
                            subject_type: *subject_type,
                            subject_key: subject_key.clone(),
                            predicate: predicate.clone(),
                            value: value.clone(),
                            category: *category,
                        })
                        .await;
                    if result.is_ok() {
                        compensations.push(Compensation::Irreversible("RECORD_FACT"));
                    }
                    result
                }
                StateDelta::AdvanceTime { minutes } => {
                    let result = self.time.advance_minutes(*minutes).await;
                    if result.is_ok() {
                        time_advanced += minutes;
                        compensations.push(Compensation::ReverseAdvanceTime(-*minutes));
                    }
                    result
                }
                StateDelta::DeleteEntity { key } => {
                    let previous = self.entities.get_by_key(key).await.ok();
                    let result = self.entities.delete(key).await;
                    if result.is_ok() {
                        if let Some(record) = previous {
                            compensations.push(Compensation::RecreateEntity(record));
                        }
                    }
                    result
                }
            };

            match outcome {
                Ok(()) => applied.push(delta.clone()),
                Err(err) => {
                    self.rollback(compensations).await;
                    return Err((applied, err));
                }
            }
        }

        Ok((applied, new_location, time_advanced))
    }

    /// Runs `compensations` in reverse application order. Each reversal is
    /// best-effort: a failure here is logged and does not block the rest of
    /// the rollback, since the turn is already degrading and there is no
    /// further fallback beneath this layer.
    async fn rollback(&self, compensations: Vec<Compensation>) {
        for compensation in compensations.into_iter().rev() {
            let result = match compensation {
                Compensation::DeleteEntity(key) => self.entities.delete(&key).await,
                Compensation::RecreateEntity(record) => {
                    let key = record.key.clone();
                    match self.entities.create(record.key, record.kind, record.display_name).await {
                        Ok(()) => self.entities.set_location(&key, record.location).await,
                        Err(err) => Err(err),
                    }
                }
                Compensation::RestoreLocation { subject_key, previous, is_player } => {
                    let result = self.entities.set_location(&subject_key, previous.clone()).await;
                    if result.is_ok() && is_player {
                        self.locations.set_player_location(&subject_key, previous).await.ok();
                    }
                    result
                }
                Compensation::ReverseTransfer { from, to, item_key, quantity } => self.inventory.transfer(&from, &to, &item_key, quantity).await,
                Compensation::AdjustNeed { subject_key, need, delta } => self.needs.adjust(&subject_key, need, delta).await.map(|_| ()),
                Compensation::AdjustAttitude { from_key, to_key, dimension, delta } => {
                    self.relationships.adjust(&from_key, &to_key, dimension, delta).await.map(|_| ())
                }
                Compensation::ReverseAdvanceTime(minutes) => self.time.advance_minutes(minutes).await,
                Compensation::Irreversible(kind) => {
                    tracing::warn!(delta_kind = kind, "turn rolled back but this delta kind cannot be un-applied");
                    Ok(())
                }
            };

            if let Err(err) = result {
                tracing::warn!(error = %err, "compensating rollback step failed, state may be inconsistent");
            }
        }
    }
}

pub enum CollapseOutcome {
    Applied(TurnResult),
    /// The rolled tier has no variant and the declared fallback chain also
    /// came up empty -- a malformed branch set.
    NoMatchingVariant(OutcomeTier),
    TransactionFailed { partial: Vec<StateDelta>, error: StoreError },
}
