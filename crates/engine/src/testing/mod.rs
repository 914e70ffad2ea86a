//! In-memory port doubles for integration-style tests against the full
//! `PipelineOrchestrator`: one `DashMap`-backed struct per port, no
//! persistence, no network.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use branchloom_domain::{AttitudeDimension, EntityKey, EntityKind, GameTime, ItemKey, LocationKey, NeedKind, OutcomeTier};

use crate::domain::TurnResult;
use crate::ports::{
    CompletionParams, DiceRoller, EntityRecord, EntityStore, ExitRecord, FactRecord, FactStore, InventoryStore, ItemRecord, LlmClient, LlmError,
    LocationRecord, LocationStore, NeedsStore, RelationshipStore, StoreError, TimeStore, TurnLog,
};

/// In-memory `EntityStore`. Keyed by `EntityKey`; `get_at_location` does a
/// linear scan, which is fine at test scale.
#[derive(Default)]
pub struct InMemoryEntityStore {
    records: DashMap<EntityKey, EntityRecord>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: EntityRecord) {
        self.records.insert(record.key.clone(), record);
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get_by_key(&self, key: &EntityKey) -> Result<EntityRecord, StoreError> {
        self.records
            .get(key)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::not_found("entity", key.as_str()))
    }

    async fn get_at_location(&self, location: &LocationKey) -> Result<Vec<EntityRecord>, StoreError> {
        Ok(self.records.iter().filter(|entry| &entry.location == location).map(|entry| entry.clone()).collect())
    }

    async fn get_by_display_name(&self, name: &str) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self.records.iter().find(|entry| entry.display_name == name).map(|entry| entry.clone()))
    }

    async fn get_companions(&self, _key: &EntityKey) -> Result<Vec<EntityRecord>, StoreError> {
        Ok(vec![])
    }

    async fn create(&self, key: EntityKey, kind: EntityKind, display_name: String) -> Result<(), StoreError> {
        self.records.insert(
            key.clone(),
            EntityRecord {
                key,
                kind,
                display_name,
                location: LocationKey::from(""),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }

    async fn set_location(&self, key: &EntityKey, location: LocationKey) -> Result<(), StoreError> {
        match self.records.get_mut(key) {
            Some(mut entry) => {
                entry.location = location;
                Ok(())
            }
            None => Err(StoreError::not_found("entity", key.as_str())),
        }
    }
}

/// In-memory `InventoryStore`. `holder = None` means the item lies at
/// `location` instead of being carried.
#[derive(Default)]
pub struct InMemoryInventoryStore {
    items: DashMap<ItemKey, (ItemRecord, Option<LocationKey>)>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_at_location(&self, record: ItemRecord, location: LocationKey) {
        self.items.insert(record.key.clone(), (record, Some(location)));
    }

    pub fn seed_held(&self, record: ItemRecord) {
        self.items.insert(record.key.clone(), (record, None));
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn items_at_location(&self, location: &LocationKey) -> Result<Vec<ItemRecord>, StoreError> {
        Ok(self
            .items
            .iter()
            .filter(|entry| entry.1.as_ref() == Some(location))
            .map(|entry| entry.0.clone())
            .collect())
    }

    async fn items_held_by(&self, holder: &EntityKey) -> Result<Vec<ItemRecord>, StoreError> {
        Ok(self
            .items
            .iter()
            .filter(|entry| entry.0.holder.as_ref() == Some(holder))
            .map(|entry| entry.0.clone())
            .collect())
    }

    async fn transfer(&self, from: &EntityKey, to: &EntityKey, item: &ItemKey, quantity: u32) -> Result<(), StoreError> {
        let mut entry = self.items.get_mut(item).ok_or_else(|| StoreError::not_found("item", item.as_str()))?;
        if entry.0.holder.as_ref() != Some(from) {
            return Err(StoreError::Constraint(format!("{} is not held by {}", item.as_str(), from.as_str())));
        }
        if entry.0.quantity < quantity {
            return Err(StoreError::Constraint(format!("insufficient quantity of {}", item.as_str())));
        }
        entry.0.holder = Some(to.clone());
        entry.1 = None;
        Ok(())
    }

    async fn split_stack(&self, item: &ItemKey, amount: u32) -> Result<ItemKey, StoreError> {
        let mut entry = self.items.get_mut(item).ok_or_else(|| StoreError::not_found("item", item.as_str()))?;
        if entry.0.quantity < amount {
            return Err(StoreError::Constraint(format!("insufficient quantity of {}", item.as_str())));
        }
        entry.0.quantity -= amount;
        let new_key = ItemKey::from(format!("{}_split", item.as_str()));
        let mut new_record = entry.0.clone();
        new_record.key = new_key.clone();
        new_record.quantity = amount;
        let holder_location = entry.1.clone();
        drop(entry);
        self.items.insert(new_key.clone(), (new_record, holder_location));
        Ok(new_key)
    }

    async fn merge_stacks(&self, into: &ItemKey, from: &ItemKey) -> Result<(), StoreError> {
        let (record, _) = self.items.remove(from).map(|(_, v)| v).ok_or_else(|| StoreError::not_found("item", from.as_str()))?;
        let mut target = self.items.get_mut(into).ok_or_else(|| StoreError::not_found("item", into.as_str()))?;
        target.0.quantity += record.quantity;
        Ok(())
    }

    async fn create_item(&self, key: ItemKey, display_name: String, stackable: bool, quantity: u32) -> Result<(), StoreError> {
        self.items.insert(
            key.clone(),
            (
                ItemRecord {
                    key,
                    display_name,
                    stackable,
                    quantity,
                    holder: None,
                },
                None,
            ),
        );
        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<(), StoreError> {
        self.items.remove(key);
        Ok(())
    }
}

/// In-memory `LocationStore`. Exits are a static adjacency map seeded up
/// front; `resolve_or_create` never actually mints new locations since the
/// test fixture graph is closed.
#[derive(Default)]
pub struct InMemoryLocationStore {
    locations: DashMap<LocationKey, LocationRecord>,
    exits: DashMap<LocationKey, Vec<ExitRecord>>,
    player_locations: DashMap<EntityKey, LocationKey>,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_location(&self, record: LocationRecord) {
        self.locations.insert(record.key.clone(), record);
    }

    pub fn seed_exit(&self, from: LocationKey, exit: ExitRecord) {
        self.exits.entry(from).or_default().push(exit);
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn get(&self, key: &LocationKey) -> Result<LocationRecord, StoreError> {
        self.locations.get(key).map(|entry| entry.clone()).ok_or_else(|| StoreError::not_found("location", key.as_str()))
    }

    async fn list_exits(&self, key: &LocationKey) -> Result<Vec<ExitRecord>, StoreError> {
        Ok(self.exits.get(key).map(|entry| entry.clone()).unwrap_or_default())
    }

    async fn resolve_or_create(&self, key: &LocationKey) -> Result<LocationRecord, StoreError> {
        if let Some(record) = self.locations.get(key) {
            return Ok(record.clone());
        }
        let record = LocationRecord {
            key: key.clone(),
            display_name: key.as_str().replace('_', " "),
        };
        self.locations.insert(key.clone(), record.clone());
        Ok(record)
    }

    async fn set_player_location(&self, player: &EntityKey, location: LocationKey) -> Result<(), StoreError> {
        self.player_locations.insert(player.clone(), location);
        Ok(())
    }
}

/// In-memory `TimeStore`, starting at a fixed epoch so tests are
/// deterministic without faking `chrono::Utc::now()`.
pub struct InMemoryTimeStore {
    minutes_elapsed: Mutex<i64>,
    epoch: chrono::DateTime<chrono::Utc>,
}

impl InMemoryTimeStore {
    pub fn new(epoch: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            minutes_elapsed: Mutex::new(0),
            epoch,
        }
    }
}

#[async_trait]
impl TimeStore for InMemoryTimeStore {
    async fn advance_minutes(&self, minutes: i64) -> Result<(), StoreError> {
        *self.minutes_elapsed.lock().unwrap() += minutes;
        Ok(())
    }

    async fn get_current(&self) -> Result<GameTime, StoreError> {
        let elapsed = *self.minutes_elapsed.lock().unwrap();
        Ok(GameTime::starting_at(self.epoch + chrono::Duration::minutes(elapsed)))
    }
}

/// In-memory `FactStore`, append-only per subject.
#[derive(Default)]
pub struct InMemoryFactStore {
    facts: DashMap<EntityKey, Vec<FactRecord>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn record(&self, fact: FactRecord) -> Result<(), StoreError> {
        self.facts.entry(fact.subject_key.clone()).or_default().push(fact);
        Ok(())
    }

    async fn list_by_subject(&self, subject: &EntityKey) -> Result<Vec<FactRecord>, StoreError> {
        Ok(self.facts.get(subject).map(|entry| entry.clone()).unwrap_or_default())
    }
}

/// In-memory `RelationshipStore`, clamped to [-100, 100] as defense in
/// depth alongside the post-processor's own clamping.
#[derive(Default)]
pub struct InMemoryRelationshipStore {
    attitudes: DashMap<(EntityKey, EntityKey, AttitudeDimension), i32>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn adjust(&self, from: &EntityKey, to: &EntityKey, dimension: AttitudeDimension, delta: i32) -> Result<i32, StoreError> {
        let mut entry = self.attitudes.entry((from.clone(), to.clone(), dimension)).or_insert(0);
        *entry = (*entry + delta).clamp(-100, 100);
        Ok(*entry)
    }

    async fn get_attitude(&self, from: &EntityKey, to: &EntityKey, dimension: AttitudeDimension) -> Result<i32, StoreError> {
        Ok(self.attitudes.get(&(from.clone(), to.clone(), dimension)).map(|v| *v).unwrap_or(0))
    }
}

/// In-memory `NeedsStore`, clamped to [0, 100] (hunger/thirst/etc. are
/// gauges, not signed deltas like attitudes).
#[derive(Default)]
pub struct InMemoryNeedsStore {
    needs: DashMap<(EntityKey, NeedKind), i32>,
}

impl InMemoryNeedsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, subject: EntityKey, need: NeedKind, value: i32) {
        self.needs.insert((subject, need), value);
    }
}

#[async_trait]
impl NeedsStore for InMemoryNeedsStore {
    async fn adjust(&self, subject: &EntityKey, need: NeedKind, delta: i32) -> Result<i32, StoreError> {
        let mut entry = self.needs.entry((subject.clone(), need)).or_insert(50);
        *entry = (*entry + delta).clamp(0, 100);
        Ok(*entry)
    }

    async fn get_current(&self, subject: &EntityKey, need: NeedKind) -> Result<i32, StoreError> {
        Ok(self.needs.get(&(subject.clone(), need)).map(|v| *v).unwrap_or(50))
    }

    async fn apply_decay(&self, subject: &EntityKey) -> Result<(), StoreError> {
        for need in NeedKind::ALL {
            self.adjust(subject, need, -1).await?;
        }
        Ok(())
    }
}

/// In-memory `TurnLog`, newest last; `list_recent` returns the tail.
#[derive(Default)]
pub struct InMemoryTurnLog {
    entries: Mutex<Vec<TurnResult>>,
}

impl InMemoryTurnLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TurnLog for InMemoryTurnLog {
    async fn append(&self, turn_result: TurnResult) -> Result<(), StoreError> {
        self.entries.lock().unwrap().push(turn_result);
        Ok(())
    }

    async fn list_recent(&self, n: usize, _day_bound: bool) -> Result<Vec<TurnResult>, StoreError> {
        let entries = self.entries.lock().unwrap();
        let start = entries.len().saturating_sub(n);
        Ok(entries[start..].to_vec())
    }
}

/// Scripted `LlmClient`: a FIFO queue of canned responses per call kind,
/// for driving deterministic orchestrator-level tests.
pub struct ScriptedLlmClient {
    completions: Mutex<Vec<String>>,
    structured: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedLlmClient {
    pub fn new(completions: Vec<String>, structured: Vec<serde_json::Value>) -> Self {
        Self {
            completions: Mutex::new(completions),
            structured: Mutex::new(structured),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _prompt: String, _params: CompletionParams) -> Result<String, LlmError> {
        let mut queue = self.completions.lock().unwrap();
        if queue.is_empty() {
            return Err(LlmError::RequestFailed("scripted completions exhausted".into()));
        }
        Ok(queue.remove(0))
    }

    async fn complete_structured(&self, _prompt: String, _schema: serde_json::Value, _params: CompletionParams) -> Result<serde_json::Value, LlmError> {
        let mut queue = self.structured.lock().unwrap();
        if queue.is_empty() {
            return Err(LlmError::RequestFailed("scripted structured responses exhausted".into()));
        }
        Ok(queue.remove(0))
    }
}

/// Dice double backed by a fixed outcome tier, with a formula-parsing
/// fallback (`regex-lite`) for tests that want to assert against a
/// particular dice expression rather than just a tier.
pub struct FixedDiceRoller {
    tier: OutcomeTier,
}

impl FixedDiceRoller {
    pub fn new(tier: OutcomeTier) -> Self {
        Self { tier }
    }

    /// Parses a `NdM+K` formula into `(count, sides, modifier)`. Used by
    /// tests asserting the roller received the expected dice expression
    /// (bell-curve 2d10 by convention), not by production code.
    pub fn parse_formula(formula: &str) -> Option<(u32, u32, i32)> {
        let pattern = regex_lite::Regex::new(r"^(\d+)d(\d+)([+-]\d+)?$").ok()?;
        let captures = pattern.captures(formula)?;
        let count: u32 = captures.get(1)?.as_str().parse().ok()?;
        let sides: u32 = captures.get(2)?.as_str().parse().ok()?;
        let modifier: i32 = captures.get(3).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
        Some((count, sides, modifier))
    }
}

#[async_trait]
impl DiceRoller for FixedDiceRoller {
    async fn roll(&self, _modifiers: i32) -> OutcomeTier {
        self.tier
    }
}
