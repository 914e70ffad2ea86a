//! Narrow interfaces to the external collaborators the core consumes. No
//! implementation lives here — only contracts, expressed as
//! `#[async_trait]` trait objects, plus in-memory doubles under
//! `crate::testing` for the test suite.

pub mod error;

use async_trait::async_trait;
use branchloom_domain::{EntityKey, EntityKind, ItemKey, LocationKey, NeedKind};

pub use error::{LlmError, PipelineError, StoreError};

/// NPCs, players, and creatures.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_by_key(&self, key: &EntityKey) -> Result<EntityRecord, StoreError>;
    async fn get_at_location(&self, location: &LocationKey) -> Result<Vec<EntityRecord>, StoreError>;
    async fn get_by_display_name(&self, name: &str) -> Result<Option<EntityRecord>, StoreError>;
    async fn get_companions(&self, key: &EntityKey) -> Result<Vec<EntityRecord>, StoreError>;
    async fn create(&self, key: EntityKey, kind: EntityKind, display_name: String) -> Result<(), StoreError>;
    async fn delete(&self, key: &EntityKey) -> Result<(), StoreError>;
    async fn set_location(&self, key: &EntityKey, location: LocationKey) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub key: EntityKey,
    pub kind: EntityKind,
    pub display_name: String,
    pub location: LocationKey,
}

/// Items lying in a scene or sitting in an inventory.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn items_at_location(&self, location: &LocationKey) -> Result<Vec<ItemRecord>, StoreError>;
    async fn items_held_by(&self, holder: &EntityKey) -> Result<Vec<ItemRecord>, StoreError>;
    async fn transfer(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        item: &ItemKey,
        quantity: u32,
    ) -> Result<(), StoreError>;
    async fn split_stack(&self, item: &ItemKey, amount: u32) -> Result<ItemKey, StoreError>;
    async fn merge_stacks(&self, into: &ItemKey, from: &ItemKey) -> Result<(), StoreError>;
    async fn create_item(&self, key: ItemKey, display_name: String, stackable: bool, quantity: u32) -> Result<(), StoreError>;
    async fn delete_item(&self, key: &ItemKey) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub key: ItemKey,
    pub display_name: String,
    pub stackable: bool,
    pub quantity: u32,
    pub holder: Option<EntityKey>,
}

/// The world graph: locations and their exits.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn get(&self, key: &LocationKey) -> Result<LocationRecord, StoreError>;
    async fn list_exits(&self, key: &LocationKey) -> Result<Vec<ExitRecord>, StoreError>;
    async fn resolve_or_create(&self, key: &LocationKey) -> Result<LocationRecord, StoreError>;
    async fn set_player_location(&self, player: &EntityKey, location: LocationKey) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub key: LocationKey,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRecord {
    pub exit_key: branchloom_domain::ExitKey,
    pub destination_key: LocationKey,
    pub display: String,
    pub direction: Option<String>,
}

/// The shared in-game clock.
#[async_trait]
pub trait TimeStore: Send + Sync {
    async fn advance_minutes(&self, minutes: i64) -> Result<(), StoreError>;
    async fn get_current(&self) -> Result<branchloom_domain::GameTime, StoreError>;
}

/// Recorded facts about entities and the world.
#[async_trait]
pub trait FactStore: Send + Sync {
    async fn record(&self, fact: FactRecord) -> Result<(), StoreError>;
    async fn list_by_subject(&self, subject: &EntityKey) -> Result<Vec<FactRecord>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactRecord {
    pub subject_type: EntityKind,
    pub subject_key: EntityKey,
    pub predicate: String,
    pub value: String,
    pub category: branchloom_domain::FactCategory,
}

/// Attitude dimensions between two entities.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn adjust(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        dimension: branchloom_domain::AttitudeDimension,
        delta: i32,
    ) -> Result<i32, StoreError>;
    async fn get_attitude(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        dimension: branchloom_domain::AttitudeDimension,
    ) -> Result<i32, StoreError>;
}

/// Needs (hunger, thirst, ...) tracked per entity; clamps enforced here as
/// defense in depth.
#[async_trait]
pub trait NeedsStore: Send + Sync {
    async fn adjust(&self, subject: &EntityKey, need: NeedKind, delta: i32) -> Result<i32, StoreError>;
    async fn get_current(&self, subject: &EntityKey, need: NeedKind) -> Result<i32, StoreError>;
    async fn apply_decay(&self, subject: &EntityKey) -> Result<(), StoreError>;
}

/// Append-only per-turn log.
#[async_trait]
pub trait TurnLog: Send + Sync {
    async fn append(&self, turn_result: crate::domain::TurnResult) -> Result<(), StoreError>;
    async fn list_recent(&self, n: usize, day_bound: bool) -> Result<Vec<crate::domain::TurnResult>, StoreError>;
}

/// The LLM call surface. Both methods may fail transiently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: String, params: CompletionParams) -> Result<String, LlmError>;
    async fn complete_structured(
        &self,
        prompt: String,
        schema: serde_json::Value,
        params: CompletionParams,
    ) -> Result<serde_json::Value, LlmError>;
}

#[derive(Debug, Clone, Default)]
pub struct CompletionParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Dice resolution. Bell-curve 2d10 by project convention; implemented
/// externally.
#[async_trait]
pub trait DiceRoller: Send + Sync {
    async fn roll(&self, modifiers: i32) -> branchloom_domain::OutcomeTier;
}
