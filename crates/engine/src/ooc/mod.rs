//! OOC Handler: fast-path answers for a closed set of meta-questions, with a
//! single LLM fallback for anything else.

use std::sync::Arc;

use branchloom_domain::EntityKey;

use crate::domain::{Manifest, TurnResult};
use crate::ports::{CompletionParams, InventoryStore, LlmClient, NeedsStore, TimeStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OocCategory {
    Exits,
    Time,
    Inventory,
    Location,
    NpcsPresent,
    Stats,
    Help,
    Unknown,
}

pub struct OocHandler {
    time: Arc<dyn TimeStore>,
    inventory: Arc<dyn InventoryStore>,
    needs: Arc<dyn NeedsStore>,
    llm: Arc<dyn LlmClient>,
}

impl OocHandler {
    pub fn new(time: Arc<dyn TimeStore>, inventory: Arc<dyn InventoryStore>, needs: Arc<dyn NeedsStore>, llm: Arc<dyn LlmClient>) -> Self {
        Self { time, inventory, needs, llm }
    }

    fn categorize(query: &str) -> OocCategory {
        let lower = query.to_ascii_lowercase();
        if lower.contains("exit") || lower.contains("where can i go") {
            OocCategory::Exits
        } else if lower.contains("time") || lower.contains("what day") {
            OocCategory::Time
        } else if lower.contains("inventory") || lower.contains("carrying") || lower.contains("holding") {
            OocCategory::Inventory
        } else if lower.contains("where am i") {
            OocCategory::Location
        } else if lower.contains("who") && (lower.contains("here") || lower.contains("present")) {
            OocCategory::NpcsPresent
        } else if lower.contains("stat") || lower.contains("hunger") || lower.contains("thirst") || lower.contains("need") {
            OocCategory::Stats
        } else if lower.contains("help") || lower.contains("command") {
            OocCategory::Help
        } else {
            OocCategory::Unknown
        }
    }

    /// OOC turns never mutate state or advance time; the returned
    /// TurnResult always has `is_ooc = true` and empty deltas.
    pub async fn handle(&self, query: &str, player_key: &EntityKey, manifest: &Manifest) -> TurnResult {
        let narrative = match Self::categorize(query) {
            OocCategory::Exits => self.answer_exits(manifest),
            OocCategory::Time => self.answer_time().await,
            OocCategory::Inventory => self.answer_inventory(player_key).await,
            OocCategory::Location => manifest.location_display.clone(),
            OocCategory::NpcsPresent => self.answer_npcs_present(manifest),
            OocCategory::Stats => self.answer_stats(player_key, manifest).await,
            OocCategory::Help => {
                "You can move through exits, interact with people and items, or ask out-of-character \
                 questions about exits, time, inventory, location, who's present, or your stats."
                    .to_string()
            }
            OocCategory::Unknown => self.answer_via_llm(query, manifest).await,
        };

        TurnResult::builder().narrative(narrative).ooc(true).build()
    }

    fn answer_exits(&self, manifest: &Manifest) -> String {
        if manifest.exits.is_empty() {
            return "There is no way out from here.".to_string();
        }
        let list: Vec<String> = manifest.exits.values().map(|exit| exit.display.clone()).collect();
        format!("You can go: {}.", list.join(", "))
    }

    async fn answer_time(&self) -> String {
        match self.time.get_current().await {
            Ok(time) => format!("It is {} ({}).", time.display_time(), time.time_of_day().display_name()),
            Err(_) => "You're not sure what time it is.".to_string(),
        }
    }

    async fn answer_inventory(&self, player_key: &EntityKey) -> String {
        match self.inventory.items_held_by(player_key).await {
            Ok(items) if items.is_empty() => "You aren't carrying anything.".to_string(),
            Ok(items) => {
                let list: Vec<String> = items
                    .iter()
                    .map(|item| if item.quantity > 1 { format!("{}x {}", item.quantity, item.display_name) } else { item.display_name.clone() })
                    .collect();
                format!("You're carrying: {}.", list.join(", "))
            }
            Err(_) => "You can't recall what you're carrying.".to_string(),
        }
    }

    fn answer_npcs_present(&self, manifest: &Manifest) -> String {
        if manifest.entities.is_empty() {
            return "No one else is here.".to_string();
        }
        let list: Vec<String> = manifest.entities.values().map(|e| e.display.clone()).collect();
        format!("Present: {}.", list.join(", "))
    }

    async fn answer_stats(&self, player_key: &EntityKey, manifest: &Manifest) -> String {
        let mut parts = Vec::new();
        for need in &manifest.valid_needs {
            if let Ok(value) = self.needs.get_current(player_key, *need).await {
                parts.push(format!("{need}: {value}"));
            }
        }
        if parts.is_empty() {
            "You have no stats to report.".to_string()
        } else {
            parts.join(", ")
        }
    }

    async fn answer_via_llm(&self, query: &str, manifest: &Manifest) -> String {
        let prompt = format!(
            "The player asked an out-of-character question, answer briefly in GM voice without advancing the story.\n\
             Location: {}\nQuestion: {query}",
            manifest.location_display
        );
        self.llm
            .complete(prompt, CompletionParams::default())
            .await
            .unwrap_or_else(|_| "I'm not sure how to answer that.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{CompletionParams as Params, EntityRecord, ExitRecord, FactRecord, ItemRecord, LlmError, LocationRecord, StoreError};
    use async_trait::async_trait;
    use branchloom_domain::{GameTime, ItemKey, LocationKey, NeedKind};
    use std::collections::{BTreeMap, BTreeSet};

    struct StubTime;
    #[async_trait]
    impl TimeStore for StubTime {
        async fn advance_minutes(&self, _minutes: i64) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_current(&self) -> Result<GameTime, StoreError> {
            Ok(GameTime::starting_at(chrono::Utc::now()))
        }
    }

    struct StubInventory;
    #[async_trait]
    impl InventoryStore for StubInventory {
        async fn items_at_location(&self, _location: &LocationKey) -> Result<Vec<ItemRecord>, StoreError> {
            Ok(vec![])
        }
        async fn items_held_by(&self, _holder: &EntityKey) -> Result<Vec<ItemRecord>, StoreError> {
            Ok(vec![ItemRecord {
                key: ItemKey::from("copper_coin"),
                display_name: "a copper coin".into(),
                stackable: true,
                quantity: 3,
                holder: None,
            }])
        }
        async fn transfer(&self, _from: &EntityKey, _to: &EntityKey, _item: &ItemKey, _quantity: u32) -> Result<(), StoreError> {
            Ok(())
        }
        async fn split_stack(&self, item: &ItemKey, _amount: u32) -> Result<ItemKey, StoreError> {
            Ok(item.clone())
        }
        async fn merge_stacks(&self, _into: &ItemKey, _from: &ItemKey) -> Result<(), StoreError> {
            Ok(())
        }
        async fn create_item(&self, _key: ItemKey, _display_name: String, _stackable: bool, _quantity: u32) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_item(&self, _key: &ItemKey) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct StubNeeds;
    #[async_trait]
    impl NeedsStore for StubNeeds {
        async fn adjust(&self, _subject: &EntityKey, _need: NeedKind, delta: i32) -> Result<i32, StoreError> {
            Ok(delta)
        }
        async fn get_current(&self, _subject: &EntityKey, _need: NeedKind) -> Result<i32, StoreError> {
            Ok(42)
        }
        async fn apply_decay(&self, _subject: &EntityKey) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct StubLlm;
    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _prompt: String, _params: Params) -> Result<String, LlmError> {
            Ok("That's an interesting question, traveler.".to_string())
        }
        async fn complete_structured(&self, _prompt: String, _schema: serde_json::Value, _params: Params) -> Result<serde_json::Value, LlmError> {
            unimplemented!()
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            session_id: branchloom_domain::SessionId::new(),
            turn_number: 1,
            location_key: LocationKey::from("village_square"),
            location_display: "the square".into(),
            entities: BTreeMap::new(),
            items: BTreeMap::new(),
            exits: BTreeMap::new(),
            candidate_locations: BTreeSet::new(),
            additional_valid_keys: BTreeSet::new(),
            valid_needs: vec![NeedKind::Hunger],
            valid_entity_types: vec![],
            valid_fact_categories: vec![],
            valid_attitude_dimensions: vec![],
        }
    }

    fn handler() -> OocHandler {
        OocHandler::new(Arc::new(StubTime), Arc::new(StubInventory), Arc::new(StubNeeds), Arc::new(StubLlm))
    }

    #[tokio::test]
    async fn ooc_turn_never_advances_time_or_applies_deltas() {
        let result = handler().handle("what's in my inventory?", &EntityKey::from("player"), &manifest()).await;
        assert!(result.is_ooc);
        assert_eq!(result.time_advanced, 0);
        assert!(result.applied_deltas.is_empty());
    }

    #[tokio::test]
    async fn inventory_query_lists_held_items() {
        let result = handler().handle("what am I carrying?", &EntityKey::from("player"), &manifest()).await;
        assert!(result.narrative.contains("3x a copper coin"));
    }

    #[tokio::test]
    async fn stats_query_reports_needs_from_manifest_valid_needs() {
        let result = handler().handle("how are my stats?", &EntityKey::from("player"), &manifest()).await;
        assert!(result.narrative.contains("hunger"));
    }

    #[tokio::test]
    async fn unrecognized_query_falls_through_to_llm() {
        let result = handler().handle("do you like cats?", &EntityKey::from("player"), &manifest()).await;
        assert_eq!(result.narrative, "That's an interesting question, traveler.");
    }
}
