//! Shared orchestrator wiring for the scenario tests in this module: every
//! port backed by its `crate::testing` in-memory double, a scripted LLM, and
//! a fixed dice roller, so each scenario only has to seed world state and
//! script the two or three LLM calls it expects.

use std::sync::Arc;
use std::time::Duration;

use branchloom_domain::OutcomeTier;

use crate::anticipation::AnticipationEngine;
use crate::branching::BranchGenerator;
use crate::cache::BranchCache;
use crate::collapse::CollapseManager;
use crate::config::PipelineConfig;
use crate::grounding::ContextBuilder;
use crate::intent::IntentClassifier;
use crate::narration::Narrator;
use crate::ooc::OocHandler;
use crate::orchestrator::PipelineOrchestrator;
use crate::ports::LlmClient;
use crate::postprocess::DeltaPostProcessor;
use crate::testing::{
    FixedDiceRoller, InMemoryEntityStore, InMemoryFactStore, InMemoryInventoryStore, InMemoryLocationStore, InMemoryNeedsStore,
    InMemoryRelationshipStore, InMemoryTimeStore, InMemoryTurnLog, ScriptedLlmClient,
};

pub struct Harness {
    pub entities: Arc<InMemoryEntityStore>,
    pub inventory: Arc<InMemoryInventoryStore>,
    pub locations: Arc<InMemoryLocationStore>,
    pub time: Arc<InMemoryTimeStore>,
    pub facts: Arc<InMemoryFactStore>,
    pub relationships: Arc<InMemoryRelationshipStore>,
    pub needs: Arc<InMemoryNeedsStore>,
    pub turn_log: Arc<InMemoryTurnLog>,
    pub branch_cache: Arc<BranchCache>,
    pub llm: Arc<ScriptedLlmClient>,
    pub context_builder: Arc<ContextBuilder>,
}

impl Harness {
    /// `structured` and `completions` seed the scripted LLM's FIFO queues in
    /// call order: one structured response per classify/generate call, one
    /// plain-text completion per narrator attempt.
    pub fn new(structured: Vec<serde_json::Value>, completions: Vec<String>) -> Self {
        let entities = Arc::new(InMemoryEntityStore::new());
        let inventory = Arc::new(InMemoryInventoryStore::new());
        let locations = Arc::new(InMemoryLocationStore::new());
        let time = Arc::new(InMemoryTimeStore::new(chrono::Utc::now()));
        let facts = Arc::new(InMemoryFactStore::new());
        let relationships = Arc::new(InMemoryRelationshipStore::new());
        let needs = Arc::new(InMemoryNeedsStore::new());
        let turn_log = Arc::new(InMemoryTurnLog::new());
        let branch_cache = Arc::new(BranchCache::new(64, Duration::from_secs(300)));
        let llm = Arc::new(ScriptedLlmClient::new(completions, structured));
        let context_builder = Arc::new(ContextBuilder::new(entities.clone(), inventory.clone(), locations.clone()));

        Self {
            entities,
            inventory,
            locations,
            time,
            facts,
            relationships,
            needs,
            turn_log,
            branch_cache,
            llm,
            context_builder,
        }
    }

    /// Assembles the real `PipelineOrchestrator` over every seeded double.
    /// `dice_tier` is the outcome the fixed dice roller always returns.
    pub fn orchestrator(&self, dice_tier: OutcomeTier, anticipation: Option<Arc<AnticipationEngine>>) -> PipelineOrchestrator {
        let llm: Arc<dyn LlmClient> = self.llm.clone();
        let intent_classifier = Arc::new(IntentClassifier::new(llm.clone()));
        let branch_generator = Arc::new(BranchGenerator::new(llm.clone()));
        let postprocessor = Arc::new(DeltaPostProcessor::new(None, 0.78));
        let collapse_manager = Arc::new(CollapseManager::new(
            self.entities.clone(),
            self.inventory.clone(),
            self.locations.clone(),
            self.time.clone(),
            self.facts.clone(),
            self.relationships.clone(),
            self.needs.clone(),
            Arc::new(FixedDiceRoller::new(dice_tier)),
        ));
        let narrator = Arc::new(Narrator::new(llm.clone()));
        let ooc_handler = Arc::new(OocHandler::new(self.time.clone(), self.inventory.clone(), self.needs.clone(), llm));

        PipelineOrchestrator::new(
            self.entities.clone(),
            self.context_builder.clone(),
            intent_classifier,
            self.branch_cache.clone(),
            branch_generator,
            postprocessor,
            collapse_manager,
            narrator,
            ooc_handler,
            self.turn_log.clone(),
            anticipation,
            PipelineConfig::default(),
        )
    }
}

/// A structured classify response: `{"type": "action", "verb": ..., "target_ref": ..., "target_text": null}`.
pub fn classify_action(verb: &str, target_ref: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "action",
        "verb": verb,
        "target_ref": target_ref,
        "target_text": null,
    })
}

/// A structured branch-generation response with a single, always-selected
/// variant carrying `deltas`.
pub fn single_variant(deltas: serde_json::Value, hint: &str) -> serde_json::Value {
    serde_json::json!({
        "variants": [{
            "variant_id": "only",
            "outcome_tier": "success",
            "deltas": deltas,
            "narrative_hint": hint,
        }],
        "required_roll": false,
    })
}
