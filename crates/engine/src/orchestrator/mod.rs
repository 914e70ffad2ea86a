//! Pipeline Orchestrator: the phased state machine driving one call to
//! `process_turn`.
//!
//! `START -> CLASSIFY -> (OOC_HANDLE | MATCH -> CACHE_LOOKUP ->
//! (POSTPROCESS on Hit | GENERATE -> POSTPROCESS)) -> VALIDATE_DELTAS ->
//! (COLLAPSE | GENERATE once more | DEGRADE) -> COLLAPSE -> NARRATE ->
//! COMMIT -> SEED_ANTICIPATION -> END`.

use std::sync::Arc;

use branchloom_domain::{EntityKey, LocationKey, SessionId};

use crate::anticipation::AnticipationEngine;
use crate::branching::BranchGenerator;
use crate::cache::{fingerprint::fingerprint, BranchCache, CacheLookup};
use crate::collapse::{CollapseManager, CollapseOutcome};
use crate::config::PipelineConfig;
use crate::grounding::ContextBuilder;
use crate::intent::IntentClassifier;
use crate::matching::{ActionMatcher, ActionPredictor};
use crate::narration::Narrator;
use crate::ooc::OocHandler;
use crate::domain::{BranchSet, ProcessTurnOptions, TurnResult};
use crate::postprocess::DeltaPostProcessor;
use crate::ports::{EntityStore, PipelineError, TurnLog};
use crate::validation::DeltaValidator;

pub struct PipelineOrchestrator {
    entities: Arc<dyn EntityStore>,
    context_builder: Arc<ContextBuilder>,
    intent_classifier: Arc<IntentClassifier>,
    branch_cache: Arc<BranchCache>,
    branch_generator: Arc<BranchGenerator>,
    postprocessor: Arc<DeltaPostProcessor>,
    collapse_manager: Arc<CollapseManager>,
    narrator: Arc<Narrator>,
    ooc_handler: Arc<OocHandler>,
    turn_log: Arc<dyn TurnLog>,
    anticipation: Option<Arc<AnticipationEngine>>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entities: Arc<dyn EntityStore>,
        context_builder: Arc<ContextBuilder>,
        intent_classifier: Arc<IntentClassifier>,
        branch_cache: Arc<BranchCache>,
        branch_generator: Arc<BranchGenerator>,
        postprocessor: Arc<DeltaPostProcessor>,
        collapse_manager: Arc<CollapseManager>,
        narrator: Arc<Narrator>,
        ooc_handler: Arc<OocHandler>,
        turn_log: Arc<dyn TurnLog>,
        anticipation: Option<Arc<AnticipationEngine>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            entities,
            context_builder,
            intent_classifier,
            branch_cache,
            branch_generator,
            postprocessor,
            collapse_manager,
            narrator,
            ooc_handler,
            turn_log,
            anticipation,
            config,
        }
    }

    pub async fn process_turn(
        &self,
        session_id: SessionId,
        turn_number: u64,
        player_key: EntityKey,
        player_input: String,
        options: ProcessTurnOptions,
        known_locations: &[(LocationKey, String)],
    ) -> TurnResult {
        let player = match self.entities.get_by_key(&player_key).await {
            Ok(record) => record,
            Err(err) => return self.commit_degraded(PipelineError::from(err)).await,
        };

        let mut manifest = match self
            .context_builder
            .build(
                session_id,
                turn_number,
                &player_key,
                &player.location,
                Some(&player_input),
                known_locations,
                self.config.unknown_key_rewrite_threshold,
            )
            .await
        {
            Ok(manifest) => manifest,
            Err(err) => return self.commit_degraded(PipelineError::from(err)).await,
        };

        let scene_hint = manifest.entities.values().map(|e| e.display.clone()).collect::<Vec<_>>().join(", ");
        let intent = self.intent_classifier.classify(&player_input, &scene_hint).await;

        if intent.is_ooc() {
            let result = self.ooc_handler.handle(&player_input, &player_key, &manifest).await;
            self.turn_log.append(result.clone()).await.ok();
            return result;
        }

        let max_candidates = options.max_actions_per_cycle.unwrap_or(8);
        let min_confidence = options.min_match_confidence.unwrap_or(self.config.min_match_confidence);
        let candidates = ActionPredictor::predict(&manifest, max_candidates);
        let matcher = ActionMatcher::new(min_confidence);
        let (matched_candidate_key, _confidence) = matcher.match_intent(&intent, &candidates);

        // Prefer the Matcher's resolved `verb:target_key` form so this turn's
        // fingerprint agrees with the one the Anticipation Engine seeded the
        // cache under for the same candidate (anticipation/mod.rs). Falling
        // back to the classifier's raw key keeps cache lookups working for
        // intents the Matcher couldn't resolve to any candidate.
        let normalized_action_key = matched_candidate_key.unwrap_or_else(|| intent.normalized_action_key());
        let manifest_digest = manifest.digest();
        let fp = fingerprint(&manifest_digest, &normalized_action_key, &player_input);

        let mut branch_set = match self.branch_cache.get(session_id, &fp) {
            CacheLookup::Hit(set) => set,
            CacheLookup::Miss => {
                match self.branch_generator.generate(&manifest, &intent, &player_input, options.ref_based).await {
                    Ok(set) => set,
                    Err(err) => return self.commit_degraded(PipelineError::from(err)).await,
                }
            }
        };

        let mut regenerated_once = false;
        loop {
            let (processed, needs_regeneration, validator_failed, created_keys) = self.postprocess_and_validate(&branch_set, &manifest).await;
            branch_set.variants = processed;
            manifest.additional_valid_keys.extend(created_keys);

            if !needs_regeneration && !validator_failed {
                break;
            }
            if regenerated_once {
                return self
                    .commit_degraded(PipelineError::SemanticConflict("delta batch failed validation twice".into()))
                    .await;
            }
            regenerated_once = true;
            branch_set = match self.branch_generator.generate(&manifest, &intent, &player_input, options.ref_based).await {
                Ok(set) => set,
                Err(err) => return self.commit_degraded(PipelineError::from(err)).await,
            };
        }

        self.branch_cache.put(session_id, fp, branch_set.clone());

        let skill_modifier = 0;
        let mut result = match self.collapse_manager.collapse(&branch_set, &player_key, skill_modifier).await {
            CollapseOutcome::Applied(result) => result,
            CollapseOutcome::NoMatchingVariant(tier) => {
                return self
                    .commit_degraded(PipelineError::SemanticConflict(format!("no branch variant for rolled tier {tier}")))
                    .await
            }
            CollapseOutcome::TransactionFailed { error, .. } => return self.commit_degraded(PipelineError::from(error)).await,
        };

        let (narrative, violation) = self.narrator.narrate(&result, &manifest).await;
        result.narrative = narrative;
        if let Some(violation) = violation {
            result.errors.push(violation);
        }
        self.turn_log.append(result.clone()).await.ok();

        if options.anticipation {
            if let Some(engine) = &self.anticipation {
                engine.seed(session_id, Arc::new(manifest));
            }
        }

        result
    }

    /// Runs every variant's deltas through the Delta Post-Processor, then the
    /// Delta Validator. Returns the processed variants, whether a
    /// regeneration is required, and every key the post-processor created
    /// (ambient NPCs, auto-injected parents) so the caller can fold them
    /// into the manifest before narration references them.
    async fn postprocess_and_validate(
        &self,
        branch_set: &BranchSet,
        manifest: &crate::domain::Manifest,
    ) -> (Vec<crate::domain::Branch>, bool, bool, std::collections::BTreeSet<EntityKey>) {
        let mut processed = Vec::with_capacity(branch_set.variants.len());
        let mut needs_regeneration = false;
        let mut validator_failed = false;
        let mut created_keys = std::collections::BTreeSet::new();

        for variant in &branch_set.variants {
            let outcome = self.postprocessor.process(variant, manifest).await;
            needs_regeneration |= outcome.needs_regeneration;
            created_keys.extend(outcome.additional_created_keys);

            let rebuilt = crate::branching::single_variant_branch(
                variant.variant_id.clone(),
                variant.outcome_tier,
                outcome.deltas,
                variant.narrative_hint.clone(),
            );

            if !DeltaValidator::validate(&rebuilt, manifest).is_empty() {
                validator_failed = true;
            }

            processed.push(rebuilt);
        }

        (processed, needs_regeneration, validator_failed, created_keys)
    }

    async fn commit_degraded(&self, error: PipelineError) -> TurnResult {
        tracing::warn!(error = %error, "degrading turn");
        let result = TurnResult::degraded(&error);
        self.turn_log.append(result.clone()).await.ok();
        result
    }
}
