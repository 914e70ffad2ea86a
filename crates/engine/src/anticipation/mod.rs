//! Anticipation Engine: a bounded worker pool that precomputes branch sets
//! for likely next actions after each committed turn.

use std::sync::Arc;

use branchloom_domain::SessionId;
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::branching::BranchGenerator;
use crate::cache::{fingerprint::fingerprint, BranchCache, CacheLookup};
use crate::matching::ActionPredictor;
use crate::domain::{Intent, IntentType, Manifest};
use crate::postprocess::DeltaPostProcessor;

pub struct AnticipationEngine {
    generator: Arc<BranchGenerator>,
    postprocessor: Arc<DeltaPostProcessor>,
    cache: Arc<BranchCache>,
    tokens: DashMap<SessionId, CancellationToken>,
    semaphores: DashMap<SessionId, Arc<Semaphore>>,
    breadth: usize,
    workers_per_session: usize,
    ref_based: bool,
}

impl AnticipationEngine {
    pub fn new(
        generator: Arc<BranchGenerator>,
        postprocessor: Arc<DeltaPostProcessor>,
        cache: Arc<BranchCache>,
        breadth: usize,
        workers_per_session: usize,
        ref_based: bool,
    ) -> Self {
        Self {
            generator,
            postprocessor,
            cache,
            tokens: DashMap::new(),
            semaphores: DashMap::new(),
            breadth,
            workers_per_session,
            ref_based,
        }
    }

    /// Cancel any in-flight anticipation work for `session_id` on a
    /// best-effort basis, then seed fresh workers against `manifest`.
    pub fn seed(self: &Arc<Self>, session_id: SessionId, manifest: Arc<Manifest>) {
        if let Some((_, previous)) = self.tokens.remove(&session_id) {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.tokens.insert(session_id, token.clone());

        let semaphore = self
            .semaphores
            .entry(session_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.workers_per_session)))
            .clone();

        let candidates = ActionPredictor::predict(&manifest, self.breadth);
        let manifest_digest = manifest.digest();

        for candidate in candidates {
            let engine = self.clone();
            let token = token.clone();
            let semaphore = semaphore.clone();
            let manifest = manifest.clone();
            let manifest_digest = manifest_digest.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if token.is_cancelled() {
                    return;
                }

                let intent = Intent {
                    intent_type: IntentType::Action,
                    verb: candidate.verb.clone(),
                    target_ref: candidate.target_key.clone(),
                    target_text: None,
                    modifiers: Default::default(),
                };
                let normalized_action_key = intent.normalized_action_key();
                let key_fingerprint = fingerprint(&manifest_digest, &normalized_action_key, &candidate.label);

                if matches!(engine.cache.get(session_id, &key_fingerprint), CacheLookup::Hit(_)) {
                    return;
                }

                let branch_set = tokio::select! {
                    result = engine.generator.generate(&manifest, &intent, &candidate.label, engine.ref_based) => result,
                    _ = token.cancelled() => return,
                };

                let Ok(branch_set) = branch_set else {
                    return;
                };

                let mut processed_variants = Vec::with_capacity(branch_set.variants.len());
                for variant in &branch_set.variants {
                    let outcome = engine.postprocessor.process(variant, &manifest).await;
                    processed_variants.push(crate::branching::single_variant_branch(
                        variant.variant_id.clone(),
                        variant.outcome_tier,
                        outcome.deltas,
                        variant.narrative_hint.clone(),
                    ));
                }

                if token.is_cancelled() {
                    return;
                }

                let branch_set = crate::domain::branch::BranchSet {
                    variants: processed_variants,
                    ..branch_set
                };
                engine.cache.put(session_id, key_fingerprint, branch_set);
            });
        }
    }

    pub fn drop_session(&self, session_id: SessionId) {
        if let Some((_, token)) = self.tokens.remove(&session_id) {
            token.cancel();
        }
        self.semaphores.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{CompletionParams, LlmClient, LlmError};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct StubLlm;
    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _prompt: String, _params: CompletionParams) -> Result<String, LlmError> {
            Ok("unused".into())
        }
        async fn complete_structured(&self, _prompt: String, _schema: serde_json::Value, _params: CompletionParams) -> Result<serde_json::Value, LlmError> {
            Ok(serde_json::json!({
                "variants": [{"variant_id": "success", "outcome_tier": "success", "deltas": [], "narrative_hint": "ok"}],
                "required_roll": false
            }))
        }
    }

    fn empty_manifest() -> Arc<Manifest> {
        Arc::new(Manifest {
            session_id: SessionId::new(),
            turn_number: 1,
            location_key: branchloom_domain::LocationKey::from("village_square"),
            location_display: "the square".into(),
            entities: BTreeMap::new(),
            items: BTreeMap::new(),
            exits: {
                let mut exits = BTreeMap::new();
                exits.insert(
                    branchloom_domain::ExitKey::from("to_tavern"),
                    crate::domain::manifest::ManifestExit {
                        destination_key: branchloom_domain::LocationKey::from("village_tavern"),
                        display: "the tavern".into(),
                        direction: None,
                    },
                );
                exits
            },
            candidate_locations: Default::default(),
            additional_valid_keys: Default::default(),
            valid_needs: vec![],
            valid_entity_types: vec![],
            valid_fact_categories: vec![],
            valid_attitude_dimensions: vec![],
        })
    }

    #[tokio::test]
    async fn seeding_populates_the_cache_for_a_predicted_candidate() {
        let generator = Arc::new(BranchGenerator::new(Arc::new(StubLlm)));
        let postprocessor = Arc::new(DeltaPostProcessor::new(None, 0.78));
        let cache = Arc::new(BranchCache::new(64, Duration::from_secs(60)));
        let engine = Arc::new(AnticipationEngine::new(generator, postprocessor, cache.clone(), 3, 2, true));

        let manifest = empty_manifest();
        let session_id = manifest.session_id;
        engine.seed(session_id, manifest.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;

        let digest = manifest.digest();
        let key = fingerprint(&digest, "go:to_tavern", "go to the tavern");
        assert!(matches!(cache.get(session_id, &key), CacheLookup::Hit(_)));
    }

    #[tokio::test]
    async fn reseeding_cancels_previous_in_flight_work() {
        let generator = Arc::new(BranchGenerator::new(Arc::new(StubLlm)));
        let postprocessor = Arc::new(DeltaPostProcessor::new(None, 0.78));
        let cache = Arc::new(BranchCache::new(64, Duration::from_secs(60)));
        let engine = Arc::new(AnticipationEngine::new(generator, postprocessor, cache, 3, 2, true));

        let manifest = empty_manifest();
        let session_id = manifest.session_id;
        engine.seed(session_id, manifest.clone());
        // Reseeding immediately must not panic even though the first batch
        // may still be in flight.
        engine.seed(session_id, manifest);
    }
}
