//! Branch Generator: LLM call proposing outcome-variant branches constrained
//! by the manifest.

use std::sync::Arc;

use serde::Deserialize;

use crate::domain::{Branch, BranchSet, Intent, Manifest, StateDelta};
use crate::ports::{CompletionParams, LlmClient, LlmError};

pub struct BranchGenerator {
    llm: Arc<dyn LlmClient>,
}

#[derive(Debug, Deserialize)]
struct RawBranchSet {
    variants: Vec<Branch>,
    required_roll: bool,
}

impl BranchGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// `ref_based` mirrors `process_turn`'s `ref_based` option: when true,
    /// the prompt instructs the LLM to prefer short refs over full keys.
    pub async fn generate(
        &self,
        manifest: &Manifest,
        intent: &Intent,
        player_input: &str,
        ref_based: bool,
    ) -> Result<BranchSet, LlmError> {
        let prompt = self.build_prompt(manifest, intent, player_input, ref_based);
        let response = self
            .llm
            .complete_structured(prompt, serde_json::json!({}), CompletionParams::default())
            .await?;
        let raw: RawBranchSet =
            serde_json::from_value(response).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if raw.variants.is_empty() {
            return Err(LlmError::InvalidResponse("branch set has no variants".into()));
        }

        Ok(BranchSet::new(raw.variants, raw.required_roll))
    }

    fn build_prompt(&self, manifest: &Manifest, intent: &Intent, player_input: &str, ref_based: bool) -> String {
        let entity_refs: Vec<String> = manifest
            .entities
            .iter()
            .map(|(key, e)| format!("{} => {} ({})", e.short_ref, key.as_str(), e.display))
            .collect();
        let exit_refs: Vec<String> = manifest
            .exits
            .iter()
            .map(|(key, e)| format!("{} -> {} ({})", key.as_str(), e.destination_key.as_str(), e.display))
            .collect();

        format!(
            "You are proposing state-delta branches for a turn.\n\
             Location: {} ({})\n\
             Entities: {}\n\
             Exits: {}\n\
             Intent: verb={} target={:?}\n\
             Player input: {player_input}\n\
             Rules: deltas may only reference manifest keys or keys you CREATE_ENTITY in this same batch.\n\
             {}\n\
             Emit JSON: {{\"variants\": [...], \"required_roll\": bool}}",
            manifest.location_key.as_str(),
            manifest.location_display,
            entity_refs.join(", "),
            exit_refs.join(", "),
            intent.verb,
            intent.target_ref,
            if ref_based {
                "Prefer short refs over full keys where refs suffice."
            } else {
                "Full keys are permitted."
            },
        )
    }
}

/// Convenience for constructing a well-formed branch when wiring the
/// generator into the orchestrator's deterministic test doubles.
pub fn single_variant_branch(variant_id: impl Into<String>, tier: branchloom_domain::OutcomeTier, deltas: Vec<StateDelta>, hint: impl Into<String>) -> Branch {
    Branch {
        variant_id: variant_id.into(),
        outcome_tier: tier,
        deltas,
        narrative_hint: hint.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::IntentType;
    use async_trait::async_trait;
    use branchloom_domain::OutcomeTier;
    use std::collections::{BTreeMap, BTreeSet};

    struct StubLlm {
        response: serde_json::Value,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _prompt: String, _params: CompletionParams) -> Result<String, LlmError> {
            Ok("unused".into())
        }

        async fn complete_structured(
            &self,
            _prompt: String,
            _schema: serde_json::Value,
            _params: CompletionParams,
        ) -> Result<serde_json::Value, LlmError> {
            Ok(self.response.clone())
        }
    }

    fn empty_manifest() -> Manifest {
        Manifest {
            session_id: branchloom_domain::SessionId::new(),
            turn_number: 1,
            location_key: branchloom_domain::LocationKey::from("village_square"),
            location_display: "the square".into(),
            entities: BTreeMap::new(),
            items: BTreeMap::new(),
            exits: BTreeMap::new(),
            candidate_locations: BTreeSet::new(),
            additional_valid_keys: BTreeSet::new(),
            valid_needs: vec![],
            valid_entity_types: vec![],
            valid_fact_categories: vec![],
            valid_attitude_dimensions: vec![],
        }
    }

    #[tokio::test]
    async fn generates_branch_set_from_well_formed_llm_response() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({
                "variants": [{
                    "variant_id": "success",
                    "outcome_tier": "success",
                    "deltas": [],
                    "narrative_hint": "you succeed"
                }],
                "required_roll": false
            }),
        });
        let generator = BranchGenerator::new(llm);
        let manifest = empty_manifest();
        let intent = Intent::new(IntentType::Action, "wait");
        let branch_set = generator.generate(&manifest, &intent, "wait", true).await.unwrap();
        assert_eq!(branch_set.variants.len(), 1);
        assert_eq!(branch_set.variants[0].outcome_tier, OutcomeTier::Success);
    }

    #[tokio::test]
    async fn empty_variant_list_is_a_malformed_output_error() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({"variants": [], "required_roll": false}),
        });
        let generator = BranchGenerator::new(llm);
        let manifest = empty_manifest();
        let intent = Intent::new(IntentType::Action, "wait");
        let result = generator.generate(&manifest, &intent, "wait", true).await;
        assert!(result.is_err());
    }
}
