//! Narrator: turns a collapsed TurnResult into prose, enforcing the
//! `[key:display]` format contract.

use std::sync::Arc;

use crate::domain::{Manifest, TurnResult};
use crate::ports::{CompletionParams, LlmClient};
use crate::validation::NarrativeValidator;

const MAX_RETRIES: u32 = 3;
const NARRATION_TEMPERATURE: f64 = 0.5;

pub struct Narrator {
    llm: Arc<dyn LlmClient>,
}

impl Narrator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Returns the final, key-stripped prose the player reads. When every
    /// retry is exhausted without producing valid narration, the second
    /// element names the `NarrativeFormatViolation` the caller should record
    /// against the turn.
    pub async fn narrate(&self, turn_result: &TurnResult, manifest: &Manifest) -> (String, Option<String>) {
        let mut feedback: Vec<String> = Vec::new();
        let mut last_issues: Vec<String> = Vec::new();

        for attempt in 0..MAX_RETRIES {
            let prompt = self.build_prompt(turn_result, manifest, &feedback);
            let raw = match self
                .llm
                .complete(
                    prompt,
                    CompletionParams {
                        temperature: Some(NARRATION_TEMPERATURE),
                        max_tokens: None,
                    },
                )
                .await
            {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "narrator LLM call failed");
                    last_issues = vec![err.to_string()];
                    continue;
                }
            };

            let issues = NarrativeValidator::validate(&raw, manifest);
            if issues.is_empty() {
                return (NarrativeValidator::strip_keys(&raw), None);
            }

            tracing::info!(attempt, issue_count = issues.len(), "narrative validation failed, retrying with feedback");
            feedback = issues.iter().map(|issue| format!("{issue:?}")).collect();
            last_issues = feedback.clone();
        }

        let violation = format!("NarrativeFormatViolation: retries exhausted, last issues: {}", last_issues.join("; "));
        (self.fallback_narrative(turn_result), Some(violation))
    }

    fn build_prompt(&self, turn_result: &TurnResult, manifest: &Manifest, feedback: &[String]) -> String {
        let entity_refs: Vec<String> = manifest
            .entities
            .iter()
            .map(|(key, e)| format!("[{}:{}]", key.as_str(), e.display))
            .collect();

        let mut prompt = format!(
            "Narrate this turn's outcome in second person, GM voice.\n\
             Location: {}\n\
             Entities you may reference: {}\n\
             Applied changes: {}\n\
             Time advanced: {} minutes.\n\
             Every entity you mention must use the form [key:display].\n\
             Never mention dice, tools, or mechanics by name.",
            manifest.location_display,
            entity_refs.join(", "),
            turn_result.applied_deltas.iter().map(|d| d.describe()).collect::<Vec<_>>().join("; "),
            turn_result.time_advanced,
        );

        if !feedback.is_empty() {
            prompt.push_str("\nPrevious attempt had these issues, fix them: ");
            prompt.push_str(&feedback.join("; "));
        }

        prompt
    }

    /// Templated fallback derived from applied deltas.
    fn fallback_narrative(&self, turn_result: &TurnResult) -> String {
        if let Some(location) = &turn_result.new_location {
            format!("You move to {}. Time passes.", location.as_str())
        } else if turn_result.time_advanced > 0 {
            "Time passes.".to_string()
        } else {
            "Nothing happens.".to_string()
        }
    }
}
