//! Intent Classifier: LLM-driven 5-way classification of player input.

use std::sync::Arc;

use serde::Deserialize;

use crate::domain::{Intent, IntentType};
use crate::ports::{CompletionParams, LlmClient, LlmError};

const OOC_PREFIXES: &[&str] = &["ooc:", "[ooc]"];
const MODAL_VERBS: &[&str] = &["can", "could", "would"];
const SPEECH_VERBS: &[&str] = &["ask", "tell", "say", "greet", "speak", "talk"];

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(rename = "type")]
    intent_type: String,
    verb: String,
    target_ref: Option<String>,
    target_text: Option<String>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classify `player_input` into an Intent. Runs the heuristic
    /// OOC/modal/speech-act pre-checks before ever calling the LLM, then
    /// falls back to the LLM for everything else.
    pub async fn classify(&self, player_input: &str, scene_hint: &str) -> Intent {
        if Self::is_ooc_prefixed(player_input) {
            let mut intent = Intent::new(IntentType::Ooc, "ooc_query");
            intent.target_text = Some(player_input.to_string());
            return intent;
        }

        match self.classify_via_llm(player_input, scene_hint).await {
            Ok(intent) => intent,
            Err(_) => match self.classify_via_llm(player_input, scene_hint).await {
                Ok(intent) => intent,
                Err(_) => Intent::fallback_custom_action(),
            },
        }
    }

    fn is_ooc_prefixed(input: &str) -> bool {
        let lower = input.trim().to_ascii_lowercase();
        OOC_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
    }

    /// ACTION vs QUESTION heuristic: modal verbs at sentence start suggest a
    /// question, unless a speech-act verb targeting an in-scene NPC
    /// overrides it.
    fn classify_heuristically(input: &str) -> Option<IntentType> {
        let lower = input.trim().to_ascii_lowercase();
        let first_word = lower.split_whitespace().next()?;

        let has_speech_verb = SPEECH_VERBS.iter().any(|verb| lower.contains(verb));
        if has_speech_verb {
            return Some(IntentType::Action);
        }
        if MODAL_VERBS.contains(&first_word) {
            return Some(IntentType::Question);
        }
        None
    }

    async fn classify_via_llm(&self, player_input: &str, scene_hint: &str) -> Result<Intent, LlmError> {
        let prompt = format!(
            "Classify the player's input into {{ACTION, SKILL_USE, SPEECH, QUESTION, OOC}}.\n\
             Scene: {scene_hint}\nInput: {player_input}\n\
             Respond as JSON: {{\"type\": ..., \"verb\": ..., \"target_ref\": ..., \"target_text\": ...}}"
        );
        let response = self
            .llm
            .complete_structured(prompt, serde_json::json!({}), CompletionParams::default())
            .await?;
        let raw: RawIntent = serde_json::from_value(response)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let intent_type = match Self::classify_heuristically(player_input) {
            Some(heuristic) => heuristic,
            None => match raw.intent_type.to_ascii_uppercase().as_str() {
                "ACTION" => IntentType::Action,
                "SKILL_USE" => IntentType::SkillUse,
                "SPEECH" => IntentType::Speech,
                "QUESTION" => IntentType::Question,
                "OOC" => IntentType::Ooc,
                other => return Err(LlmError::InvalidResponse(format!("unknown intent type {other:?}"))),
            },
        };

        Ok(Intent {
            intent_type,
            verb: raw.verb,
            target_ref: raw.target_ref,
            target_text: raw.target_text,
            modifiers: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm {
        response: serde_json::Value,
        fail: bool,
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
            if self.fail {
                Err(LlmError::InvalidResponse("boom".into()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    #[tokio::test]
    async fn ooc_prefix_shortcuts_before_any_llm_call() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({}),
            fail: true,
        });
        let classifier = IntentClassifier::new(llm);
        let intent = classifier.classify("ooc: what time is it?", "").await;
        assert!(intent.is_ooc());
    }

    #[tokio::test]
    async fn speech_verb_overrides_modal_question_heuristic() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({"type": "question", "verb": "ask", "target_ref": "A"}),
            fail: false,
        });
        let classifier = IntentClassifier::new(llm);
        let intent = classifier.classify("Could you ask the guard about the gate?", "guard present").await;
        assert_eq!(intent.intent_type, IntentType::Action);
    }

    #[tokio::test]
    async fn bare_modal_without_speech_verb_is_question() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({"type": "question", "verb": "query"}),
            fail: false,
        });
        let classifier = IntentClassifier::new(llm);
        let intent = classifier.classify("Can I go north?", "").await;
        assert_eq!(intent.intent_type, IntentType::Question);
    }

    #[tokio::test]
    async fn double_llm_failure_falls_back_to_custom_action() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({}),
            fail: true,
        });
        let classifier = IntentClassifier::new(llm);
        let intent = classifier.classify("xyzzy plugh", "").await;
        assert_eq!(intent, Intent::fallback_custom_action());
    }
}
