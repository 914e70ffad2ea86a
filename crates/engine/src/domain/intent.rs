//! Classified player intent, produced once per turn by the Intent Classifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Five-way classification of a player's turn input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Action,
    SkillUse,
    Speech,
    Question,
    Ooc,
}

/// An untargeted action that never attempts target matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntargetedVerb {
    Observe,
    Wait,
    LookAround,
}

impl UntargetedVerb {
    pub fn matches(verb: &str) -> Option<Self> {
        match verb.to_ascii_lowercase().as_str() {
            "observe" | "look" => Some(Self::Observe),
            "wait" => Some(Self::Wait),
            "look_around" | "look around" => Some(Self::LookAround),
            _ => None,
        }
    }
}

/// Classified intent. Lives only for the turn that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub verb: String,
    pub target_ref: Option<String>,
    pub target_text: Option<String>,
    pub modifiers: BTreeMap<String, String>,
}

impl Intent {
    pub fn new(intent_type: IntentType, verb: impl Into<String>) -> Self {
        Self {
            intent_type,
            verb: verb.into(),
            target_ref: None,
            target_text: None,
            modifiers: BTreeMap::new(),
        }
    }

    /// Fallback intent produced when the classifier's LLM output fails to
    /// parse twice in a row.
    pub fn fallback_custom_action() -> Self {
        Self::new(IntentType::Action, "custom")
    }

    pub fn is_ooc(&self) -> bool {
        self.intent_type == IntentType::Ooc
    }

    /// Normalized `verb+target` form used as half of a match candidate key
    /// and as an ingredient of the cache fingerprint.
    pub fn normalized_action_key(&self) -> String {
        let verb = self.verb.trim().to_ascii_lowercase();
        match &self.target_ref {
            Some(target) => format!("{verb}:{}", target.trim().to_ascii_lowercase()),
            None => verb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_action_key_includes_target_when_present() {
        let mut intent = Intent::new(IntentType::Action, "Take");
        intent.target_ref = Some("Copper_Coin".into());
        assert_eq!(intent.normalized_action_key(), "take:copper_coin");
    }

    #[test]
    fn normalized_action_key_is_verb_only_without_target() {
        let intent = Intent::new(IntentType::Action, "Wait");
        assert_eq!(intent.normalized_action_key(), "wait");
    }

    #[test]
    fn untargeted_verbs_recognized_case_insensitively() {
        assert_eq!(UntargetedVerb::matches("Wait"), Some(UntargetedVerb::Wait));
        assert_eq!(UntargetedVerb::matches("dance"), None);
    }

    #[test]
    fn fallback_intent_is_custom_action() {
        let intent = Intent::fallback_custom_action();
        assert_eq!(intent.intent_type, IntentType::Action);
        assert_eq!(intent.verb, "custom");
    }
}
