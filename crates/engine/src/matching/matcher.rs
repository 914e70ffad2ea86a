//! Action Matcher: compares classified Intent against predicted candidates
//! and scores the best one.

use std::collections::BTreeMap;

use crate::domain::Intent;

use super::predictor::ActionCandidate;

/// A small synonym map over the verb vocabulary the matcher understands.
fn verb_synonyms() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("grab", "take"),
        ("pick", "take"),
        ("move", "go"),
        ("walk", "go"),
        ("head", "go"),
        ("speak", "talk"),
        ("chat", "talk"),
        ("greet", "talk"),
    ])
}

pub struct ActionMatcher {
    min_confidence: f64,
}

impl ActionMatcher {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Returns `(candidate_key, confidence)` or `(None, 0.0)`.
    pub fn match_intent(&self, intent: &Intent, candidates: &[ActionCandidate]) -> (Option<String>, f64) {
        let synonyms = verb_synonyms();
        let verb = intent.verb.trim().to_ascii_lowercase();
        let canonical_verb = synonyms.get(verb.as_str()).copied().unwrap_or(verb.as_str());

        let target = intent
            .target_ref
            .as_deref()
            .or(intent.target_text.as_deref())
            .map(|t| t.trim().to_ascii_lowercase());

        // (a) exact verb+target match.
        if let Some(target) = &target {
            if let Some(candidate) = candidates.iter().find(|c| {
                c.verb == canonical_verb && c.target_key.as_deref().map(|k| k.to_ascii_lowercase()).as_deref() == Some(target.as_str())
            }) {
                return (Some(candidate.key.clone()), 1.0);
            }
        }

        // (b)/(c) fuzzy display-name match among candidates with the same
        // (possibly synonym-mapped) verb.
        let same_verb: Vec<&ActionCandidate> = candidates.iter().filter(|c| c.verb == canonical_verb).collect();
        if same_verb.is_empty() {
            return (None, 0.0);
        }

        let probe = target.unwrap_or_default();
        let mut best: Option<(&ActionCandidate, f64)> = None;
        for candidate in same_verb {
            let score = strsim::jaro_winkler(&probe, &candidate.label.to_ascii_lowercase());
            if best.as_ref().map(|(_, best_score)| score > *best_score).unwrap_or(true) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score)) if score >= self.min_confidence => (Some(candidate.key.clone()), score),
            _ => (None, 0.0),
        }
    }
}
