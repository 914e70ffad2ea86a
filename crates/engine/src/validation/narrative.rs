//! Narrative Validator: regex + manifest lookup over the narrator's prose.

use std::collections::BTreeSet;

use crate::domain::Manifest;

/// Words that would leak pipeline mechanics into player-facing prose.
const MECHANISM_WORDS: &[&str] = &["roll a check", "roll a d", "call the", "tool call", "invoke the", "dice roller"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeIssue {
    UnresolvedKey(String),
    MechanismLeak(String),
    BareDisplayName(String),
}

pub struct NarrativeValidator;

impl NarrativeValidator {
    /// Finds every `[key:display]` reference in `text`.
    fn find_references(text: &str) -> Vec<(String, String)> {
        let mut refs = Vec::new();
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'[' {
                if let Some(close) = text[i..].find(']') {
                    let inner = &text[i + 1..i + close];
                    if let Some((key, display)) = inner.split_once(':') {
                        refs.push((key.to_string(), display.to_string()));
                    }
                    i += close + 1;
                    continue;
                }
            }
            i += 1;
        }
        refs
    }

    pub fn validate(text: &str, manifest: &Manifest) -> Vec<NarrativeIssue> {
        let mut issues = Vec::new();
        let references = Self::find_references(text);
        let mut referenced_keys = BTreeSet::new();

        for (key, _display) in &references {
            referenced_keys.insert(key.clone());
            let known = manifest.is_known_entity_key(key)
                || manifest.items.contains_key(key.as_str())
                || manifest.exits.contains_key(key.as_str())
                || key == manifest.location_key.as_str()
                || manifest.candidate_locations.iter().any(|loc| loc.as_str() == key);
            if !known {
                issues.push(NarrativeIssue::UnresolvedKey(key.clone()));
            }
        }

        let lower = text.to_ascii_lowercase();
        for phrase in MECHANISM_WORDS {
            if lower.contains(phrase) {
                issues.push(NarrativeIssue::MechanismLeak((*phrase).to_string()));
            }
        }

        // Bare display names: a known entity's display string appears in the
        // prose but was never introduced via a `[key:display]` reference.
        for (key, entity) in &manifest.entities {
            if referenced_keys.contains(key.as_str()) {
                continue;
            }
            if entity.display.len() > 2 && lower.contains(&entity.display.to_ascii_lowercase()) {
                issues.push(NarrativeIssue::BareDisplayName(entity.display.clone()));
            }
        }

        issues
    }

    /// Strip `[key:display]` markup down to the display text the player
    /// actually reads.
    pub fn strip_keys(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('[') {
            result.push_str(&rest[..open]);
            let Some(close) = rest[open..].find(']') else {
                result.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let inner = &rest[open + 1..open + close];
            match inner.split_once(':') {
                Some((_, display)) => result.push_str(display),
                None => result.push_str(inner),
            }
            rest = &rest[open + close + 1..];
        }
        result.push_str(rest);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manifest::ManifestEntity;
    use branchloom_domain::{EntityKey, EntityKind};
    use std::collections::BTreeMap;

    fn manifest_with_patron() -> Manifest {
        let mut entities = BTreeMap::new();
        entities.insert(
            EntityKey::from("patron_1"),
            ManifestEntity {
                display: "a grizzled patron".into(),
                kind: EntityKind::Npc,
                short_ref: "A".into(),
            },
        );
        Manifest {
            session_id: branchloom_domain::SessionId::new(),
            turn_number: 1,
            location_key: branchloom_domain::LocationKey::from("village_tavern"),
            location_display: "the tavern".into(),
            entities,
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

    #[test]
    fn resolved_reference_produces_no_issues() {
        let manifest = manifest_with_patron();
        let text = "You nod to [patron_1:a grizzled patron] across the room.";
        assert!(NarrativeValidator::validate(text, &manifest).is_empty());
    }

    #[test]
    fn unresolved_key_is_flagged() {
        let manifest = manifest_with_patron();
        let text = "You nod to [ghost_npc:a pale figure].";
        let issues = NarrativeValidator::validate(text, &manifest);
        assert!(issues.contains(&NarrativeIssue::UnresolvedKey("ghost_npc".into())));
    }

    #[test]
    fn mechanism_leak_is_flagged() {
        let manifest = manifest_with_patron();
        let text = "You roll a check to persuade the patron.";
        let issues = NarrativeValidator::validate(text, &manifest);
        assert!(issues.iter().any(|i| matches!(i, NarrativeIssue::MechanismLeak(_))));
    }

    #[test]
    fn bare_display_name_without_keyed_reference_is_flagged() {
        let manifest = manifest_with_patron();
        let text = "A grizzled patron glares at you from the corner.";
        let issues = NarrativeValidator::validate(text, &manifest);
        assert!(issues.iter().any(|i| matches!(i, NarrativeIssue::BareDisplayName(_))));
    }

    #[test]
    fn strip_keys_yields_plain_display_text() {
        let text = "You nod to [patron_1:a grizzled patron].";
        assert_eq!(NarrativeValidator::strip_keys(text), "You nod to a grizzled patron.");
    }
}
