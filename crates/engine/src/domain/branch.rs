//! `Branch`: an LLM-proposed outcome-variant tuple, and the set of variants
//! generated for one action.

use branchloom_domain::OutcomeTier;
use serde::{Deserialize, Serialize};

use super::delta::StateDelta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub variant_id: String,
    pub outcome_tier: OutcomeTier,
    pub deltas: Vec<StateDelta>,
    pub narrative_hint: String,
}

/// A full set of variants for one action, plus whether the set requires a
/// dice roll to pick among them and the declared fallback order to use when
/// the rolled tier has no matching variant. Each branch set carries its own
/// fallback chain rather than assuming one universal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSet {
    pub variants: Vec<Branch>,
    pub required_roll: bool,
    pub tier_fallback: Vec<OutcomeTier>,
}

impl BranchSet {
    pub fn new(variants: Vec<Branch>, required_roll: bool) -> Self {
        Self {
            variants,
            required_roll,
            tier_fallback: default_tier_fallback(),
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<OutcomeTier>) -> Self {
        self.tier_fallback = fallback;
        self
    }

    /// Select the variant matching `tier`, falling through this set's
    /// declared fallback order if no exact match exists among the
    /// generated variants.
    pub fn select(&self, tier: OutcomeTier) -> Option<&Branch> {
        if let Some(branch) = self.variants.iter().find(|b| b.outcome_tier == tier) {
            return Some(branch);
        }
        self.tier_fallback
            .iter()
            .find_map(|fallback_tier| self.variants.iter().find(|b| b.outcome_tier == *fallback_tier))
    }
}

/// Default fall-through chain when a branch does not declare its own:
/// partial -> failure -> success.
fn default_tier_fallback() -> Vec<OutcomeTier> {
    vec![OutcomeTier::Partial, OutcomeTier::Failure, OutcomeTier::Success]
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchloom_domain::EntityKey;

    fn branch(tier: OutcomeTier) -> Branch {
        Branch {
            variant_id: format!("{tier}"),
            outcome_tier: tier,
            deltas: vec![crate::domain::delta::StateDelta::AdvanceTime { minutes: 5 }],
            narrative_hint: "hint".into(),
        }
    }

    #[test]
    fn select_returns_exact_tier_when_present() {
        let set = BranchSet::new(vec![branch(OutcomeTier::Success), branch(OutcomeTier::Failure)], true);
        assert_eq!(set.select(OutcomeTier::Success).unwrap().outcome_tier, OutcomeTier::Success);
    }

    #[test]
    fn select_falls_through_declared_order_when_tier_missing() {
        let set = BranchSet::new(vec![branch(OutcomeTier::Failure)], true);
        // Rolled critical_failure, not present; fallback is partial -> failure -> success.
        let selected = set.select(OutcomeTier::CriticalFailure).unwrap();
        assert_eq!(selected.outcome_tier, OutcomeTier::Failure);
    }

    #[test]
    fn select_returns_none_when_nothing_matches_even_the_fallback() {
        let set = BranchSet::new(vec![branch(OutcomeTier::CriticalSuccess)], true);
        assert!(set.select(OutcomeTier::Failure).is_none());
    }

    #[test]
    fn entity_key_usable_in_deltas_for_fixture_construction() {
        let _ = EntityKey::from("player");
    }
}
