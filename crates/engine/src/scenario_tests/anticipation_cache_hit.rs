//! A branch set was pre-computed for this exact fingerprint (as the
//! anticipation engine would do in the background) before the turn ever
//! reaches the orchestrator. The turn must resolve from the cache without a
//! single call to branch generation.

use branchloom_domain::{EntityKey, EntityKind, LocationKey, OutcomeTier, SessionId};

use crate::cache::fingerprint::fingerprint;
use crate::domain::{Branch, BranchSet, Intent, IntentType, ProcessTurnOptions, StateDelta};
use crate::ports::{EntityRecord, LocationRecord};

use super::harness::{classify_action, Harness};

#[tokio::test]
async fn a_precomputed_branch_set_is_served_from_cache_without_generating() {
    let harness = Harness::new(vec![classify_action("wait", None)], vec!["Nothing stirs.".to_string()]);

    harness.entities.seed(EntityRecord {
        key: EntityKey::from("player"),
        kind: EntityKind::Player,
        display_name: "Mira".into(),
        location: LocationKey::from("village_square"),
    });
    harness.locations.seed_location(LocationRecord {
        key: LocationKey::from("village_square"),
        display_name: "the square".into(),
    });

    let session_id = SessionId::new();
    let player_key = EntityKey::from("player");
    let player_input = "wait quietly";

    let manifest = harness
        .context_builder
        .build(session_id, 1, &player_key, &LocationKey::from("village_square"), Some(player_input), &[], 0.78)
        .await
        .expect("manifest builds cleanly");

    let intent = Intent::new(IntentType::Action, "wait");
    let fp = fingerprint(&manifest.digest(), &intent.normalized_action_key(), player_input);

    let branch_set = BranchSet::new(
        vec![Branch {
            variant_id: "cached".into(),
            outcome_tier: OutcomeTier::Success,
            deltas: vec![StateDelta::AdvanceTime { minutes: 3 }],
            narrative_hint: "A quiet moment passes.".into(),
        }],
        false,
    );
    harness.branch_cache.put(session_id, fp, branch_set);

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(session_id, 1, player_key, player_input.to_string(), ProcessTurnOptions::default(), &[])
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.time_advanced, 3);
    assert_eq!(result.narrative, "Nothing stirs.");
}
