//! An `ooc:`-prefixed question short-circuits straight to the OOC Handler:
//! no branch generation, no state mutation, no time advance.

use branchloom_domain::{EntityKey, EntityKind, LocationKey, OutcomeTier, SessionId};

use crate::domain::ProcessTurnOptions;
use crate::ports::{EntityRecord, ExitRecord, LocationRecord};

use super::harness::Harness;

#[tokio::test]
async fn ooc_prefixed_question_about_exits_bypasses_branch_generation() {
    // No structured/completion responses queued: a correctly short-circuited
    // OOC turn never calls the LLM at all for this category of question.
    let harness = Harness::new(vec![], vec![]);

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
    harness.locations.seed_exit(
        LocationKey::from("village_square"),
        ExitRecord {
            exit_key: branchloom_domain::ExitKey::from("to_tavern"),
            destination_key: LocationKey::from("village_tavern"),
            display: "the tavern".into(),
            direction: Some("north".into()),
        },
    );

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "ooc: what are my exits?".to_string(),
            ProcessTurnOptions::default(),
            &[],
        )
        .await;

    assert!(result.is_ooc);
    assert_eq!(result.time_advanced, 0);
    assert!(result.applied_deltas.is_empty());
    assert_eq!(result.narrative, "You can go: the tavern.");
}
