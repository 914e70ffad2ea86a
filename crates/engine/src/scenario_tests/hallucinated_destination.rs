//! A branch proposes a destination the manifest never grounded. The first
//! generation is dropped and regenerated once; the regenerated branch
//! succeeds.

use branchloom_domain::{EntityKey, EntityKind, LocationKey, OutcomeTier, SessionId};

use crate::domain::{ProcessTurnOptions, StateDelta};
use crate::ports::{EntityRecord, LocationRecord};

use super::harness::{classify_action, single_variant, Harness};

#[tokio::test]
async fn hallucinated_destination_is_dropped_and_the_branch_regenerates() {
    let harness = Harness::new(
        vec![
            classify_action("wait", None),
            single_variant(
                serde_json::json!([
                    {"kind": "UPDATE_LOCATION", "subject_key": "player", "destination_key": "forbidden_vault"},
                ]),
                "You slip into the vault.",
            ),
            single_variant(serde_json::json!([{"kind": "ADVANCE_TIME", "minutes": 5}]), "You wait a while."),
        ],
        vec!["Nothing of note happens, and a few minutes pass.".to_string()],
    );

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

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "wait quietly".to_string(),
            ProcessTurnOptions::default(),
            &[],
        )
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.new_location, None);
    assert_eq!(result.applied_deltas.len(), 1);
    assert!(matches!(result.applied_deltas[0], StateDelta::AdvanceTime { minutes: 5 }));
    assert_eq!(result.time_advanced, 5);
}
