//! Player walks through a named exit into an adjacent location.

use branchloom_domain::{EntityKey, EntityKind, LocationKey, OutcomeTier, SessionId};

use crate::domain::ProcessTurnOptions;
use crate::ports::{EntityRecord, ExitRecord, LocationRecord};

use super::harness::{classify_action, single_variant, Harness};

#[tokio::test]
async fn walking_through_an_exit_moves_the_player_and_advances_time() {
    let harness = Harness::new(
        vec![
            classify_action("go", Some("to_tavern")),
            single_variant(
                serde_json::json!([
                    {"kind": "UPDATE_LOCATION", "subject_key": "player", "destination_key": "village_tavern"},
                    {"kind": "ADVANCE_TIME", "minutes": 10},
                ]),
                "You head for the tavern.",
            ),
        ],
        vec!["You push through the door and arrive at [village_tavern:the tavern].".to_string()],
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
    harness.locations.seed_location(LocationRecord {
        key: LocationKey::from("village_tavern"),
        display_name: "the tavern".into(),
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
    let known_locations = vec![(LocationKey::from("village_tavern"), "the tavern".to_string())];
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "go to the tavern".to_string(),
            ProcessTurnOptions::default(),
            &known_locations,
        )
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.new_location, Some(LocationKey::from("village_tavern")));
    assert_eq!(result.time_advanced, 10);
    assert_eq!(result.narrative, "You push through the door and arrive at the tavern.");
    assert_eq!(result.applied_deltas.len(), 2);
}
