//! A branch references an ambient NPC (a bar patron) that was never part of
//! the turn's manifest. The post-processor auto-injects a `CREATE_ENTITY`
//! for it rather than dropping the delta that depends on it.

use branchloom_domain::{EntityKey, EntityKind, LocationKey, OutcomeTier, SessionId};

use crate::domain::{ProcessTurnOptions, StateDelta};
use crate::ports::{EntityRecord, LocationRecord};

use super::harness::{classify_action, single_variant, Harness};

#[tokio::test]
async fn ambient_npc_is_created_then_referenced_in_the_same_turn() {
    let harness = Harness::new(
        vec![
            classify_action("talk", Some("patron_1")),
            single_variant(
                serde_json::json!([
                    {"kind": "UPDATE_ATTITUDE", "from_key": "patron_1", "to_key": "player", "dimension": "trust", "delta": 5},
                ]),
                "You strike up a conversation.",
            ),
        ],
        vec!["You share a drink with [patron_1:a patron].".to_string()],
    );

    harness.entities.seed(EntityRecord {
        key: EntityKey::from("player"),
        kind: EntityKind::Player,
        display_name: "Mira".into(),
        location: LocationKey::from("village_tavern"),
    });
    harness.locations.seed_location(LocationRecord {
        key: LocationKey::from("village_tavern"),
        display_name: "the tavern".into(),
    });

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "talk to the patron".to_string(),
            ProcessTurnOptions::default(),
            &[],
        )
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.applied_deltas.len(), 2);
    assert!(matches!(
        &result.applied_deltas[0],
        StateDelta::CreateEntity { entity_key, entity_type: EntityKind::Npc, display_name, parent_key: None }
            if entity_key.as_str() == "patron_1" && display_name == "a patron"
    ));
    assert!(matches!(&result.applied_deltas[1], StateDelta::UpdateAttitude { .. }));
    assert_eq!(result.narrative, "You share a drink with a patron.");
}
