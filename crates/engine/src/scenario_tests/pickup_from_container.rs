//! Player takes an item out of a container entity already present in the
//! scene (a chest, grounded the same way `postprocess`'s own
//! `missing_parent_is_auto_created_before_its_child` test models an
//! inanimate container as an `EntityKind::Creature`).

use branchloom_domain::{EntityKey, EntityKind, ItemKey, LocationKey, OutcomeTier, SessionId};

use crate::domain::ProcessTurnOptions;
use crate::ports::{EntityRecord, InventoryStore, ItemRecord, LocationRecord};

use super::harness::{classify_action, single_variant, Harness};

#[tokio::test]
async fn taking_an_item_from_a_chest_transfers_it_to_the_player() {
    let harness = Harness::new(
        vec![
            classify_action("take", Some("copper_coin")),
            single_variant(
                serde_json::json!([
                    {"kind": "TRANSFER_ITEM", "from_entity_key": "wooden_chest", "to_entity_key": "player", "item_key": "copper_coin", "quantity": 1},
                ]),
                "You take the coin.",
            ),
        ],
        vec!["You lift the coin from the [wooden_chest:wooden chest].".to_string()],
    );

    harness.entities.seed(EntityRecord {
        key: EntityKey::from("player"),
        kind: EntityKind::Player,
        display_name: "Mira".into(),
        location: LocationKey::from("tavern_cellar"),
    });
    harness.entities.seed(EntityRecord {
        key: EntityKey::from("wooden_chest"),
        kind: EntityKind::Creature,
        display_name: "wooden chest".into(),
        location: LocationKey::from("tavern_cellar"),
    });
    harness.locations.seed_location(LocationRecord {
        key: LocationKey::from("tavern_cellar"),
        display_name: "the cellar".into(),
    });
    harness.inventory.seed_held(ItemRecord {
        key: ItemKey::from("copper_coin"),
        display_name: "a copper coin".into(),
        stackable: true,
        quantity: 1,
        holder: Some(EntityKey::from("wooden_chest")),
    });

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "take the copper coin".to_string(),
            ProcessTurnOptions::default(),
            &[],
        )
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.new_location, None);
    assert!(result.applied_deltas.iter().any(|d| matches!(
        d,
        crate::domain::StateDelta::TransferItem { from_entity_key, to_entity_key, item_key, quantity }
            if from_entity_key.as_str() == "wooden_chest"
                && to_entity_key.as_str() == "player"
                && item_key.as_str() == "copper_coin"
                && *quantity == 1
    )));

    let held = harness.inventory.items_held_by(&EntityKey::from("player")).await.unwrap();
    assert_eq!(held.len(), 1);
}
