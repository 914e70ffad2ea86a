//! Cross-cutting properties that must hold for every turn, not just the
//! literal scenarios in the sibling modules: non-empty narrative, delta
//! grounding, location/time bookkeeping, OOC store-invariance, cache-hit
//! equivalence, fingerprint stability, range clamping, and the three
//! documented boundary behaviors (below-threshold fuzzy match, duplicate
//! CREATE of an existing key, narrative retries exhausted).

use branchloom_domain::{AttitudeDimension, EntityKey, EntityKind, LocationKey, NeedKind, OutcomeTier, SessionId};

use crate::cache::fingerprint::fingerprint;
use crate::domain::ProcessTurnOptions;
use crate::ports::{EntityRecord, EntityStore, LocationRecord, NeedsStore, RelationshipStore};

use super::harness::{classify_action, single_variant, Harness};

fn seed_player_in_square(harness: &Harness) {
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
}

/// Property 1: a committed turn always carries a non-empty narrative.
#[tokio::test]
async fn narrative_is_never_empty_on_a_committed_turn() {
    let harness = Harness::new(
        vec![classify_action("wait", None), single_variant(serde_json::json!([]), "You wait.")],
        vec!["Nothing much happens, but the moment still matters.".to_string()],
    );
    seed_player_in_square(&harness);

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(SessionId::new(), 1, EntityKey::from("player"), "wait quietly".to_string(), ProcessTurnOptions::default(), &[])
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert!(!result.narrative.is_empty());
}

/// Property 3: a committed player `UPDATE_LOCATION` is reflected both in
/// `TurnResult.new_location` and in the EntityStore itself.
#[tokio::test]
async fn committed_location_update_matches_the_entity_store_post_commit() {
    let harness = Harness::new(
        vec![
            classify_action("go", Some("to_tavern")),
            single_variant(
                serde_json::json!([{"kind": "UPDATE_LOCATION", "subject_key": "player", "destination_key": "village_tavern"}]),
                "You walk off.",
            ),
        ],
        vec!["A short walk later you're at [village_tavern:the tavern].".to_string()],
    );
    seed_player_in_square(&harness);
    harness.locations.seed_location(LocationRecord {
        key: LocationKey::from("village_tavern"),
        display_name: "the tavern".into(),
    });
    harness.locations.seed_exit(
        LocationKey::from("village_square"),
        crate::ports::ExitRecord {
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
    let player = harness.entities.get_by_key(&EntityKey::from("player")).await.unwrap();
    assert_eq!(player.location, LocationKey::from("village_tavern"));
}

/// Property 4: `time_advanced` equals the sum of applied `ADVANCE_TIME`
/// deltas and is never negative, even when a generated delta proposes a
/// negative duration (clamped at collapse time).
#[tokio::test]
async fn time_advanced_sums_applied_advance_time_deltas_and_is_never_negative() {
    let harness = Harness::new(
        vec![
            classify_action("wait", None),
            single_variant(
                serde_json::json!([
                    {"kind": "ADVANCE_TIME", "minutes": -15},
                ]),
                "You wait.",
            ),
        ],
        vec!["Time passes oddly.".to_string()],
    );
    seed_player_in_square(&harness);

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(SessionId::new(), 1, EntityKey::from("player"), "wait quietly".to_string(), ProcessTurnOptions::default(), &[])
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert!(result.time_advanced >= 0);
    let advance_time_sum: i64 = result
        .applied_deltas
        .iter()
        .filter_map(|d| match d {
            crate::domain::StateDelta::AdvanceTime { minutes } => Some(*minutes),
            _ => None,
        })
        .sum();
    assert_eq!(result.time_advanced, advance_time_sum);
}

/// Property 5: an OOC turn never mutates domain stores; only the append-only
/// TurnLog grows.
#[tokio::test]
async fn ooc_turn_leaves_domain_stores_untouched() {
    let harness = Harness::new(vec![], vec![]);
    seed_player_in_square(&harness);

    let before = harness.entities.get_by_key(&EntityKey::from("player")).await.unwrap();

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "ooc: where am i?".to_string(),
            ProcessTurnOptions::default(),
            &[],
        )
        .await;

    assert!(result.is_ooc);
    assert_eq!(result.time_advanced, 0);
    assert!(result.applied_deltas.is_empty());

    let after = harness.entities.get_by_key(&EntityKey::from("player")).await.unwrap();
    assert_eq!(before, after);
}

/// Property 6: given identical dice outcomes, a cache hit produces the same
/// observable `TurnResult` (narrative aside, since the narrator always runs
/// fresh) as the same branch generated cold would have.
#[tokio::test]
async fn cache_hit_and_cold_generation_agree_on_applied_deltas_and_bookkeeping() {
    let deltas = serde_json::json!([{"kind": "ADVANCE_TIME", "minutes": 4}]);

    // Cold path: branch generator actually called.
    let cold = Harness::new(
        vec![classify_action("wait", None), single_variant(deltas.clone(), "hint")],
        vec!["Quiet.".to_string()],
    );
    seed_player_in_square(&cold);
    let cold_orchestrator = cold.orchestrator(OutcomeTier::Success, None);
    let cold_result = cold_orchestrator
        .process_turn(SessionId::new(), 1, EntityKey::from("player"), "wait quietly".to_string(), ProcessTurnOptions::default(), &[])
        .await;

    // Warm path: same branch set pre-populated in the cache under the
    // fingerprint the orchestrator will independently compute.
    let warm = Harness::new(vec![classify_action("wait", None)], vec!["Quiet.".to_string()]);
    seed_player_in_square(&warm);
    let session_id = SessionId::new();
    let player_key = EntityKey::from("player");
    let manifest = warm
        .context_builder
        .build(session_id, 1, &player_key, &LocationKey::from("village_square"), Some("wait quietly"), &[], 0.78)
        .await
        .unwrap();
    let intent = crate::domain::Intent::new(crate::domain::IntentType::Action, "wait");
    let fp = fingerprint(&manifest.digest(), &intent.normalized_action_key(), "wait quietly");
    let branch_set = crate::domain::BranchSet::new(
        vec![crate::domain::Branch {
            variant_id: "only".into(),
            outcome_tier: OutcomeTier::Success,
            deltas: vec![crate::domain::StateDelta::AdvanceTime { minutes: 4 }],
            narrative_hint: "hint".into(),
        }],
        false,
    );
    warm.branch_cache.put(session_id, fp, branch_set);
    let warm_orchestrator = warm.orchestrator(OutcomeTier::Success, None);
    let warm_result = warm_orchestrator
        .process_turn(session_id, 1, player_key, "wait quietly".to_string(), ProcessTurnOptions::default(), &[])
        .await;

    assert!(cold_result.errors.is_empty(), "errors: {:?}", cold_result.errors);
    assert!(warm_result.errors.is_empty(), "errors: {:?}", warm_result.errors);
    assert_eq!(cold_result.applied_deltas, warm_result.applied_deltas);
    assert_eq!(cold_result.time_advanced, warm_result.time_advanced);
    assert_eq!(cold_result.new_location, warm_result.new_location);
    assert_eq!(cold_result.narrative, warm_result.narrative);
}

/// Property 7: fingerprint depends only on manifest digest, normalized
/// action key, and whitespace/case-normalized input.
#[test]
fn fingerprint_ignores_input_whitespace_and_case() {
    let a = fingerprint("digest-x", "go:to_tavern", "Go   TO the Tavern");
    let b = fingerprint("digest-x", "go:to_tavern", "go to the tavern");
    assert_eq!(a, b);

    let c = fingerprint("digest-y", "go:to_tavern", "go to the tavern");
    assert_ne!(a, c, "a different manifest digest must change the fingerprint");
}

/// Property 8: need and attitude values never persist outside their
/// documented ranges, regardless of how large a delta is proposed.
#[tokio::test]
async fn need_and_attitude_values_stay_within_their_documented_ranges() {
    let harness = Harness::new(
        vec![
            classify_action("rest", None),
            single_variant(
                serde_json::json!([
                    {"kind": "UPDATE_NEED", "subject_key": "player", "need": "hunger", "delta": 500},
                    {"kind": "UPDATE_ATTITUDE", "from_key": "player", "to_key": "innkeeper", "dimension": "trust", "delta": -500},
                ]),
                "You settle in.",
            ),
        ],
        vec!["You feel at ease.".to_string()],
    );
    seed_player_in_square(&harness);

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(SessionId::new(), 1, EntityKey::from("player"), "rest a while".to_string(), ProcessTurnOptions::default(), &[])
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    let hunger = harness.needs.get_current(&EntityKey::from("player"), NeedKind::Hunger).await.unwrap();
    assert!((0..=100).contains(&hunger));
    let trust = harness
        .relationships
        .get_attitude(&EntityKey::from("player"), &EntityKey::from("innkeeper"), AttitudeDimension::Trust)
        .await
        .unwrap();
    assert!((-100..=100).contains(&trust));
}

/// Boundary: a destination hint that doesn't resemble any known location
/// closely enough yields no fuzzy match, but the turn still proceeds
/// through branch generation rather than short-circuiting.
#[tokio::test]
async fn below_threshold_fuzzy_match_yields_no_candidate_and_still_generates() {
    let harness = Harness::new(
        vec![classify_action("go", None), single_variant(serde_json::json!([]), "You look around.")],
        vec!["Nothing changes.".to_string()],
    );
    seed_player_in_square(&harness);

    let known_locations = vec![(LocationKey::from("village_tavern"), "the tavern".to_string())];
    let manifest = harness
        .context_builder
        .build(
            SessionId::new(),
            1,
            &EntityKey::from("player"),
            &LocationKey::from("village_square"),
            Some("zzyx qorv flub wexit plonk"),
            &known_locations,
            0.78,
        )
        .await
        .unwrap();
    assert!(manifest.candidate_locations.is_empty());

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "zzyx qorv flub wexit plonk".to_string(),
            ProcessTurnOptions::default(),
            &known_locations,
        )
        .await;
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
}

/// Boundary: the LLM proposes a duplicate `CREATE_ENTITY` for a key already
/// present in the manifest; the duplicate is dropped and the turn commits
/// cleanly with no second creation.
#[tokio::test]
async fn duplicate_create_for_an_existing_key_is_dropped() {
    let harness = Harness::new(
        vec![
            classify_action("greet", Some("innkeeper")),
            single_variant(
                serde_json::json!([
                    {"kind": "CREATE_ENTITY", "entity_key": "innkeeper", "entity_type": "npc", "display_name": "the innkeeper", "parent_key": null},
                ]),
                "You nod to the innkeeper.",
            ),
        ],
        vec!["You greet [innkeeper:the innkeeper].".to_string()],
    );
    seed_player_in_square(&harness);
    harness.entities.seed(EntityRecord {
        key: EntityKey::from("innkeeper"),
        kind: EntityKind::Npc,
        display_name: "the innkeeper".into(),
        location: LocationKey::from("village_square"),
    });

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(
            SessionId::new(),
            1,
            EntityKey::from("player"),
            "greet the innkeeper".to_string(),
            ProcessTurnOptions::default(),
            &[],
        )
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    let create_count = result
        .applied_deltas
        .iter()
        .filter(|d| matches!(d, crate::domain::StateDelta::CreateEntity { .. }))
        .count();
    assert_eq!(create_count, 0, "the duplicate create for an already-existing key must be dropped entirely");
}

/// Boundary: when every narration retry fails validation, the fallback
/// template is used and the turn reports a NarrativeFormatViolation error
/// rather than silently committing a clean-looking result.
#[tokio::test]
async fn exhausted_narration_retries_fall_back_and_report_a_violation() {
    let harness = Harness::new(
        vec![classify_action("wait", None), single_variant(serde_json::json!([]), "hint")],
        vec![
            "You glance at [phantom_npc:a stranger] who was never here.".to_string(),
            "The same [phantom_npc:a stranger] lingers regardless.".to_string(),
            "[phantom_npc:a stranger] again, unresolved every time.".to_string(),
        ],
    );
    seed_player_in_square(&harness);

    let orchestrator = harness.orchestrator(OutcomeTier::Success, None);
    let result = orchestrator
        .process_turn(SessionId::new(), 1, EntityKey::from("player"), "wait quietly".to_string(), ProcessTurnOptions::default(), &[])
        .await;

    assert_eq!(result.narrative, "Nothing happens.");
    assert!(
        result.errors.iter().any(|e| e.contains("NarrativeFormatViolation")),
        "errors: {:?}",
        result.errors
    );
}
