//! Tests for top-K scoring (ranking по фиксированным весам).

use super::*;
use crate::surface::{CoverSlot, CoverSpline, SlotSet};

fn single_slot_bunker(name: &str, location: Vec3) -> Bunker {
    Bunker::with_slots(
        name,
        Transform::from_translation(location),
        SlotSet::new(vec![CoverSlot::new(name, Transform::IDENTITY)]),
    )
}

/// Viewer в начале координат смотрит вдоль +X:
/// slot 0: 1000cm под 135°, slot 1: 1200cm прямо, slot 2: 900cm под 90°.
fn scenario_locations() -> [Vec3; 3] {
    let diagonal = 1000.0 * std::f32::consts::FRAC_1_SQRT_2;
    [
        Vec3::new(-diagonal, 0.0, diagonal),
        Vec3::new(1200.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 900.0),
    ]
}

fn scenario_registry() -> (BunkerRegistry, [BunkerId; 3]) {
    let mut registry = BunkerRegistry::default();
    let [a, b, c] = scenario_locations();
    let ids = [
        registry.register(single_slot_bunker("slot0", a)),
        registry.register(single_slot_bunker("slot1", b)),
        registry.register(single_slot_bunker("slot2", c)),
    ];
    (registry, ids)
}

fn viewer() -> Viewpoint {
    Viewpoint::new(Vec3::ZERO, Vec3::X)
}

#[test]
fn test_sigmoid_midpoint_and_monotonic() {
    assert!((sigmoid01(0.45, 8.0, 0.45) - 0.5).abs() < 1e-6);
    assert!(sigmoid01(0.2, 8.0, 0.45) < sigmoid01(0.6, 8.0, 0.45));
}

#[test]
fn test_scenario_default_weights_ranking() {
    let (registry, ids) = scenario_registry();
    let config = SelectionConfig::default();

    let top = top_k_across_bunkers(&registry, &config, &viewer(), 3, None);
    let order: Vec<BunkerId> = top.iter().map(|c| c.bunker).collect();

    // slot1 (прямо) > slot2 (ближе, сбоку) > slot0 (сзади)
    assert_eq!(order, vec![ids[1], ids[2], ids[0]], "scores: {:?}", top.iter().map(|c| c.score).collect::<Vec<_>>());
    assert!((top[0].score - 2.202).abs() < 0.01, "slot1 score = {}", top[0].score);
    assert!((top[1].score - 1.974).abs() < 0.01, "slot2 score = {}", top[1].score);
    assert!((top[2].score - 1.690).abs() < 0.01, "slot0 score = {}", top[2].score);
    assert!((top[2].angle_cos + std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
}

#[test]
fn test_scenario_without_angle_weight_distance_decides() {
    let (registry, ids) = scenario_registry();
    let config = SelectionConfig {
        angle_weight: 0.0,
        ..Default::default()
    };

    let order: Vec<BunkerId> = top_k_across_bunkers(&registry, &config, &viewer(), 3, None)
        .iter()
        .map(|c| c.bunker)
        .collect();

    assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
}

#[test]
fn test_scenario_within_one_bunker() {
    let mut registry = BunkerRegistry::default();
    let slots = scenario_locations()
        .iter()
        .enumerate()
        .map(|(i, location)| CoverSlot::new(format!("s{}", i), Transform::from_translation(*location)))
        .collect();
    let id = registry.register(Bunker::with_slots("yard", Transform::IDENTITY, SlotSet::new(slots)));

    let top = top_k_within_bunker(&registry, &SelectionConfig::default(), &viewer(), id, 3);
    let order: Vec<PositionRef> = top.iter().map(|c| c.position).collect();

    assert_eq!(order, vec![PositionRef::Slot(1), PositionRef::Slot(2), PositionRef::Slot(0)]);
}

#[test]
fn test_exclude_and_truncate() {
    let (registry, ids) = scenario_registry();
    let config = SelectionConfig::default();

    let top = top_k_across_bunkers(&registry, &config, &viewer(), 1, Some(ids[1]));

    assert_eq!(top.len(), 1);
    assert_eq!(top[0].bunker, ids[2]);
}

#[test]
fn test_occupied_and_distant_positions_are_skipped() {
    let (mut registry, ids) = scenario_registry();
    let holder = Entity::from_raw(5);
    if let Some(bunker) = registry.get_mut(ids[1]) {
        bunker.claim_slot(0, holder);
    }
    let config = SelectionConfig {
        max_distance: 950.0,
        ..Default::default()
    };

    let top = top_k_across_bunkers(&registry, &config, &viewer(), 3, None);
    assert_eq!(top.iter().map(|c| c.bunker).collect::<Vec<_>>(), vec![ids[2]]);

    // holder видит свой slot как доступный
    let wide = SelectionConfig::default();
    let own = top_k_across_bunkers(&registry, &wide, &viewer().for_claimant(holder), 3, None);
    assert!(own.iter().any(|c| c.bunker == ids[1]));
}

#[test]
fn test_prefilter_keeps_nearest() {
    let (registry, ids) = scenario_registry();
    let config = SelectionConfig {
        prefilter_count: 1,
        ..Default::default()
    };

    let candidates = build_candidates(&registry, &config, &viewer(), None);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].bunker, ids[2], "900cm is the nearest");
}

#[test]
fn test_spline_bunker_offers_closest_alpha() {
    let mut registry = BunkerRegistry::default();
    let spline = CoverSpline::new(vec![Vec3::new(-400.0, 0.0, 0.0), Vec3::new(400.0, 0.0, 0.0)]);
    let id = registry.register(Bunker::with_spline(
        "rail",
        Transform::from_xyz(100.0, 0.0, 600.0),
        spline,
    ));
    let config = SelectionConfig::default();

    let within = top_k_within_bunker(&registry, &config, &viewer(), id, 10);

    // 5 равномерных + ближайшая (0.375)
    assert_eq!(within.len(), 6);
    let closest = within
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .and_then(|c| c.position.alpha())
        .unwrap_or(-1.0);
    assert!((closest - 0.375).abs() < 1e-3, "closest alpha = {}", closest);

    // занятый single-occupant spline не предлагается
    if let Some(bunker) = registry.get_mut(id) {
        assert!(bunker.claim(PositionRef::Alpha(0.5), Entity::from_raw(8)).is_ok());
    }
    assert!(top_k_within_bunker(&registry, &config, &viewer(), id, 10).is_empty());
}
