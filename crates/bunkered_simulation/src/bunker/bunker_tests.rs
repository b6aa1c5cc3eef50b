//! Tests for Bunker queries, claims и registry lifecycle systems.

use super::*;
use crate::surface::{CoverSlot, SlotSet};

fn three_slot_bunker() -> Bunker {
    let slots = SlotSet::new(vec![
        CoverSlot::new("left", Transform::from_xyz(-200.0, 0.0, 0.0)),
        CoverSlot::new("center", Transform::from_xyz(0.0, 0.0, 0.0))
            .with_stances(&[Stance::Crouch]),
        CoverSlot::new("right", Transform::from_xyz(200.0, 0.0, 0.0)),
    ]);
    Bunker::with_slots("wall", Transform::from_xyz(0.0, 0.0, 500.0), slots)
}

#[test]
fn test_slot_queries() {
    let bunker = three_slot_bunker();

    assert_eq!(bunker.slot_count(), 3);
    assert_eq!(bunker.slot_stance(1), Some(Stance::Crouch));
    assert_eq!(bunker.slot_stance(0), None);
    assert_eq!(
        bunker.slot_world_transform(2).map(|t| t.translation),
        Some(Vec3::new(200.0, 0.0, 500.0))
    );
    assert_eq!(bunker.slot_normal(0), Some(Vec3::NEG_Z), "identity slot faces -Z");
    assert_eq!(bunker.slot_world_transform(3), None);
    assert_eq!(bunker.find_closest_alpha(Vec3::ZERO), None, "not a spline");
}

#[test]
fn test_release_by_other_claimant_succeeds_under_lenient_policy() {
    let owner = Entity::from_raw(10);
    let stranger = Entity::from_raw(11);
    let mut bunker = three_slot_bunker();

    assert!(bunker.claim_slot(1, owner));
    assert!(bunker.release_slot(1, stranger), "lenient release ignores the claimant");
    assert!(!bunker.is_slot_occupied(1));
}

#[test]
fn test_strict_policy_keeps_claim() {
    let owner = Entity::from_raw(10);
    let stranger = Entity::from_raw(11);
    let mut bunker = three_slot_bunker().with_release_policy(ReleasePolicy::Strict);

    bunker.claim_slot(1, owner);

    assert!(!bunker.release_slot(1, stranger));
    assert!(bunker.is_slot_occupied(1));
}

#[test]
fn test_claim_reports_errors() {
    let owner = Entity::from_raw(10);
    let other = Entity::from_raw(12);
    let mut bunker = three_slot_bunker();

    assert_eq!(bunker.claim(PositionRef::Slot(0), owner), Ok(PositionRef::Slot(0)));
    assert_eq!(
        bunker.claim(PositionRef::Slot(0), other),
        Err(CoverError::SlotOccupied {
            bunker: bunker.id,
            position: PositionRef::Slot(0)
        })
    );
    assert_eq!(
        bunker.claim(PositionRef::Alpha(0.5), other),
        Err(CoverError::InvalidPosition {
            bunker: bunker.id,
            position: PositionRef::Alpha(0.5)
        })
    );
}

#[test]
fn test_nearest_free_and_closest_valid_slot() {
    let me = Entity::from_raw(1);
    let other = Entity::from_raw(2);
    let mut bunker = three_slot_bunker();
    let from = Vec3::new(-150.0, 0.0, 500.0);

    assert_eq!(bunker.find_nearest_free_slot(from, DEFAULT_FREE_SLOT_SEARCH), Some(0));

    bunker.claim_slot(0, me);
    assert_eq!(bunker.find_nearest_free_slot(from, DEFAULT_FREE_SLOT_SEARCH), Some(1));
    assert_eq!(bunker.find_closest_valid_slot(from, DEFAULT_FREE_SLOT_SEARCH, me), Some(0));
    assert_eq!(bunker.find_closest_valid_slot(from, DEFAULT_FREE_SLOT_SEARCH, other), Some(1));

    // радиус отсекает всё
    assert_eq!(bunker.find_nearest_free_slot(Vec3::new(0.0, 0.0, -5000.0), 1000.0), None);
}

#[test]
fn test_spline_bunker_clamps_claimed_alpha() {
    let me = Entity::from_raw(1);
    let spline = CoverSpline::new(vec![Vec3::new(-100.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 0.0)])
        .with_range(0.1, 0.9);
    let mut bunker = Bunker::with_spline("rail", Transform::IDENTITY, spline);

    assert_eq!(bunker.claim(PositionRef::Alpha(2.0), me), Ok(PositionRef::Alpha(0.9)));
    assert_eq!(bunker.claimant_at(PositionRef::Alpha(0.3)), Some(me));
    assert_eq!(bunker.slot_count(), 0);
    assert_eq!(bunker.tangent_at(0.5), Some(Vec3::X));
    assert_eq!(bunker.outward_at(0.5), Some(Vec3::NEG_Z));
}

#[test]
fn test_registry_register_and_lookup() {
    let body = Entity::from_raw(77);
    let mut registry = BunkerRegistry::default();

    let a = registry.register(three_slot_bunker());
    let b = registry.register(three_slot_bunker().with_body(body));

    assert_ne!(a, b);
    assert_eq!(registry.get(b).map(|bunker| bunker.id), Some(b));
    assert_eq!(registry.bunker_for_body(body), Some(b));
    assert_eq!(registry.iter().map(|bunker| bunker.id).collect::<Vec<_>>(), vec![a, b]);

    assert!(registry.unregister(a).is_some());
    assert!(!registry.contains(a));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_orphaned_claims_are_released() {
    let mut app = App::new();
    app.init_resource::<BunkerRegistry>()
        .add_systems(Update, release_orphaned_claims);

    let alive = app.world_mut().spawn_empty().id();
    let doomed = app.world_mut().spawn_empty().id();
    let id = {
        let mut registry = app.world_mut().resource_mut::<BunkerRegistry>();
        let id = registry.register(three_slot_bunker());
        let bunker = registry.get_mut(id).expect("registered");
        bunker.claim_slot(0, alive);
        bunker.claim_slot(2, doomed);
        id
    };

    app.world_mut().despawn(doomed);
    app.update();

    let registry = app.world().resource::<BunkerRegistry>();
    let bunker = registry.get(id).expect("bunker survives");
    assert!(bunker.is_slot_occupied(0), "live claimant keeps its slot");
    assert!(!bunker.is_slot_occupied(2), "orphaned slot freed");
}

#[test]
fn test_despawned_body_unregisters_bunker() {
    let mut app = App::new();
    app.init_resource::<BunkerRegistry>()
        .add_systems(Update, unregister_despawned_bunkers);

    let body = app.world_mut().spawn_empty().id();
    let id = app
        .world_mut()
        .resource_mut::<BunkerRegistry>()
        .register(three_slot_bunker().with_body(body));
    app.world_mut().entity_mut(body).insert(BunkerBody { id });
    app.update();

    app.world_mut().despawn(body);
    app.update();

    assert!(!app.world().resource::<BunkerRegistry>().contains(id));
}

#[test]
fn test_slot_markers_sync_and_fallback() {
    let mut app = App::new();
    app.init_resource::<BunkerRegistry>()
        .add_systems(Update, sync_slot_markers);

    let marker = app
        .world_mut()
        .spawn(Transform::from_xyz(300.0, 20.0, 40.0))
        .id();
    let fallback = Transform::from_xyz(0.0, 0.0, 10.0);
    let id = app.world_mut().resource_mut::<BunkerRegistry>().register(Bunker::with_slots(
        "marked",
        Transform::IDENTITY,
        SlotSet::new(vec![CoverSlot::at_marker("m0", marker, fallback)]),
    ));

    app.update();
    let synced = app.world().resource::<BunkerRegistry>().get(id).and_then(|b| b.slot_world_transform(0));
    assert_eq!(synced.map(|t| t.translation), Some(Vec3::new(300.0, 20.0, 40.0)));

    app.world_mut().despawn(marker);
    app.update();
    let fell_back = app.world().resource::<BunkerRegistry>().get(id).and_then(|b| b.slot_world_transform(0));
    assert_eq!(fell_back.map(|t| t.translation), Some(Vec3::new(0.0, 0.0, 10.0)));
}

#[test]
fn test_child_slot_marker_composes_with_body_transform() {
    let mut app = App::new();
    app.init_resource::<BunkerRegistry>()
        .add_systems(Update, sync_slot_markers);

    let body = app.world_mut().spawn(Transform::from_xyz(1000.0, 0.0, 0.0)).id();
    let marker = app
        .world_mut()
        .spawn((Transform::from_xyz(100.0, 0.0, 0.0), ChildOf(body)))
        .id();
    let id = app.world_mut().resource_mut::<BunkerRegistry>().register(Bunker::with_slots(
        "parented",
        Transform::from_xyz(1000.0, 0.0, 0.0),
        SlotSet::new(vec![CoverSlot::at_marker(
            "m0",
            marker,
            Transform::from_xyz(100.0, 0.0, 0.0),
        )]),
    ));

    let before = app.world().resource::<BunkerRegistry>().get(id).and_then(|b| b.slot_world_transform(0));
    assert_eq!(before.map(|t| t.translation), Some(Vec3::new(1100.0, 0.0, 0.0)));

    app.update();
    let synced = app.world().resource::<BunkerRegistry>().get(id).and_then(|b| b.slot_world_transform(0));
    assert_eq!(synced.map(|t| t.translation), Some(Vec3::new(1100.0, 0.0, 0.0)));

    // Body повернут на 90° вокруг Y: local +X → world -Z
    app.world_mut()
        .entity_mut(body)
        .insert(Transform::from_xyz(1000.0, 0.0, 0.0).with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)));
    app.update();
    let rotated = app
        .world()
        .resource::<BunkerRegistry>()
        .get(id)
        .and_then(|b| b.slot_world_transform(0))
        .map(|t| t.translation);
    let rotated = rotated.unwrap_or(Vec3::ZERO);
    assert!((rotated - Vec3::new(1000.0, 0.0, -100.0)).length() < 1e-3, "{rotated:?}");
}
