//! Tests for cover state machine: entry, stance forcing, traverse, lean, exit.

use super::*;
use crate::bunker::{Bunker, BunkerId, BunkerRegistry};
use crate::components::{CameraBoom, CharacterCapsule, CharacterMovement, Stance};
use crate::error::CoverError;
use crate::geometry::{StaticBox, StaticGeometry};
use crate::selection::SelectionConfig;
use crate::surface::{CoverSlot, CoverSpline, PeekDirection, PositionRef, SlotSet};
use bevy::prelude::*;

const DT: f32 = 1.0 / 60.0;

/// Персонаж без ECS: компоненты лежат в структуре, операции вызываются напрямую
struct Rig {
    entity: Entity,
    transform: Transform,
    capsule: CharacterCapsule,
    movement: CharacterMovement,
    camera: CameraBoom,
    tuning: CoverTuning,
    cover: BunkerCover,
}

impl Rig {
    /// Стоит на полу (y = 0) в точке (x, z), смотрит в -Z
    fn standing_at(x: f32, z: f32) -> Self {
        Self {
            entity: Entity::from_raw(1),
            transform: Transform::from_xyz(x, 88.0, z),
            capsule: CharacterCapsule::default(),
            movement: CharacterMovement::default(),
            camera: CameraBoom::default(),
            tuning: CoverTuning::default(),
            cover: BunkerCover::default(),
        }
    }

    fn run<R>(
        &mut self,
        registry: &mut BunkerRegistry,
        world: &StaticGeometry,
        f: impl FnOnce(&mut BunkerCover, &mut CoverActor, &mut CoverEnv) -> R,
    ) -> R {
        let selection = SelectionConfig::default();
        let mut actor = CoverActor {
            entity: self.entity,
            transform: &mut self.transform,
            capsule: &mut self.capsule,
            movement: &mut self.movement,
            camera: Some(&mut self.camera),
            tuning: &self.tuning,
        };
        let mut env = CoverEnv {
            registry,
            collision: world,
            selection: &selection,
        };
        f(&mut self.cover, &mut actor, &mut env)
    }

    fn settle(&mut self, registry: &mut BunkerRegistry, world: &StaticGeometry) {
        for _ in 0..120 {
            self.run(registry, world, |cover, actor, env| cover.tick(actor, env, DT));
        }
    }
}

fn body() -> Entity {
    Entity::from_raw(100)
}

/// Пол + стена z ∈ [440, 500], лицо стены на z = 500
fn wall_world() -> StaticGeometry {
    StaticGeometry::new(vec![
        StaticBox::floor(0.0, 5000.0),
        StaticBox::new(Vec3::new(0.0, 50.0, 470.0), Vec3::new(300.0, 50.0, 30.0)).with_entity(body()),
    ])
}

/// Три slot'а вдоль стены, все смотрят в -Z (персонаж на стороне +Z)
fn wall_bunker() -> Bunker {
    let slots = SlotSet::new(vec![
        CoverSlot::new("left", Transform::from_xyz(-200.0, 0.0, 0.0)),
        CoverSlot::new("center", Transform::from_xyz(0.0, 0.0, 0.0))
            .with_stances(&[Stance::Crouch])
            .with_peeks(&[PeekDirection::Left]),
        CoverSlot::new("right", Transform::from_xyz(200.0, 0.0, 0.0)),
    ]);
    Bunker::with_slots("wall", Transform::from_xyz(0.0, 0.0, 500.0), slots).with_body(body())
}

fn setup() -> (BunkerRegistry, BunkerId, StaticGeometry) {
    let mut registry = BunkerRegistry::default();
    let id = registry.register(wall_bunker());
    (registry, id, wall_world())
}

fn assert_near(actual: Vec3, expected: Vec3, what: &str) {
    assert!(
        (actual - expected).length() < 1e-2,
        "{}: expected {:?}, got {:?}",
        what,
        expected,
        actual
    );
}

#[test]
fn test_enter_forces_slot_stance_and_aligns() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(0.0, 800.0);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(1))
    })
    .expect("slot 1 is free");

    assert_eq!(rig.capsule.stance, Stance::Crouch, "crouch-only slot forces crouch");
    assert_eq!(rig.cover.phase, CoverPhase::InPosition);
    assert!(rig.cover.transition.is_some(), "entry blends");
    assert_eq!(
        registry.get(id).and_then(|b| b.claimant_at(PositionRef::Slot(1))),
        Some(rig.entity)
    );

    // hug = anchor + Z·(30 + 42·0.6 + 12), y = floor + 44 + 1.5
    let expected = Vec3::new(0.0, 45.5, 567.2);
    let aligned = rig.cover.aligned.expect("aligned transform");
    assert_near(aligned.translation, expected, "aligned");

    rig.settle(&mut registry, &world);

    assert!(rig.cover.transition.is_none());
    assert!(rig.cover.base.is_some());
    assert_near(rig.transform.translation, expected, "settled");
    assert_near(rig.transform.forward().as_vec3(), Vec3::NEG_Z, "faces the cover");
}

#[test]
fn test_entry_sets_camera_and_exit_restores_it() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.movement.max_walk_speed = 480.0;

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");

    assert_eq!(rig.camera.arm_length, 260.0);
    assert!(rig.camera.do_collision_test);
    // view right (+X) совпадает со slot right (+X) → правое плечо
    assert_eq!(rig.camera.socket_offset, Vec3::new(55.0, 0.0, 0.0));

    rig.settle(&mut registry, &world);
    rig.run(&mut registry, &world, |cover, actor, env| cover.exit_cover(actor, env));

    assert_eq!(rig.cover.phase, CoverPhase::None);
    assert_eq!(rig.cover.current(), None);
    assert_eq!(rig.camera.arm_length, 400.0);
    assert_eq!(rig.camera.socket_offset, Vec3::ZERO);
    assert_eq!(rig.movement.max_walk_speed, 480.0);
    assert!(!registry.get(id).is_some_and(|b| b.is_slot_occupied(0)));
}

#[test]
fn test_exit_is_idempotent() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    for _ in 0..2 {
        rig.run(&mut registry, &world, |cover, actor, env| cover.exit_cover(actor, env));
        assert_eq!(rig.cover.phase, CoverPhase::None);
        assert_eq!(rig.camera.arm_length, 400.0);
    }
    assert_eq!(rig.cover.selection_policy, SelectionPolicy::Global);
}

#[test]
fn test_reentry_yields_identical_alignment() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("first entry");
    let first_aligned = rig.cover.aligned;
    rig.settle(&mut registry, &world);
    let first_pose = rig.transform;

    rig.run(&mut registry, &world, |cover, actor, env| cover.exit_cover(actor, env));
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("second entry");
    rig.settle(&mut registry, &world);

    assert_eq!(rig.cover.aligned, first_aligned, "alignment is deterministic");
    assert_near(rig.transform.translation, first_pose.translation, "re-entered pose");
    assert_near(
        rig.transform.translation,
        Vec3::new(-200.0, 89.5, 567.2),
        "standing slot keeps stand half-height",
    );
}

#[test]
fn test_occupied_slot_leaves_state_untouched() {
    let (mut registry, id, world) = setup();
    let stranger = Entity::from_raw(50);
    if let Some(bunker) = registry.get_mut(id) {
        bunker.claim_slot(2, stranger);
    }
    let mut rig = Rig::standing_at(200.0, 800.0);

    let result = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(2))
    });

    assert_eq!(
        result,
        Err(CoverError::SlotOccupied {
            bunker: id,
            position: PositionRef::Slot(2)
        })
    );
    assert_eq!(rig.cover.phase, CoverPhase::None);
    assert_eq!(rig.capsule.stance, Stance::Stand);
    assert_eq!(rig.camera.arm_length, 400.0, "camera untouched on rejection");
    assert_eq!(
        registry.get(id).and_then(|b| b.claimant_at(PositionRef::Slot(2))),
        Some(stranger)
    );
}

#[test]
fn test_unknown_and_invalid_positions_are_rejected() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(0.0, 800.0);

    let unknown = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, BunkerId(99), PositionRef::Slot(0))
    });
    let out_of_range = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(7))
    });
    let alpha_on_slots = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover_at_alpha(actor, env, id, 0.5)
    });

    assert_eq!(unknown, Err(CoverError::UnknownBunker(BunkerId(99))));
    assert!(matches!(out_of_range, Err(CoverError::InvalidPosition { .. })));
    assert!(matches!(alpha_on_slots, Err(CoverError::InvalidPosition { .. })));
    assert_eq!(rig.cover.phase, CoverPhase::None);
}

#[test]
fn test_busy_while_blending() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    let second = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(2))
    });

    assert_eq!(second, Err(CoverError::Busy));
    assert!(!registry.get(id).is_some_and(|b| b.is_slot_occupied(2)));
}

#[test]
fn test_traverse_best_with_no_other_free_slot_fails() {
    let (mut registry, id, world) = setup();
    let stranger = Entity::from_raw(50);
    if let Some(bunker) = registry.get_mut(id) {
        bunker.claim_slot(1, stranger);
        bunker.claim_slot(2, stranger);
    }
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    let result = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.traverse_best_slot_on_current_bunker(actor, env)
    });

    assert_eq!(result, Err(CoverError::NoCandidates));
    assert_eq!(rig.cover.current(), Some((id, PositionRef::Slot(0))));
    assert_eq!(rig.cover.selection_policy, SelectionPolicy::SameBunkerOnly);
}

#[test]
fn test_traverse_best_moves_within_bunker() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.traverse_best_slot_on_current_bunker(actor, env)
    })
    .expect("other slots are free");

    let (bunker, position) = rig.cover.current().expect("still in cover");
    assert_eq!(bunker, id);
    assert_ne!(position, PositionRef::Slot(0));
    assert!(!registry.get(id).is_some_and(|b| b.is_slot_occupied(0)), "old slot released");
}

#[test]
fn test_traverse_right_and_left_pick_furthest_free_slot() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    rig.run(&mut registry, &world, |cover, actor, env| cover.traverse_right(actor, env))
        .expect("free slots to the right");
    assert_eq!(rig.cover.position, Some(PositionRef::Slot(2)));
    assert!(rig.cover.transition.is_some(), "slide between slots blends");
    rig.settle(&mut registry, &world);
    assert_near(rig.transform.translation, Vec3::new(200.0, 89.5, 567.2), "right slot");

    let further = rig.run(&mut registry, &world, |cover, actor, env| cover.traverse_right(actor, env));
    assert_eq!(further, Err(CoverError::NoCandidates));

    rig.run(&mut registry, &world, |cover, actor, env| cover.traverse_left(actor, env))
        .expect("free slots to the left");
    assert_eq!(rig.cover.position, Some(PositionRef::Slot(0)));
    let bunker = registry.get(id).expect("bunker");
    assert!(!bunker.is_slot_occupied(2));
    assert!(bunker.is_slot_occupied(0));
}

#[test]
fn test_adjacent_slot_prefers_larger_offset() {
    let bunker = wall_bunker();
    let claimant = Entity::from_raw(1);

    assert_eq!(find_adjacent_free_slot(&bunker, 0, 1.0, claimant), Some(2));
    assert_eq!(find_adjacent_free_slot(&bunker, 1, -1.0, claimant), Some(0));
    assert_eq!(find_adjacent_free_slot(&bunker, 0, -1.0, claimant), None);
}

#[test]
fn test_lean_offsets_from_base_and_returns() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    rig.run(&mut registry, &world, |cover, _, env| cover.set_lean_axis(env.registry, 1.0))
        .expect("all peeks allowed on slot 0");
    assert_eq!(rig.cover.phase, CoverPhase::Peeking);
    assert_eq!(rig.cover.exposure, Exposure::Peeking);
    assert_eq!(rig.cover.peek, PeekDirection::Right);

    rig.settle(&mut registry, &world);
    // right (+X)·28 + up·8
    assert_near(rig.transform.translation, Vec3::new(-172.0, 97.5, 567.2), "leaning");

    rig.run(&mut registry, &world, |cover, _, env| cover.set_lean_axis(env.registry, 0.0))
        .expect("lean back");
    rig.settle(&mut registry, &world);
    assert_eq!(rig.cover.phase, CoverPhase::InPosition);
    assert_eq!(rig.cover.exposure, Exposure::Hidden);
    assert_near(rig.transform.translation, Vec3::new(-200.0, 89.5, 567.2), "back at base");
}

#[test]
fn test_lean_is_blocked_by_adjacent_geometry() {
    let (mut registry, id, _) = setup();
    // колонна справа от slot 0: левая грань на x = -140
    let world = StaticGeometry::new(vec![
        StaticBox::floor(0.0, 5000.0),
        StaticBox::new(Vec3::new(0.0, 50.0, 470.0), Vec3::new(300.0, 50.0, 30.0)).with_entity(body()),
        StaticBox::new(Vec3::new(-130.0, 100.0, 567.2), Vec3::new(10.0, 100.0, 50.0)),
    ]);
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);
    assert_near(rig.transform.translation, Vec3::new(-200.0, 89.5, 567.2), "hugging");

    rig.run(&mut registry, &world, |cover, _, env| cover.set_lean_axis(env.registry, 1.0))
        .expect("lean right");
    rig.settle(&mut registry, &world);

    // свободный lean дошёл бы до x = -172; капсула (r = 42) упирается в колонну
    let x = rig.transform.translation.x;
    assert!(x > -190.0, "leaned toward the pillar, x = {}", x);
    assert!(x + rig.capsule.radius <= -140.0, "capsule stays out of the pillar, x = {}", x);

    rig.run(&mut registry, &world, |cover, _, env| cover.set_lean_axis(env.registry, 0.0))
        .expect("lean back");
    rig.settle(&mut registry, &world);
    assert_near(rig.transform.translation, Vec3::new(-200.0, 89.5, 567.2), "back at base");
}

#[test]
fn test_illegal_lean_and_stance_are_rejected() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(0.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(1))
    })
    .expect("enter");

    let busy = rig.run(&mut registry, &world, |cover, _, env| cover.set_lean_axis(env.registry, -1.0));
    assert_eq!(busy, Err(CoverError::Busy), "lean waits for the blend");

    rig.settle(&mut registry, &world);

    let right = rig.run(&mut registry, &world, |cover, _, env| cover.set_lean_axis(env.registry, 1.0));
    assert_eq!(right, Err(CoverError::IllegalPeek(PeekDirection::Right)));
    assert_eq!(rig.cover.phase, CoverPhase::InPosition);

    let stand = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.set_stance(actor, env, Stance::Stand)
    });
    assert_eq!(stand, Err(CoverError::IllegalStance(Stance::Stand)));
    assert_eq!(rig.capsule.stance, Stance::Crouch);

    let depth = rig.run(&mut registry, &world, |cover, _, env| {
        cover.set_peek(env.registry, PeekDirection::Left, true)
    });
    assert_eq!(depth, Ok(30.0));
    assert_eq!(rig.cover.phase, CoverPhase::Peeking);
}

#[test]
fn test_stance_change_in_cover_keeps_feet_planted() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.set_stance(actor, env, Stance::Crouch)
    })
    .expect("slot 0 allows every stance");
    rig.settle(&mut registry, &world);

    assert_near(rig.transform.translation, Vec3::new(-200.0, 45.5, 567.2), "crouched hug");
    assert_eq!(rig.cover.base.map(|b| b.half_height), Some(44.0));
}

#[test]
fn test_spline_slide_clamps_to_range() {
    let mut registry = BunkerRegistry::default();
    let spline = CoverSpline::new(vec![Vec3::new(-200.0, 0.0, 0.0), Vec3::new(200.0, 0.0, 0.0)]);
    let id = registry.register(Bunker::with_spline(
        "rail",
        Transform::from_xyz(0.0, 0.0, 500.0),
        spline,
    ));
    let world = StaticGeometry::new(vec![StaticBox::floor(0.0, 5000.0)]);
    let mut rig = Rig::standing_at(0.0, 800.0);

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover_at_alpha(actor, env, id, 0.5)
    })
    .expect("enter spline");
    assert_eq!(rig.capsule.stance, Stance::Crouch, "spline default stance");
    rig.settle(&mut registry, &world);

    rig.run(&mut registry, &world, |cover, actor, env| cover.traverse_right(actor, env))
        .expect("slide right");
    rig.settle(&mut registry, &world);
    let alpha = rig.cover.position.and_then(PositionRef::alpha).expect("alpha");
    assert!((alpha - 0.52).abs() < 1e-4, "alpha = {}", alpha);
    assert!((rig.transform.translation.x - 8.0).abs() < 0.5, "x = {}", rig.transform.translation.x);
    assert!((rig.transform.translation.z - 567.2).abs() < 1e-2);

    rig.run(&mut registry, &world, |cover, actor, env| cover.slide_along_cover(actor, env, 5.0))
        .expect("slide to the end");
    rig.settle(&mut registry, &world);
    assert_eq!(rig.cover.position, Some(PositionRef::Alpha(1.0)));

    rig.run(&mut registry, &world, |cover, actor, env| cover.slide_along_cover(actor, env, 0.1))
        .expect("slide past the end is a no-op");
    assert!(rig.cover.transition.is_none());
}

#[test]
fn test_enter_best_far_away_navigates_then_blends() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(0.0, 1500.0);

    rig.run(&mut registry, &world, |cover, actor, env| cover.enter_best_cover(actor, env))
        .expect("wall is in range");

    assert_eq!(rig.cover.phase, CoverPhase::Approaching);
    assert_eq!(rig.cover.approach_mode, ApproachMode::Nav);
    assert_eq!(rig.cover.bunker, Some(id));
    assert_eq!(rig.movement.max_walk_speed, 220.0);
    let target = rig.cover.approach_target.expect("approach point");
    assert_eq!(rig.movement.nav_target(), Some(target));

    // внешний mover довёл персонажа
    rig.transform.translation = target;
    rig.run(&mut registry, &world, |cover, actor, env| cover.tick(actor, env, DT));

    assert_eq!(rig.cover.phase, CoverPhase::InPosition);
    assert!(rig.cover.transition.is_some());
    assert_eq!(rig.movement.nav_target(), None);
    assert_eq!(rig.movement.max_walk_speed, 500.0, "walk speed restored on arrival");

    rig.settle(&mut registry, &world);
    assert!(rig.cover.is_settled() && !rig.cover.is_busy());
}

#[test]
fn test_enter_best_close_by_nudges() {
    let (mut registry, _, world) = setup();
    let mut rig = Rig::standing_at(0.0, 800.0);

    rig.run(&mut registry, &world, |cover, actor, env| cover.enter_best_cover(actor, env))
        .expect("wall is in range");
    assert_eq!(rig.cover.approach_mode, ApproachMode::Nudge);

    rig.run(&mut registry, &world, |cover, actor, env| cover.tick(actor, env, DT));
    assert!(rig.movement.pending_input.z < 0.0, "input pushes toward the wall");
    assert_eq!(rig.cover.phase, CoverPhase::Approaching);
}

#[test]
fn test_exit_during_approach_stops_navigation() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(0.0, 1500.0);
    rig.run(&mut registry, &world, |cover, actor, env| cover.enter_best_cover(actor, env))
        .expect("approach");

    rig.run(&mut registry, &world, |cover, actor, env| cover.exit_cover(actor, env));

    assert_eq!(rig.cover.phase, CoverPhase::None);
    assert_eq!(rig.movement.nav_target(), None);
    assert_eq!(rig.movement.max_walk_speed, 500.0);
    let bunker = registry.get(id).expect("bunker");
    assert!((0..3).all(|i| !bunker.is_slot_occupied(i)));
}

#[test]
fn test_failed_navigation_abandons_approach() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(0.0, 1500.0);
    rig.run(&mut registry, &world, |cover, actor, env| cover.enter_best_cover(actor, env))
        .expect("approach");

    rig.movement.stop_movement_immediately();
    rig.run(&mut registry, &world, |cover, actor, env| cover.tick(actor, env, DT));

    assert_eq!(rig.cover.phase, CoverPhase::None);
    assert!(registry.get(id).is_some_and(|b| b.occupancy().claimants().is_empty()));
}

#[test]
fn test_enter_nearest_toggles() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(190.0, 600.0);

    rig.run(&mut registry, &world, |cover, actor, env| cover.enter_nearest_cover(actor, env))
        .expect("enter nearest");
    assert_eq!(rig.cover.current(), Some((id, PositionRef::Slot(2))));

    rig.settle(&mut registry, &world);
    rig.run(&mut registry, &world, |cover, actor, env| cover.enter_nearest_cover(actor, env))
        .expect("toggle off");
    assert_eq!(rig.cover.phase, CoverPhase::None);
}

#[test]
fn test_unregistered_bunker_forces_exit() {
    let (mut registry, id, world) = setup();
    let mut rig = Rig::standing_at(-200.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, id, PositionRef::Slot(0))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    registry.unregister(id);
    rig.run(&mut registry, &world, |cover, actor, env| cover.tick(actor, env, DT));

    assert_eq!(rig.cover.phase, CoverPhase::None);
    assert_eq!(rig.camera.arm_length, 400.0);
}

#[test]
fn test_suggestions_skip_current_bunker_and_behind() {
    let (mut registry, wall, world) = setup();
    let ahead = |name: &str, x: f32| {
        Bunker::with_slots(
            name,
            Transform::from_xyz(x, 0.0, -300.0),
            SlotSet::new(vec![CoverSlot::new("a", Transform::IDENTITY)]),
        )
    };
    let first = registry.register(ahead("crate_a", -150.0));
    let second = registry.register(ahead("crate_b", 150.0));
    let behind = registry.register(Bunker::with_slots(
        "behind",
        Transform::from_xyz(0.0, 0.0, 1600.0),
        SlotSet::new(vec![CoverSlot::new("b", Transform::IDENTITY)]),
    ));

    let mut rig = Rig::standing_at(0.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, wall, PositionRef::Slot(1))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);

    let count = rig.run(&mut registry, &world, |cover, actor, env| {
        cover.refresh_suggestions(actor, env)
    });

    assert_eq!(count, 2);
    let suggested: Vec<BunkerId> = rig.cover.suggestions.iter().map(|c| c.bunker).collect();
    assert!(suggested.contains(&first) && suggested.contains(&second));
    assert!(!suggested.contains(&wall), "current bunker excluded");
    assert!(!suggested.contains(&behind), "outside the view cone");

    rig.cover.next_suggestion().expect("cycle");
    assert_eq!(rig.cover.suggestion_index, 1);
    rig.cover.next_suggestion().expect("cycle");
    assert_eq!(rig.cover.suggestion_index, 0, "wraps around");
    rig.cover.previous_suggestion().expect("cycle");
    assert_eq!(rig.cover.suggestion_index, 1);
}

#[test]
fn test_confirm_advances_past_stale_pick() {
    let (mut registry, wall, world) = setup();
    let crate_at = |x: f32| {
        Bunker::with_slots(
            "crate",
            Transform::from_xyz(x, 0.0, -300.0),
            SlotSet::new(vec![CoverSlot::new("a", Transform::IDENTITY)]),
        )
    };
    registry.register(crate_at(-150.0));
    registry.register(crate_at(150.0));

    let mut rig = Rig::standing_at(0.0, 800.0);
    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.enter_cover(actor, env, wall, PositionRef::Slot(1))
    })
    .expect("enter");
    rig.settle(&mut registry, &world);
    rig.run(&mut registry, &world, |cover, actor, env| cover.refresh_suggestions(actor, env));

    // кто-то занял первую suggestion после refresh
    let stale = rig.cover.suggestions[0];
    let other = rig.cover.suggestions[1];
    registry
        .get_mut(stale.bunker)
        .map(|b| b.claim(stale.position, Entity::from_raw(50)))
        .expect("bunker")
        .expect("claim");

    rig.run(&mut registry, &world, |cover, actor, env| {
        cover.confirm_selected_suggestion(actor, env)
    })
    .expect("falls through to the next suggestion");

    assert_eq!(rig.cover.bunker, Some(other.bunker));
    assert_eq!(rig.cover.suggestion_index, 1);
    assert!(!registry.get(wall).is_some_and(|b| b.is_slot_occupied(1)), "wall slot released");
}
