//! Headless mover: исполняет CharacterMovement (nudge input + navigation goal)
//!
//! Архитектура:
//! - Cover/traversal пишут intent в CharacterMovement, mover двигает Transform
//! - Движение только в плоскости XZ, высоту держит cover (floor snap) или уровень
//! - Коллизии через sweep_move (rapier если есть контекст, иначе StaticGeometry)
//!
//! Детерминизм: fixed timestep (60Hz), без случайности

use bevy::prelude::*;

use crate::components::{CharacterCapsule, CharacterMovement, MovementCommand};
use crate::geometry::{planar, planar_distance, sweep_move, CapsuleShape, CollisionWorld, CoverCollision};
use crate::logger::log;
use crate::SimulationSet;

/// Радиус прибытия navigation goal (cm)
pub const NAV_ARRIVE_DISTANCE: f32 = 5.0;

/// Доля шага, ниже которой считаем, что путь перекрыт
const BLOCKED_PROGRESS_FRACTION: f32 = 0.1;

/// Один шаг mover'а. Возвращает новую позицию центра капсулы.
///
/// - nav goal: идём к цели со скоростью max_walk_speed, у цели (или упёршись) goal сбрасывается
/// - иначе nudge input (× max_walk_speed), input обнуляется
pub fn step_character(
    world: &dyn CollisionWorld,
    entity: Entity,
    location: Vec3,
    movement: &mut CharacterMovement,
    capsule: Option<&CharacterCapsule>,
    dt: f32,
) -> Vec3 {
    let input = std::mem::take(&mut movement.pending_input);
    let shape = capsule
        .map(|capsule| CapsuleShape::new(capsule.radius, capsule.half_height()))
        .unwrap_or_else(|| CapsuleShape::new(42.0, 88.0));
    let ignore = [entity];

    match movement.command {
        MovementCommand::MoveToPosition { target } => {
            let remaining = planar_distance(location, target);
            if remaining <= NAV_ARRIVE_DISTANCE {
                movement.command = MovementCommand::Idle;
                return location;
            }

            let step = (movement.max_walk_speed * dt).min(remaining);
            let direction = planar(target - location).normalize_or_zero();
            let wanted = location + direction * step;
            let result = sweep_move(world, location, wanted, shape, &ignore);

            let travelled = planar_distance(location, result.location);
            if result.hit.is_some() && travelled < step * BLOCKED_PROGRESS_FRACTION {
                // Упёрлись: goal сбрасывается, потребители видят nav_target() == None
                log(&format!("Mover: {:?} blocked on the way to {:?}", entity, target));
                movement.command = MovementCommand::Idle;
            } else if planar_distance(result.location, target) <= NAV_ARRIVE_DISTANCE {
                movement.command = MovementCommand::Idle;
            }
            result.location
        }
        MovementCommand::Idle => {
            let velocity = planar(input) * movement.max_walk_speed;
            if velocity.length_squared() < 1e-6 {
                return location;
            }
            sweep_move(world, location, location + velocity * dt, shape, &ignore).location
        }
    }
}

/// Система: CharacterMovement → Transform
///
/// Работает в FixedUpdate (60Hz), после cover (cover копит nudge input за тик).
pub fn drive_character_movement(
    time: Res<Time<Fixed>>,
    collision: CoverCollision,
    mut query: Query<(Entity, &mut Transform, &mut CharacterMovement, Option<&CharacterCapsule>)>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    collision.with(|world| {
        for (entity, mut transform, mut movement, capsule) in query.iter_mut() {
            if movement.command == MovementCommand::Idle && movement.pending_input == Vec3::ZERO {
                continue;
            }
            let location = step_character(world, entity, transform.translation, &mut movement, capsule, dt);
            if location != transform.translation {
                transform.translation = location;
            }
        }
    });
}

/// Headless mover plugin
///
/// В игре mover: это движок (CharacterMovementComponent / navmesh);
/// здесь его заменяет sweep по collision world.
pub struct CharacterMoverPlugin;

impl Plugin for CharacterMoverPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            drive_character_movement.in_set(SimulationSet::Movement),
        );
    }
}
