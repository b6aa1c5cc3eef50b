//! Pure-функции поверх `CollisionWorld`: floor snap, arrival, sweep move, LOS.

use super::{CapsuleShape, CollisionWorld, TraceHit};
use bevy::prelude::*;

/// Минимальный normal.y, при котором поверхность считается полом
pub const WALKABLE_FLOOR_NORMAL_Y: f32 = 0.5;

/// Зазор, на котором sweep останавливается перед препятствием
pub const SWEEP_SKIN: f32 = 0.1;

/// Высота пола в точке (x, z): trace вниз от `top_y` до `bottom_y`.
///
/// Hit принимается только если поверхность достаточно горизонтальна и trace
/// не стартовал внутри геометрии.
pub fn query_floor_y(
    world: &dyn CollisionWorld,
    xz: Vec2,
    top_y: f32,
    bottom_y: f32,
    ignore: &[Entity],
) -> Option<f32> {
    let start = Vec3::new(xz.x, top_y, xz.y);
    let end = Vec3::new(xz.x, bottom_y, xz.y);

    let hit = world.line_trace(start, end, ignore)?;
    if !hit.start_penetrating && hit.normal.y >= WALKABLE_FLOOR_NORMAL_Y {
        Some(hit.location.y)
    } else {
        None
    }
}

/// Высота центра капсулы, стоящей на полу: floor + half_height + padding
pub fn floor_center_y(floor_y: f32, half_height: f32, padding: f32) -> f32 {
    floor_y + half_height + padding
}

/// Допуск прибытия с учётом радиуса капсулы
///
/// Капсула "касается" цели своим краем: stop distance меньше радиуса бессмысленна.
pub fn capsule_aware_arrive(stop_distance: f32, radius: f32) -> f32 {
    stop_distance.max(radius)
}

/// Горизонтальная (XZ) дистанция
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

pub fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Line of sight: ничего не пересекает отрезок
pub fn has_line_of_sight(world: &dyn CollisionWorld, from: Vec3, to: Vec3, ignore: &[Entity]) -> bool {
    world.line_trace(from, to, ignore).is_none()
}

/// Результат collision-respecting перемещения
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepMove {
    pub location: Vec3,
    pub hit: Option<TraceHit>,
}

/// Переместить капсулу из `from` в `to` со sweep'ом.
///
/// - нет hit → `to`
/// - hit → останавливаемся на `SWEEP_SKIN` до контакта
/// - start penetrating → остаёмся в `from`, hit сообщает глубину (caller решает, как выталкивать)
pub fn sweep_move(
    world: &dyn CollisionWorld,
    from: Vec3,
    to: Vec3,
    capsule: CapsuleShape,
    ignore: &[Entity],
) -> SweepMove {
    let delta = to - from;
    let length = delta.length();
    if length < 1e-4 {
        return SweepMove { location: to, hit: None };
    }

    match world.sweep_capsule(from, to, capsule, ignore) {
        None => SweepMove { location: to, hit: None },
        Some(hit) if hit.start_penetrating => SweepMove {
            location: from,
            hit: Some(hit),
        },
        Some(hit) => {
            let travel = (hit.distance - SWEEP_SKIN).max(0.0);
            SweepMove {
                location: from + delta / length * travel,
                hit: Some(hit),
            }
        }
    }
}

/// Экспоненциальное сближение (frame-rate independent для малых dt)
pub fn interp_to(current: f32, target: f32, dt: f32, speed: f32) -> f32 {
    if speed <= 0.0 {
        return target;
    }
    let distance = target - current;
    if distance * distance < 1e-8 {
        return target;
    }
    current + distance * (dt * speed).clamp(0.0, 1.0)
}
