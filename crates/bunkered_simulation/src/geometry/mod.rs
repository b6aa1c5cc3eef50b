//! Geometry / query helpers
//!
//! Cover-логика не знает про конкретный physics backend. Всё, что ей нужно от мира:
//! - line trace (floor snap, LOS, exposure)
//! - capsule sweep (collision-respecting moves)
//!
//! Backends:
//! - `StaticGeometry`: in-memory AABB мир (headless симуляция, тесты)
//! - `RapierCollisionWorld`: adapter поверх bevy_rapier3d context
//!
//! `CoverCollision` (SystemParam) выбирает backend: rapier context если есть, иначе static.

mod query;
mod rapier_world;
mod static_world;


pub use query::*;
pub use rapier_world::{CoverCollision, RapierCollisionWorld};
pub use static_world::{StaticBox, StaticGeometry};

use bevy::prelude::*;

/// Результат trace/sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    /// Точка контакта (для sweep: позиция центра shape в момент контакта)
    pub location: Vec3,
    pub normal: Vec3,
    /// Пройденная дистанция от start до контакта
    pub distance: f32,
    /// Entity, которому принадлежит коллайдер (если известен)
    pub entity: Option<Entity>,
    /// Shape уже пересекал геометрию в start
    pub start_penetrating: bool,
    pub penetration_depth: f32,
}

/// Вертикальная капсула для sweep'ов
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleShape {
    pub radius: f32,
    /// Полная половина высоты (с полусферами)
    pub half_height: f32,
}

impl CapsuleShape {
    pub fn new(radius: f32, half_height: f32) -> Self {
        Self {
            radius,
            half_height: half_height.max(radius),
        }
    }
}

/// World-collision abstraction
///
/// `ignore`: entities, коллайдеры которых пропускаются (сам персонаж, текущий bunker).
pub trait CollisionWorld {
    fn line_trace(&self, start: Vec3, end: Vec3, ignore: &[Entity]) -> Option<TraceHit>;

    fn sweep_capsule(
        &self,
        start: Vec3,
        end: Vec3,
        capsule: CapsuleShape,
        ignore: &[Entity],
    ) -> Option<TraceHit>;
}
