//! In-memory collision мир из axis-aligned boxes.
//!
//! Используется headless симуляцией и тестами (rapier не подключён).
//! Capsule sweep = ray по центру капсулы против box'ов, раздутых на (radius, half_height, radius).
//! Скруглённые углы капсулы игнорируются: результат консервативный.

use super::{CapsuleShape, CollisionWorld, TraceHit};
use bevy::prelude::*;

/// Axis-aligned box (пол, стена, bunker body)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    /// Владелец коллайдера (bunker body и т.д.): для ignore и exposure checks
    pub entity: Option<Entity>,
}

impl StaticBox {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Горизонтальная плита пола: верхняя грань на `top_y`
    pub fn floor(top_y: f32, half_size: f32) -> Self {
        Self::new(
            Vec3::new(0.0, top_y - 10.0, 0.0),
            Vec3::new(half_size, 10.0, half_size),
        )
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    fn inflated(&self, by: Vec3) -> Self {
        Self {
            center: self.center,
            half_extents: self.half_extents + by,
            entity: self.entity,
        }
    }

    fn contains(&self, point: Vec3) -> bool {
        let (lo, hi) = (self.min(), self.max());
        (0..3).all(|axis| point[axis] > lo[axis] && point[axis] < hi[axis])
    }

    /// Минимальная глубина выхода из box'а (для start-penetrating)
    fn penetration_depth(&self, point: Vec3) -> f32 {
        let (lo, hi) = (self.min(), self.max());
        (0..3)
            .map(|axis| (point[axis] - lo[axis]).min(hi[axis] - point[axis]))
            .fold(f32::MAX, f32::min)
            .max(0.0)
    }

    /// Slab test отрезка `start + segment * t`, t ∈ [0, 1].
    ///
    /// Возвращает (t входа, нормаль грани входа). Старт внутри box'а → None
    /// (обрабатывается отдельно через `contains`).
    fn segment_entry(&self, start: Vec3, segment: Vec3) -> Option<(f32, Vec3)> {
        let (lo, hi) = (self.min(), self.max());
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let origin = start[axis];
            let dir = segment[axis];

            if dir.abs() < 1e-8 {
                if origin < lo[axis] || origin > hi[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (lo[axis] - origin) * inv;
            let mut t1 = (hi[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            if t0 > t_enter {
                t_enter = t0;
                let mut n = Vec3::ZERO;
                n[axis] = -dir.signum();
                normal = n;
            }
            t_exit = t_exit.min(t1);

            if t_enter > t_exit {
                return None;
            }
        }

        if t_enter < 0.0 || t_enter > 1.0 {
            return None;
        }
        Some((t_enter, normal))
    }
}

/// Статическая геометрия уровня (resource)
#[derive(Resource, Debug, Clone, Default)]
pub struct StaticGeometry {
    pub boxes: Vec<StaticBox>,
}

impl StaticGeometry {
    pub fn new(boxes: Vec<StaticBox>) -> Self {
        Self { boxes }
    }

    pub fn add(&mut self, static_box: StaticBox) -> &mut Self {
        self.boxes.push(static_box);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    fn cast(
        &self,
        start: Vec3,
        end: Vec3,
        inflate: Vec3,
        ignore: &[Entity],
    ) -> Option<TraceHit> {
        let segment = end - start;
        let length = segment.length();
        let mut best: Option<TraceHit> = None;

        for static_box in &self.boxes {
            if static_box.entity.is_some_and(|e| ignore.contains(&e)) {
                continue;
            }
            let shape = static_box.inflated(inflate);

            if shape.contains(start) {
                let hit = TraceHit {
                    location: start,
                    normal: -segment.normalize_or_zero(),
                    distance: 0.0,
                    entity: static_box.entity,
                    start_penetrating: true,
                    penetration_depth: shape.penetration_depth(start),
                };
                // penetrating hit всегда ближе любого другого
                if best.is_none_or(|b| !b.start_penetrating || b.penetration_depth < hit.penetration_depth) {
                    best = Some(hit);
                }
                continue;
            }

            let Some((t, normal)) = shape.segment_entry(start, segment) else {
                continue;
            };
            let distance = t * length;
            if best.is_none_or(|b| !b.start_penetrating && distance < b.distance) {
                best = Some(TraceHit {
                    location: start + segment * t,
                    normal,
                    distance,
                    entity: static_box.entity,
                    start_penetrating: false,
                    penetration_depth: 0.0,
                });
            }
        }

        best
    }
}

impl CollisionWorld for StaticGeometry {
    fn line_trace(&self, start: Vec3, end: Vec3, ignore: &[Entity]) -> Option<TraceHit> {
        self.cast(start, end, Vec3::ZERO, ignore)
    }

    fn sweep_capsule(
        &self,
        start: Vec3,
        end: Vec3,
        capsule: CapsuleShape,
        ignore: &[Entity],
    ) -> Option<TraceHit> {
        let inflate = Vec3::new(capsule.radius, capsule.half_height, capsule.radius);
        self.cast(start, end, inflate, ignore)
    }
}
