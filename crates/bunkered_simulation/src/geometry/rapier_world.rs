//! bevy_rapier3d adapter + выбор backend'а для систем.

use super::{CapsuleShape, CollisionWorld, StaticGeometry, TraceHit};
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_rapier3d::parry::math::{Isometry, Point, Real};
use bevy_rapier3d::parry::query::{self as parry_query, PointQuery};
use bevy_rapier3d::parry::shape::Shape;
use bevy_rapier3d::prelude::*;
use bevy_rapier3d::rapier::geometry::Collider as RawCollider;

/// `CollisionWorld` поверх rapier context (ray cast + shape cast)
pub struct RapierCollisionWorld<'a, 'c> {
    context: &'a RapierContext<'c>,
}

impl<'a, 'c> RapierCollisionWorld<'a, 'c> {
    pub fn new(context: &'a RapierContext<'c>) -> Self {
        Self { context }
    }

    fn raw_collider(&self, entity: Entity) -> Option<&RawCollider> {
        let handle = self.context.colliders.entity2collider().get(&entity)?;
        self.context.colliders.colliders.get(*handle)
    }

    /// Глубина точки внутри collider'а: расстояние до ближайшей поверхности
    fn point_depth(&self, entity: Entity, point: Vec3) -> f32 {
        let Some(collider) = self.raw_collider(entity) else {
            return 0.0;
        };
        let point = Point::new(point.x, point.y, point.z);
        let projection = collider.shape().project_point(collider.position(), &point, false);
        if !projection.is_inside {
            return 0.0;
        }
        (projection.point - point).norm()
    }

    /// Глубина взаимного проникновения shape в `center` и collider'а
    fn shape_depth(&self, entity: Entity, center: Vec3, shape: &dyn Shape) -> f32 {
        let Some(collider) = self.raw_collider(entity) else {
            return 0.0;
        };
        let position = Isometry::<Real>::translation(center.x, center.y, center.z);
        match parry_query::contact(&position, shape, collider.position(), collider.shape(), 0.0) {
            Ok(Some(contact)) if contact.dist < 0.0 => -contact.dist,
            _ => 0.0,
        }
    }
}

impl CollisionWorld for RapierCollisionWorld<'_, '_> {
    fn line_trace(&self, start: Vec3, end: Vec3, ignore: &[Entity]) -> Option<TraceHit> {
        let delta = end - start;
        let length = delta.length();
        if length < 1e-4 {
            return None;
        }
        let direction = delta / length;

        let predicate = |entity: Entity| !ignore.contains(&entity);
        let filter = QueryFilter::default().exclude_sensors().predicate(&predicate);

        self.context
            .cast_ray_and_get_normal(start, direction, length, true, filter)
            .map(|(entity, hit)| {
                let start_penetrating = hit.time_of_impact <= 0.0;
                TraceHit {
                    location: hit.point,
                    normal: hit.normal,
                    distance: hit.time_of_impact,
                    entity: Some(entity),
                    start_penetrating,
                    penetration_depth: if start_penetrating {
                        self.point_depth(entity, start)
                    } else {
                        0.0
                    },
                }
            })
    }

    fn sweep_capsule(
        &self,
        start: Vec3,
        end: Vec3,
        capsule: CapsuleShape,
        ignore: &[Entity],
    ) -> Option<TraceHit> {
        let delta = end - start;
        let length = delta.length();
        if length < 1e-4 {
            return None;
        }
        let direction = delta / length;

        // capsule_y принимает половину цилиндрической части
        let segment_half = (capsule.half_height - capsule.radius).max(0.0);
        let collider = Collider::capsule_y(segment_half, capsule.radius);
        let shape: &dyn Shape = &*collider.raw;

        let predicate = |entity: Entity| !ignore.contains(&entity);
        let filter = QueryFilter::default().exclude_sensors().predicate(&predicate);
        let options = ShapeCastOptions::with_max_time_of_impact(length);

        self.context
            .cast_shape(start, Quat::IDENTITY, direction, shape, options, filter)
            .map(|(entity, hit)| {
                let distance = hit.time_of_impact;
                let start_penetrating = distance <= 0.0;
                let normal = hit
                    .details
                    .map(|details| details.normal1)
                    .unwrap_or(-direction);
                TraceHit {
                    location: start + direction * distance,
                    normal,
                    distance,
                    entity: Some(entity),
                    start_penetrating,
                    penetration_depth: if start_penetrating {
                        self.shape_depth(entity, start, shape)
                    } else {
                        0.0
                    },
                }
            })
    }
}

/// Collision backend для cover систем
///
/// Rapier context есть в мире → запросы идут в rapier, иначе в `StaticGeometry`.
#[derive(SystemParam)]
pub struct CoverCollision<'w, 's> {
    geometry: Res<'w, StaticGeometry>,
    rapier: ReadRapierContext<'w, 's>,
}

impl CoverCollision<'_, '_> {
    pub fn with<R>(&self, f: impl FnOnce(&dyn CollisionWorld) -> R) -> R {
        match self.rapier.single() {
            Ok(context) => {
                let world = RapierCollisionWorld::new(&context);
                f(&world)
            }
            Err(_) => f(&*self.geometry),
        }
    }
}
