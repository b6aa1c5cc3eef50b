//! Alignment: где именно стоит тело персонажа у укрытия.
//!
//! Hug location = anchor − normal · (back + radius·0.6 + clearance), Y = floor + half_height + padding,
//! но не ниже Y самого anchor'а (приподнятые anchors). Пола нет → pre-snap точка.

use super::tuning::CoverTuning;
use super::state::CoverTransition;
use crate::geometry::{
    floor_center_y, planar, query_floor_y, sweep_move, xz, CapsuleShape, CollisionWorld,
};
use crate::logger::log;
use bevy::prelude::*;

/// Вход для alignment: anchor позиции и капсула в целевой stance
#[derive(Debug, Clone, Copy)]
pub struct AlignmentQuery<'a> {
    pub anchor: Transform,
    /// Cover normal (горизонтальный, к укрытию)
    pub normal: Vec3,
    pub radius: f32,
    pub half_height: f32,
    pub ignore: &'a [Entity],
}

impl AlignmentQuery<'_> {
    fn face_rotation(&self) -> Quat {
        let flat = planar(self.normal);
        if flat.length_squared() < 1e-6 {
            return self.anchor.rotation;
        }
        Transform::default().looking_to(flat, Vec3::Y).rotation
    }

    fn snap(&self, world: &dyn CollisionWorld, tuning: &CoverTuning, back_off: f32) -> Vec3 {
        let anchor = self.anchor.translation;
        let pre_snap = anchor - planar(self.normal).normalize_or_zero() * back_off;

        let floor = query_floor_y(
            world,
            xz(pre_snap),
            anchor.y + tuning.floor_search_up,
            anchor.y - tuning.floor_search_down,
            self.ignore,
        );

        match floor {
            Some(floor_y) => {
                let clamped = floor_center_y(floor_y, self.half_height, tuning.floor_padding);
                Vec3::new(pre_snap.x, anchor.y.max(clamped), pre_snap.z)
            }
            None => {
                log(&format!(
                    "Cover alignment: no floor under {:?}, keeping pre-snap point",
                    pre_snap
                ));
                pre_snap
            }
        }
    }
}

/// Финальный transform в укрытии (лицом вдоль нормали)
pub fn compute_alignment_transform(
    world: &dyn CollisionWorld,
    tuning: &CoverTuning,
    query: &AlignmentQuery,
) -> Transform {
    let location = query.snap(world, tuning, tuning.hug_back_off(query.radius));
    Transform::from_translation(location).with_rotation(query.face_rotation())
}

/// Точка, к которой персонаж идёт перед blend'ом в aligned transform
pub fn compute_approach_point(
    world: &dyn CollisionWorld,
    tuning: &CoverTuning,
    query: &AlignmentQuery,
) -> Vec3 {
    query.snap(world, tuning, tuning.approach_back_off(query.radius))
}

/// Запас сверх глубины проникновения при выталкивании
pub const PENETRATION_PUSH_MARGIN: f32 = 5.0;

/// Игнор-листы для blend'а: пол ищется сквозь bunker, sweep: нет
#[derive(Debug, Clone, Copy)]
pub struct BlendIgnore<'a> {
    pub floor: &'a [Entity],
    pub sweep: &'a [Entity],
}

/// Один шаг blend'а: planar lerp + slerp, Y пере-снапается к полу.
///
/// Возвращает новый transform персонажа. `normal`: нормаль укрытия цели (выталкивание
/// при start-penetration идёт против неё, от укрытия).
pub fn step_transition(
    world: &dyn CollisionWorld,
    tuning: &CoverTuning,
    transition: &CoverTransition,
    current: Vec3,
    capsule: CapsuleShape,
    normal: Vec3,
    ignore: BlendIgnore,
) -> Transform {
    let alpha = transition.alpha();
    let start = transition.start.translation;
    let target = transition.target.translation;

    let planar_location = start.lerp(target, alpha);
    let rotation = transition
        .start
        .rotation
        .slerp(transition.target.rotation, alpha);

    // пола нет → нижняя граница поиска, т.е. фактически Y цели
    let bottom = start.y.min(target.y) - tuning.floor_search_down;
    let floor_y = query_floor_y(
        world,
        xz(planar_location),
        start.y.max(target.y) + tuning.floor_search_up,
        bottom,
        ignore.floor,
    )
    .unwrap_or(bottom);
    let y = target
        .y
        .max(floor_center_y(floor_y, capsule.half_height, tuning.floor_padding));
    let desired = Vec3::new(planar_location.x, y, planar_location.z);

    let moved = sweep_move(world, current, desired, capsule, ignore.sweep);
    let location = match moved.hit {
        Some(hit) if hit.start_penetrating => {
            // застряли в геометрии → назад, от укрытия
            let away = -planar(normal).normalize_or_zero();
            log(&format!(
                "Cover blend: start penetration {:.2}cm, pushing back",
                hit.penetration_depth
            ));
            current + away * (hit.penetration_depth + PENETRATION_PUSH_MARGIN)
        }
        _ => moved.location,
    };

    Transform::from_translation(location).with_rotation(rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{StaticBox, StaticGeometry};

    fn floor_world() -> StaticGeometry {
        StaticGeometry::new(vec![StaticBox::floor(0.0, 5000.0)])
    }

    fn query_at(anchor: Vec3) -> AlignmentQuery<'static> {
        AlignmentQuery {
            anchor: Transform::from_translation(anchor),
            normal: Vec3::X,
            radius: 42.0,
            half_height: 44.0,
            ignore: &[],
        }
    }

    #[test]
    fn test_alignment_backs_off_and_snaps_to_floor() {
        let tuning = CoverTuning::default();

        let aligned = compute_alignment_transform(&floor_world(), &tuning, &query_at(Vec3::new(500.0, 0.0, 0.0)));

        // 30 + 42·0.6 + 12 = 67.2
        assert!((aligned.translation.x - (500.0 - 67.2)).abs() < 1e-3, "x = {}", aligned.translation.x);
        assert!((aligned.translation.y - 45.5).abs() < 1e-3, "y = {}", aligned.translation.y);
        assert!((aligned.forward().as_vec3() - Vec3::X).length() < 1e-4, "faces the cover");
    }

    #[test]
    fn test_alignment_never_below_elevated_anchor() {
        let tuning = CoverTuning::default();

        let aligned = compute_alignment_transform(&floor_world(), &tuning, &query_at(Vec3::new(0.0, 60.0, 0.0)));

        assert_eq!(aligned.translation.y, 60.0);
    }

    #[test]
    fn test_alignment_without_floor_keeps_pre_snap_point() {
        let tuning = CoverTuning::default();
        let empty = StaticGeometry::default();

        let aligned = compute_alignment_transform(&empty, &tuning, &query_at(Vec3::new(100.0, 7.0, 0.0)));

        assert!((aligned.translation - Vec3::new(100.0 - 67.2, 7.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_approach_point_is_farther_than_hug() {
        let tuning = CoverTuning::default();
        let world = floor_world();
        let query = query_at(Vec3::new(500.0, 0.0, 0.0));

        let approach = compute_approach_point(&world, &tuning, &query);

        // 30 + 42·0.5 + 12 = 63
        assert!((approach.x - 437.0).abs() < 1e-3, "x = {}", approach.x);
    }

    #[test]
    fn test_transition_rises_to_higher_target() {
        let tuning = CoverTuning::default();
        let world = floor_world();
        let start = Transform::from_xyz(0.0, 45.5, 0.0);
        let target = Transform::from_xyz(100.0, 80.0, 0.0);
        let mut transition = CoverTransition::new(start, target, 1.0);
        transition.elapsed = 0.5;

        let step = step_transition(
            &world,
            &tuning,
            &transition,
            start.translation,
            CapsuleShape::new(42.0, 44.0),
            Vec3::Z,
            BlendIgnore { floor: &[], sweep: &[] },
        );

        assert!((step.translation.x - 50.0).abs() < 1e-3);
        assert_eq!(step.translation.y, 80.0, "height follows the higher target, not the lerp");
    }

    #[test]
    fn test_transition_pushes_away_from_cover_on_penetration() {
        let tuning = CoverTuning::default();
        // стена толщиной 20 на x ∈ [90, 110]; капсула уже в ней
        let world = StaticGeometry::new(vec![
            StaticBox::floor(0.0, 5000.0),
            StaticBox::new(Vec3::new(100.0, 100.0, 0.0), Vec3::new(10.0, 100.0, 300.0)),
        ]);
        let current = Vec3::new(60.0, 45.5, 0.0);
        let transition = CoverTransition::new(
            Transform::from_translation(current),
            Transform::from_xyz(60.0, 45.5, 100.0),
            1.0,
        );

        let step = step_transition(
            &world,
            &tuning,
            &transition,
            current,
            CapsuleShape::new(42.0, 44.0),
            Vec3::X,
            BlendIgnore { floor: &[], sweep: &[] },
        );

        assert!(step.translation.x < current.x, "pushed away from the wall: {:?}", step.translation);
    }
}
