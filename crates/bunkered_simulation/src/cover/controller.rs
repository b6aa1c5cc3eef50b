//! Мутирующие операции cover state machine.
//!
//! Все операции работают на authoritative стороне: получают персонажа (`CoverActor`) и
//! мир (`CoverEnv`) явно. Правила:
//! - валидация и alignment считаются ДО claim'а → при ошибке состояние не меняется
//! - claim-before-release при смене позиции
//! - пока идёт approach или blend: `CoverError::Busy`

use super::alignment::{compute_alignment_transform, compute_approach_point, AlignmentQuery};
use super::state::{ApproachMode, BunkerCover, CoverPhase, CoverTransition, Exposure, SavedCamera, SelectionPolicy};
use super::tuning::CoverTuning;
use crate::bunker::{Bunker, BunkerId, BunkerRegistry};
use crate::components::{CameraBoom, CharacterCapsule, CharacterMovement, Stance};
use crate::error::{CoverError, CoverResult};
use crate::geometry::{
    capsule_aware_arrive, has_line_of_sight, planar_distance, CapsuleShape, CollisionWorld,
};
use crate::logger::{log, log_info, log_warning};
use crate::selection::{top_k_across_bunkers, top_k_within_bunker, BunkerCandidate, SelectionConfig, Viewpoint};
use crate::surface::{PeekDirection, PositionRef};
use bevy::prelude::*;

/// Высота "глаз" над центром капсулы для LOS проверки approach'а
const APPROACH_EYE_HEIGHT: f32 = 44.0;

/// Минимальный сдвиг вдоль right, чтобы slot считался соседним (cm)
const ADJACENT_MIN_ALONG: f32 = 5.0;

/// Сколько лучших позиций текущего bunker'а смотреть при traverse (включая текущую)
const TRAVERSE_SEARCH_COUNT: usize = 3;

/// Персонаж, над которым выполняется операция
pub struct CoverActor<'a> {
    pub entity: Entity,
    pub transform: &'a mut Transform,
    pub capsule: &'a mut CharacterCapsule,
    pub movement: &'a mut CharacterMovement,
    pub camera: Option<&'a mut CameraBoom>,
    pub tuning: &'a CoverTuning,
}

impl CoverActor<'_> {
    pub fn location(&self) -> Vec3 {
        self.transform.translation
    }

    /// Control rotation если есть камера, иначе forward тела
    pub fn view_forward(&self) -> Vec3 {
        match self.camera.as_deref() {
            Some(camera) => camera.view_forward(),
            None => self.transform.forward().as_vec3(),
        }
    }

    pub fn shape(&self) -> CapsuleShape {
        CapsuleShape::new(self.capsule.radius, self.capsule.half_height())
    }

    pub fn viewpoint(&self) -> Viewpoint {
        Viewpoint::new(self.location(), self.view_forward()).for_claimant(self.entity)
    }
}

/// Мир, в котором выполняется операция
pub struct CoverEnv<'a> {
    pub registry: &'a mut BunkerRegistry,
    pub collision: &'a dyn CollisionWorld,
    pub selection: &'a SelectionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStyle {
    /// Сразу blend в позицию (traverse, accept suggestion)
    Blend,
    /// Approach (nudge/nav), затем короткий entry blend
    Approach,
}

/// Всё, что нужно для входа, посчитанное до claim'а
#[derive(Debug, Clone, Copy)]
struct EntryPlan {
    bunker: BunkerId,
    position: PositionRef,
    stance: Stance,
    normal: Vec3,
    aligned: Transform,
    approach_point: Vec3,
}

/// Соседний свободный slot в направлении `dir_sign` (+1 вправо, -1 влево).
///
/// Предпочитается наибольший сдвиг вдоль right; при равном (±1cm): ближайший.
pub fn find_adjacent_free_slot(
    bunker: &Bunker,
    current: usize,
    dir_sign: f32,
    claimant: Entity,
) -> Option<usize> {
    let origin = bunker.slot_world_transform(current)?.translation;
    let right = bunker.slot_normal(current)?.cross(Vec3::Y).normalize_or_zero();

    let mut best: Option<(usize, f32, f32)> = None;
    for index in (0..bunker.slot_count()).filter(|i| *i != current) {
        if !bunker.is_free_for(PositionRef::Slot(index), claimant) {
            continue;
        }
        let Some(location) = bunker.slot_world_transform(index).map(|t| t.translation) else {
            continue;
        };
        let delta = location - origin;
        let along = delta.dot(right) * dir_sign;
        if along <= ADJACENT_MIN_ALONG {
            continue;
        }
        let distance = Vec3::new(delta.x, 0.0, delta.z).length();
        let better = match best {
            None => true,
            Some((_, best_along, best_distance)) => {
                along > best_along + 1.0
                    || ((along - best_along).abs() <= 1.0 && distance < best_distance)
            }
        };
        if better {
            best = Some((index, along, distance));
        }
    }
    best.map(|(index, _, _)| index)
}

impl BunkerCover {
    // --- вход ---

    /// Вход в конкретную позицию: claim и сразу blend (без approach фазы)
    pub fn enter_cover(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
        bunker: BunkerId,
        position: PositionRef,
    ) -> CoverResult<()> {
        self.begin_entry(actor, env, bunker, position, EntryStyle::Blend)
    }

    pub fn enter_cover_at_alpha(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
        bunker: BunkerId,
        alpha: f32,
    ) -> CoverResult<()> {
        self.enter_cover(actor, env, bunker, PositionRef::Alpha(alpha))
    }

    /// Лучший кандидат среди других bunkers → approach
    pub fn enter_best_cover(&mut self, actor: &mut CoverActor, env: &mut CoverEnv) -> CoverResult<()> {
        if self.is_busy() {
            return Err(CoverError::Busy);
        }
        let viewer = actor.viewpoint();
        // "F" никогда не выбирает текущий bunker
        let candidates = top_k_across_bunkers(
            env.registry,
            env.selection,
            &viewer,
            actor.tuning.best_cover_search_count,
            self.bunker,
        );
        self.try_candidates(actor, env, &candidates, EntryStyle::Approach)
    }

    /// Toggle: в укрытии → выход; иначе ближайшая позиция любого bunker'а в радиусе
    pub fn enter_nearest_cover(&mut self, actor: &mut CoverActor, env: &mut CoverEnv) -> CoverResult<()> {
        if self.phase != CoverPhase::None {
            self.exit_cover(actor, env);
            return Ok(());
        }

        let from = actor.location();
        let radius = actor.tuning.nearest_search_radius;
        let nearest = env
            .registry
            .iter()
            .filter_map(|bunker| {
                let position = match bunker.find_closest_alpha(from) {
                    Some(alpha) => PositionRef::Alpha(alpha),
                    None => PositionRef::Slot(bunker.find_closest_valid_slot(from, radius, actor.entity)?),
                };
                if !bunker.is_free_for(position, actor.entity) {
                    return None;
                }
                let distance = bunker.transform_at(position)?.translation.distance(from);
                (distance <= radius).then_some((bunker.id, position, distance))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2));

        match nearest {
            Some((bunker, position, _)) => {
                self.begin_entry(actor, env, bunker, position, EntryStyle::Approach)
            }
            None => Err(CoverError::NoCandidates),
        }
    }

    // --- выход ---

    /// Снять claim, вернуть камеру и скорость, сбросить состояние. Идемпотентен.
    pub fn exit_cover(&mut self, actor: &mut CoverActor, env: &mut CoverEnv) {
        if self.phase == CoverPhase::None
            && self.bunker.is_none()
            && self.saved_camera.is_none()
            && self.saved_walk_speed.is_none()
        {
            return;
        }

        if let Some((bunker_id, position)) = self.current() {
            match env.registry.get_mut(bunker_id) {
                Some(bunker) => {
                    bunker.release(position, actor.entity);
                }
                None => log_warning(&format!(
                    "Cover: {:?} exiting {:?} which is no longer registered",
                    actor.entity, bunker_id
                )),
            }
        }

        if self.phase == CoverPhase::Approaching || actor.movement.nav_target().is_some() {
            actor.movement.stop_movement_immediately();
        }
        self.restore_saved(actor);

        let from = self.phase;
        self.reset();
        log_info(&format!("Cover: {:?} {:?} → None", actor.entity, from));
    }

    // --- traverse ---

    /// Лучшая другая позиция текущего bunker'а
    pub fn traverse_best_slot_on_current_bunker(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
    ) -> CoverResult<()> {
        let (bunker, position) = self.current().ok_or(CoverError::NotInCover)?;
        self.selection_policy = SelectionPolicy::SameBunkerOnly;
        if self.is_busy() {
            return Err(CoverError::Busy);
        }
        let viewer = actor.viewpoint();
        let candidates: Vec<BunkerCandidate> =
            top_k_within_bunker(env.registry, env.selection, &viewer, bunker, TRAVERSE_SEARCH_COUNT)
                .into_iter()
                .filter(|candidate| !candidate.position.same_as(position))
                .collect();
        self.try_candidates(actor, env, &candidates, EntryStyle::Blend)
    }

    pub fn traverse_left(&mut self, actor: &mut CoverActor, env: &mut CoverEnv) -> CoverResult<()> {
        self.traverse(actor, env, -1.0)
    }

    pub fn traverse_right(&mut self, actor: &mut CoverActor, env: &mut CoverEnv) -> CoverResult<()> {
        self.traverse(actor, env, 1.0)
    }

    fn traverse(&mut self, actor: &mut CoverActor, env: &mut CoverEnv, dir_sign: f32) -> CoverResult<()> {
        let (bunker_id, position) = self.current().ok_or(CoverError::NotInCover)?;
        self.selection_policy = SelectionPolicy::SameBunkerOnly;
        if self.is_busy() {
            return Err(CoverError::Busy);
        }
        let bunker = env
            .registry
            .get(bunker_id)
            .ok_or(CoverError::UnknownBunker(bunker_id))?;

        match position {
            PositionRef::Alpha(alpha) => {
                // рост alpha может идти как вправо, так и влево от персонажа
                let tangent = bunker.tangent_at(alpha).unwrap_or(Vec3::X);
                let right = bunker
                    .normal_at(position)
                    .map(|normal| normal.cross(Vec3::Y))
                    .unwrap_or(Vec3::X);
                let tangent_sign = if tangent.dot(right) >= 0.0 { 1.0 } else { -1.0 };
                let step = dir_sign * tangent_sign * actor.tuning.slide_step_alpha;
                self.slide_along_cover(actor, env, step)
            }
            PositionRef::Slot(index) => {
                let next = find_adjacent_free_slot(bunker, index, dir_sign, actor.entity)
                    .ok_or(CoverError::NoCandidates)?;
                self.enter_cover(actor, env, bunker_id, PositionRef::Slot(next))
            }
        }
    }

    /// Сдвиг по spline на `step` alpha. На краю диапазона: no-op.
    pub fn slide_along_cover(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
        step: f32,
    ) -> CoverResult<()> {
        let (bunker_id, position) = self.current().ok_or(CoverError::NotInCover)?;
        let PositionRef::Alpha(alpha) = position else {
            return Err(CoverError::InvalidPosition {
                bunker: bunker_id,
                position,
            });
        };
        if self.is_busy() {
            return Err(CoverError::Busy);
        }
        let bunker = env
            .registry
            .get(bunker_id)
            .ok_or(CoverError::UnknownBunker(bunker_id))?;
        let Some(target) = bunker.normalize(PositionRef::Alpha(alpha + step)) else {
            return Err(CoverError::InvalidPosition {
                bunker: bunker_id,
                position,
            });
        };
        if target.same_as(position) {
            return Ok(());
        }
        self.enter_cover(actor, env, bunker_id, target)
    }

    // --- lean / peek / stance ---

    /// Lean axis ∈ [-1, 1]; ненулевой → Peeking (если направление разрешено на позиции)
    pub fn set_lean_axis(&mut self, registry: &BunkerRegistry, axis: f32) -> CoverResult<()> {
        let (bunker_id, position) = self.current().ok_or(CoverError::NotInCover)?;
        if self.is_busy() {
            return Err(CoverError::Busy);
        }
        let axis = if axis.is_nan() { 0.0 } else { axis.clamp(-1.0, 1.0) };
        let direction = PeekDirection::from_axis(axis);

        if direction != PeekDirection::None {
            let bunker = registry
                .get(bunker_id)
                .ok_or(CoverError::UnknownBunker(bunker_id))?;
            if bunker.peek_allowance(position, direction).is_none() {
                return Err(CoverError::IllegalPeek(direction));
            }
        }

        self.desired_lean = axis;
        self.apply_peek_direction(direction);
        Ok(())
    }

    /// Включить/выключить peek в направлении. Возвращает legal max depth (cm).
    pub fn set_peek(
        &mut self,
        registry: &BunkerRegistry,
        direction: PeekDirection,
        on: bool,
    ) -> CoverResult<f32> {
        let (bunker_id, position) = self.current().ok_or(CoverError::NotInCover)?;
        if self.is_busy() {
            return Err(CoverError::Busy);
        }

        if !on {
            if direction == PeekDirection::None || self.peek == direction {
                self.desired_lean = 0.0;
                self.apply_peek_direction(PeekDirection::None);
            }
            return Ok(0.0);
        }

        let bunker = registry
            .get(bunker_id)
            .ok_or(CoverError::UnknownBunker(bunker_id))?;
        let max_depth = bunker
            .peek_allowance(position, direction)
            .ok_or(CoverError::IllegalPeek(direction))?;

        self.apply_peek_direction(direction);
        Ok(max_depth)
    }

    /// Снять peek без проверок (peek sub-system на ramp-in / cancel)
    pub(crate) fn clear_peek(&mut self) {
        if self.peek == PeekDirection::None || !self.is_settled() {
            return;
        }
        self.desired_lean = 0.0;
        self.apply_peek_direction(PeekDirection::None);
    }

    fn apply_peek_direction(&mut self, direction: PeekDirection) {
        self.peek = direction;
        if direction == PeekDirection::None {
            self.exposure = Exposure::Hidden;
            self.phase = CoverPhase::InPosition;
        } else {
            self.exposure = Exposure::Peeking;
            self.phase = CoverPhase::Peeking;
        }
    }

    /// Смена stance; в укрытии: только если разрешена на текущей позиции
    pub fn set_stance(&mut self, actor: &mut CoverActor, env: &CoverEnv, stance: Stance) -> CoverResult<()> {
        if let Some((bunker_id, position)) = self.current() {
            let bunker = env
                .registry
                .get(bunker_id)
                .ok_or(CoverError::UnknownBunker(bunker_id))?;
            if !bunker.is_stance_allowed(position, stance) {
                return Err(CoverError::IllegalStance(stance));
            }
        }
        actor.capsule.apply_stance(stance, actor.transform);
        Ok(())
    }

    // --- internals ---

    fn try_candidates(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
        candidates: &[BunkerCandidate],
        style: EntryStyle,
    ) -> CoverResult<()> {
        for candidate in candidates {
            match self.begin_entry(actor, env, candidate.bunker, candidate.position, style) {
                Ok(()) => return Ok(()),
                Err(CoverError::SlotOccupied { .. }) | Err(CoverError::InvalidPosition { .. }) => {
                    continue
                }
                Err(err) => return Err(err),
            }
        }
        Err(CoverError::NoCandidates)
    }

    fn plan_entry(
        &self,
        actor: &CoverActor,
        env: &CoverEnv,
        bunker_id: BunkerId,
        position: PositionRef,
    ) -> CoverResult<EntryPlan> {
        let Some(bunker) = env.registry.get(bunker_id) else {
            log_warning(&format!("Cover: {:?} asked for unknown {:?}", actor.entity, bunker_id));
            return Err(CoverError::UnknownBunker(bunker_id));
        };
        let invalid = CoverError::InvalidPosition {
            bunker: bunker_id,
            position,
        };
        let position = bunker.normalize(position).ok_or(invalid.clone())?;
        if !bunker.is_free_for(position, actor.entity) {
            log(&format!(
                "Cover: {:?} → {:?} {:?} is held by {:?}",
                actor.entity,
                bunker_id,
                position,
                bunker.claimant_at(position)
            ));
            return Err(CoverError::SlotOccupied {
                bunker: bunker_id,
                position,
            });
        }

        let anchor = bunker.transform_at(position).ok_or(invalid.clone())?;
        let normal = bunker.normal_at(position).ok_or(invalid)?;
        let stance = bunker
            .resolve_stance(position, actor.capsule.stance)
            .unwrap_or(actor.capsule.stance);

        let ignore: Vec<Entity> = std::iter::once(actor.entity).chain(bunker.body).collect();
        let query = AlignmentQuery {
            anchor,
            normal,
            radius: actor.capsule.radius,
            half_height: actor.capsule.half_height_for(stance),
            ignore: &ignore,
        };

        Ok(EntryPlan {
            bunker: bunker_id,
            position,
            stance,
            normal,
            aligned: compute_alignment_transform(env.collision, actor.tuning, &query),
            approach_point: compute_approach_point(env.collision, actor.tuning, &query),
        })
    }

    fn begin_entry(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
        bunker_id: BunkerId,
        position: PositionRef,
        style: EntryStyle,
    ) -> CoverResult<()> {
        if self.is_busy() {
            return Err(CoverError::Busy);
        }
        let plan = self.plan_entry(actor, env, bunker_id, position)?;

        if self.is_settled()
            && self.bunker == Some(plan.bunker)
            && self.position.is_some_and(|current| current.same_as(plan.position))
        {
            return Ok(());
        }

        // 1) claim новой позиции
        let claimed = env
            .registry
            .get_mut(plan.bunker)
            .ok_or(CoverError::UnknownBunker(plan.bunker))?
            .claim(plan.position, actor.entity)?;

        // 2) release старой (spline claim того же bunker'а уже переехал при claim)
        let same_bunker = self.bunker == Some(plan.bunker);
        if let Some((old_bunker, old_position)) = self.current() {
            let moved_in_place = same_bunker && old_position.slot().is_none();
            if !moved_in_place {
                if let Some(bunker) = env.registry.get_mut(old_bunker) {
                    bunker.release(old_position, actor.entity);
                }
            }
        }

        let from = self.phase;
        let was_in_cover = self.is_in_cover();

        // 3) stance, камера, состояние
        actor.capsule.apply_stance(plan.stance, actor.transform);
        self.save_and_apply_camera(actor, plan.normal);

        self.bunker = Some(plan.bunker);
        self.position = Some(claimed);
        self.aligned = Some(plan.aligned);
        self.exposure = Exposure::Hidden;
        self.peek = PeekDirection::None;
        self.desired_lean = 0.0;
        self.current_lean = 0.0;
        self.base = None;
        self.approach_target = None;

        let arrive = capsule_aware_arrive(actor.tuning.stop_distance, actor.capsule.radius);
        let to_approach = planar_distance(actor.location(), plan.approach_point);

        if style == EntryStyle::Blend || (was_in_cover && same_bunker) {
            let distance = planar_distance(actor.location(), plan.aligned.translation);
            let duration = actor.tuning.slide_duration(distance);
            self.transition = Some(CoverTransition::new(*actor.transform, plan.aligned, duration));
            self.phase = CoverPhase::InPosition;
        } else if to_approach <= arrive {
            self.transition = Some(CoverTransition::new(
                *actor.transform,
                plan.aligned,
                actor.tuning.entry_blend_time,
            ));
            self.phase = CoverPhase::InPosition;
        } else {
            self.start_approach(actor, env, plan.approach_point, to_approach);
        }

        log_info(&format!(
            "Cover: {:?} {:?} → {:?} at {:?} {:?} ({:?})",
            actor.entity, from, self.phase, plan.bunker, claimed, plan.stance
        ));
        Ok(())
    }

    fn start_approach(&mut self, actor: &mut CoverActor, env: &CoverEnv, target: Vec3, distance: f32) {
        let eye = Vec3::Y * APPROACH_EYE_HEIGHT;
        let clear = has_line_of_sight(
            env.collision,
            actor.location() + eye,
            target + eye,
            &[actor.entity],
        );
        self.approach_mode = if distance <= actor.tuning.nudge_max_distance && clear {
            ApproachMode::Nudge
        } else {
            ApproachMode::Nav
        };

        if self.saved_walk_speed.is_none() {
            self.saved_walk_speed = Some(actor.movement.max_walk_speed);
        }
        actor.movement.max_walk_speed = actor.tuning.approach_walk_speed;
        if self.approach_mode == ApproachMode::Nav {
            actor.movement.move_to(target);
        }

        self.approach_target = Some(target);
        self.transition = None;
        self.phase = CoverPhase::Approaching;
    }

    /// Первый вход: запомнить boom. Каждый вход: плечо по взгляду, arm length, yaw.
    fn save_and_apply_camera(&mut self, actor: &mut CoverActor, normal: Vec3) {
        let Some(camera) = actor.camera.as_deref_mut() else {
            return;
        };
        if self.saved_camera.is_none() {
            self.saved_camera = Some(SavedCamera {
                socket_offset: camera.socket_offset,
                arm_length: camera.arm_length,
                do_collision_test: camera.do_collision_test,
            });
        }

        let slot_right = normal.cross(Vec3::Y).normalize_or_zero();
        let side = if camera.view_right().dot(slot_right) >= 0.0 { 1.0 } else { -1.0 };
        camera.socket_offset = Vec3::new(side * actor.tuning.shoulder_offset, 0.0, 0.0);
        camera.arm_length = actor.tuning.cover_arm_length;
        camera.do_collision_test = true;
        camera.align_yaw_to(normal);
    }

    fn restore_saved(&mut self, actor: &mut CoverActor) {
        if let (Some(saved), Some(camera)) = (self.saved_camera.take(), actor.camera.as_deref_mut()) {
            camera.socket_offset = saved.socket_offset;
            camera.arm_length = saved.arm_length;
            camera.do_collision_test = saved.do_collision_test;
            camera.peek_offset = Vec3::ZERO;
            camera.roll_deg = 0.0;
        }
        if let Some(speed) = self.saved_walk_speed.take() {
            actor.movement.max_walk_speed = speed;
        }
    }

    /// Policy-aware кандидаты для suggestions
    pub(super) fn gather_suggestion_pool(
        &self,
        actor: &CoverActor,
        env: &CoverEnv,
        k: usize,
    ) -> Vec<BunkerCandidate> {
        let viewer = actor.viewpoint();
        match (self.selection_policy, self.current()) {
            (SelectionPolicy::SameBunkerOnly, Some((bunker, position))) => {
                top_k_within_bunker(env.registry, env.selection, &viewer, bunker, k + 1)
                    .into_iter()
                    .filter(|candidate| !candidate.position.same_as(position))
                    .take(k)
                    .collect()
            }
            _ => top_k_across_bunkers(env.registry, env.selection, &viewer, k, self.bunker),
        }
    }
}
