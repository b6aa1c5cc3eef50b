//! Per-tick продвижение cover state: approach → blend → hug (lean).
//! Плюс диспетчер `CoverIntent` → операции.

use super::alignment::{step_transition, BlendIgnore};
use super::controller::{CoverActor, CoverEnv};
use super::events::CoverIntent;
use super::state::{ApproachMode, BunkerCover, CoverPhase, CoverTransition, HugBase};
use crate::error::CoverResult;
use crate::geometry::{capsule_aware_arrive, interp_to, planar_distance, sweep_move};
use crate::logger::{log_info, log_warning};
use bevy::prelude::*;

/// Blend считается завершённым с этого alpha
const TRANSITION_DONE_ALPHA: f32 = 1.0 - 1e-4;

impl BunkerCover {
    /// Один шаг симуляции (dt в секундах)
    pub fn tick(&mut self, actor: &mut CoverActor, env: &mut CoverEnv, dt: f32) {
        if let Some(bunker_id) = self.bunker {
            if !env.registry.contains(bunker_id) {
                log_warning(&format!(
                    "Cover: {:?} lost {:?} (unregistered), exiting",
                    actor.entity, bunker_id
                ));
                self.exit_cover(actor, env);
                return;
            }
        }

        match self.phase {
            CoverPhase::None => {}
            CoverPhase::Approaching => self.tick_approach(actor, env),
            CoverPhase::InPosition | CoverPhase::Peeking => {
                if self.transition.is_some() {
                    self.tick_transition(actor, env, dt);
                } else {
                    self.tick_hug(actor, env, dt);
                }
            }
        }
    }

    fn tick_approach(&mut self, actor: &mut CoverActor, env: &mut CoverEnv) {
        let (Some(target), Some(aligned)) = (self.approach_target, self.aligned) else {
            self.exit_cover(actor, env);
            return;
        };

        let arrive = capsule_aware_arrive(actor.tuning.stop_distance, actor.capsule.radius);
        if planar_distance(actor.location(), target) <= arrive {
            actor.movement.stop_movement_immediately();
            if let Some(speed) = self.saved_walk_speed.take() {
                actor.movement.max_walk_speed = speed;
            }
            self.approach_target = None;
            self.transition = Some(CoverTransition::new(
                *actor.transform,
                aligned,
                actor.tuning.entry_blend_time,
            ));
            self.phase = CoverPhase::InPosition;
            log_info(&format!("Cover: {:?} Approaching → InPosition", actor.entity));
            return;
        }

        match self.approach_mode {
            ApproachMode::Nudge => {
                let direction = target - actor.location();
                let direction = Vec3::new(direction.x, 0.0, direction.z);
                actor
                    .movement
                    .add_movement_input(direction, actor.tuning.approach_move_speed);
            }
            ApproachMode::Nav => {
                // Mover сбросил goal, не дойдя → путь не найден
                if actor.movement.nav_target().is_none() {
                    log_warning(&format!(
                        "Cover: {:?} navigation to {:?} gave up, approach failed",
                        actor.entity, target
                    ));
                    self.exit_cover(actor, env);
                }
            }
        }
    }

    fn tick_transition(&mut self, actor: &mut CoverActor, env: &mut CoverEnv, dt: f32) {
        let Some(mut transition) = self.transition else {
            return;
        };
        let Some((bunker_id, position)) = self.current() else {
            self.transition = None;
            return;
        };
        transition.elapsed += dt;

        let bunker = env.registry.get(bunker_id);
        let body = bunker.and_then(|bunker| bunker.body);
        let normal = bunker
            .and_then(|bunker| bunker.normal_at(position))
            .unwrap_or_else(|| transition.target.forward().as_vec3());

        let floor_ignore: Vec<Entity> = std::iter::once(actor.entity).chain(body).collect();
        let sweep_ignore = [actor.entity];
        let next = step_transition(
            env.collision,
            actor.tuning,
            &transition,
            actor.location(),
            actor.shape(),
            normal,
            BlendIgnore {
                floor: &floor_ignore,
                sweep: &sweep_ignore,
            },
        );

        if transition.alpha() >= TRANSITION_DONE_ALPHA {
            *actor.transform = transition.target;
            self.transition = None;
            self.base = Some(HugBase {
                location: transition.target.translation,
                rotation: transition.target.rotation,
                half_height: actor.capsule.half_height(),
            });
        } else {
            *actor.transform = next;
            self.transition = Some(transition);
        }
    }

    /// Hug: база + lean offset. Смена stance сдвигает базу по Y.
    ///
    /// Позиция двигается sweep'ом: соседняя геометрия ограничивает lean.
    fn tick_hug(&mut self, actor: &mut CoverActor, env: &mut CoverEnv, dt: f32) {
        let Some(mut base) = self.base else {
            return;
        };
        let half_height = actor.capsule.half_height();
        if (half_height - base.half_height).abs() > f32::EPSILON {
            base.location.y += half_height - base.half_height;
            base.half_height = half_height;
        }

        self.current_lean = interp_to(self.current_lean, self.desired_lean, dt, actor.tuning.lean_speed);
        let right = base.rotation * Vec3::X;
        let offset = right * self.current_lean * actor.tuning.lean_lateral
            + Vec3::Y * self.current_lean.abs() * actor.tuning.lean_vertical;

        let body = self
            .bunker
            .and_then(|bunker_id| env.registry.get(bunker_id))
            .and_then(|bunker| bunker.body);
        let ignore: Vec<Entity> = std::iter::once(actor.entity).chain(body).collect();
        let moved = sweep_move(
            env.collision,
            actor.location(),
            base.location + offset,
            actor.shape(),
            &ignore,
        );

        actor.transform.translation = moved.location;
        actor.transform.rotation = base.rotation;
        self.base = Some(base);
    }

    /// Диспетчер intent'ов (input, AI, advisor, RPC)
    pub fn apply_intent(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
        intent: CoverIntent,
    ) -> CoverResult<()> {
        match intent {
            CoverIntent::EnterBest => self.enter_best_cover(actor, env),
            CoverIntent::Enter { bunker, position } => self.enter_cover(actor, env, bunker, position),
            CoverIntent::EnterAtAlpha { bunker, alpha } => {
                self.enter_cover_at_alpha(actor, env, bunker, alpha)
            }
            CoverIntent::EnterNearest => self.enter_nearest_cover(actor, env),
            CoverIntent::Exit => {
                self.exit_cover(actor, env);
                Ok(())
            }
            CoverIntent::TraverseBestOnCurrent => self.traverse_best_slot_on_current_bunker(actor, env),
            CoverIntent::TraverseLeft => self.traverse_left(actor, env),
            CoverIntent::TraverseRight => self.traverse_right(actor, env),
            CoverIntent::Slide { step } => self.slide_along_cover(actor, env, step),
            CoverIntent::SetLeanAxis { axis } => self.set_lean_axis(env.registry, axis),
            CoverIntent::SetPeek { direction, on } => self.set_peek(env.registry, direction, on).map(|_| ()),
            CoverIntent::SetStance { stance } => self.set_stance(actor, env, stance),
            CoverIntent::RefreshSuggestions => {
                self.refresh_suggestions(actor, env);
                Ok(())
            }
            CoverIntent::NextSuggestion => self.next_suggestion(),
            CoverIntent::PreviousSuggestion => self.previous_suggestion(),
            CoverIntent::ConfirmSuggestion => self.confirm_selected_suggestion(actor, env),
        }
    }
}
