//! Advisor scoring: сбор кандидатов и взвешенная оценка.
//!
//! Score = −Wd·dist/100 + Wf·cos(forward, dir) − We·[exposed] + Ws·[stance ok] − Wn·[same position]

use super::{AdvisorConfig, AdvisorWeights, CoverSuggestion};
use crate::bunker::{BunkerId, BunkerRegistry};
use crate::components::Stance;
use crate::geometry::CollisionWorld;
use crate::surface::{PositionRef, ALPHA_EPSILON};
use bevy::prelude::*;

/// От чьего имени советуем
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisorView {
    pub actor: Entity,
    pub location: Vec3,
    pub forward: Vec3,
    pub stance: Stance,
    /// Текущая позиция в укрытии
    pub current: Option<(BunkerId, PositionRef)>,
}

/// Позиция-кандидат до scoring'а
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisorCandidate {
    pub bunker: BunkerId,
    pub position: PositionRef,
    pub world_transform: Transform,
    pub body: Option<Entity>,
}

/// Свободные позиции всех bunkers (кроме текущего) в радиусе
///
/// Spline: {Tmin, ближайшая, Tmax} без дублей.
pub fn gather_candidates(
    registry: &BunkerRegistry,
    config: &AdvisorConfig,
    view: &AdvisorView,
) -> Vec<AdvisorCandidate> {
    let current_bunker = view.current.map(|(bunker, _)| bunker);
    let mut candidates = Vec::new();

    for bunker in registry.iter() {
        if config.exclude_current_bunker && Some(bunker.id) == current_bunker {
            continue;
        }

        let positions: Vec<PositionRef> = match (bunker.surface.spline(), bunker.find_closest_alpha(view.location)) {
            (Some(spline), Some(closest)) => {
                let mut alphas: Vec<f32> = Vec::with_capacity(3);
                for alpha in [spline.t_min(), closest, spline.t_max()] {
                    if !alphas.iter().any(|a| (a - alpha).abs() < ALPHA_EPSILON) {
                        alphas.push(alpha);
                    }
                }
                alphas.into_iter().map(PositionRef::Alpha).collect()
            }
            _ => (0..bunker.slot_count()).map(PositionRef::Slot).collect(),
        };

        for position in positions {
            if !bunker.is_free_for(position, view.actor) {
                continue;
            }
            let Some(world_transform) = bunker.transform_at(position) else {
                continue;
            };
            if world_transform.translation.distance(view.location) > config.search_radius {
                continue;
            }
            candidates.push(AdvisorCandidate {
                bunker: bunker.id,
                position,
                world_transform,
                body: bunker.body,
            });
        }
    }

    candidates
}

/// Хоть один враг видит позицию (trace с уровня глаз)
///
/// Trace, упёршийся в собственный bunker кандидата, тоже считается exposed.
pub fn is_exposed(
    collision: &dyn CollisionWorld,
    config: &AdvisorConfig,
    candidate: &AdvisorCandidate,
    actor: Entity,
    enemies: &[(Entity, Vec3)],
) -> bool {
    let target = candidate.world_transform.translation;
    enemies.iter().any(|(enemy, location)| {
        let eye = *location + Vec3::Y * config.enemy_eye_height;
        match collision.line_trace(eye, target, &[actor, *enemy]) {
            None => true,
            Some(hit) => hit.entity.is_some() && hit.entity == candidate.body,
        }
    })
}

pub fn score_candidate(
    registry: &BunkerRegistry,
    collision: &dyn CollisionWorld,
    config: &AdvisorConfig,
    weights: &AdvisorWeights,
    view: &AdvisorView,
    enemies: &[(Entity, Vec3)],
    candidate: &AdvisorCandidate,
) -> f32 {
    let target = candidate.world_transform.translation;
    let distance = target.distance(view.location);
    let mut score = -weights.distance_penalty * distance * 0.01;

    if config.use_forward_bias {
        let direction = (target - view.location).normalize_or_zero();
        score += weights.forward_bias * view.forward.normalize_or_zero().dot(direction).clamp(-1.0, 1.0);
    }

    if is_exposed(collision, config, candidate, view.actor, enemies) {
        score -= weights.exposed_penalty;
    }

    let stance_ok = registry
        .get(candidate.bunker)
        .is_some_and(|bunker| bunker.is_stance_allowed(candidate.position, view.stance));
    if stance_ok {
        score += weights.stance_comfort;
    }

    if let Some((bunker, position)) = view.current {
        if bunker == candidate.bunker && same_position(position, candidate.position, config.novelty_alpha_window) {
            score -= weights.novelty;
        }
    }

    score
}

fn same_position(a: PositionRef, b: PositionRef, alpha_window: f32) -> bool {
    match (a, b) {
        (PositionRef::Slot(a), PositionRef::Slot(b)) => a == b,
        (PositionRef::Alpha(a), PositionRef::Alpha(b)) => (a - b).abs() < alpha_window,
        _ => false,
    }
}

/// Лучший кандидат: строго больший score побеждает (ничья → первый)
pub fn pick_best(
    registry: &BunkerRegistry,
    collision: &dyn CollisionWorld,
    config: &AdvisorConfig,
    weights: &AdvisorWeights,
    view: &AdvisorView,
    enemies: &[(Entity, Vec3)],
) -> Option<CoverSuggestion> {
    let mut best: Option<CoverSuggestion> = None;
    for candidate in gather_candidates(registry, config, view) {
        let score = score_candidate(registry, collision, config, weights, view, enemies, &candidate);
        if best.is_none_or(|b| score > b.score) {
            best = Some(CoverSuggestion {
                bunker: candidate.bunker,
                position: candidate.position,
                world_transform: candidate.world_transform,
                score,
            });
        }
    }
    best
}
