//! Top-K выбор укрытий: ранжирование свободных позиций по дистанции, углу обзора и
//! заполненности bunker'а.
//!
//! Score = Wd·(1 − sigmoid(d / MaxDistance)) + Wa·(cos·0.5 + 0.5) + Wo·(1 − occupancy)
//!
//! Используется cover компонентом (EnterBestCover, suggestions). Advisor считает свой
//! score отдельно (exposure к врагам, stance comfort).

#[cfg(test)]
mod selection_tests;

use crate::bunker::{Bunker, BunkerId, BunkerRegistry};
use crate::geometry::planar;
use crate::surface::PositionRef;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Сколько равномерных alpha сэмплировать на spline bunker'е (плюс ближайшая)
pub const SPLINE_CANDIDATE_SAMPLES: usize = 5;

#[derive(Resource, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Resource)]
pub struct SelectionConfig {
    /// Дальше этого позиции не рассматриваются (cm)
    pub max_distance: f32,
    /// Сколько ближайших позиций скорить (остальные отбрасываются до scoring'а)
    pub prefilter_count: usize,
    pub distance_weight: f32,
    pub angle_weight: f32,
    pub occupancy_weight: f32,
    pub sigmoid_k: f32,
    pub sigmoid_center: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_distance: 3500.0,
            prefilter_count: 64,
            distance_weight: 1.0,
            angle_weight: 0.7,
            occupancy_weight: 0.8,
            sigmoid_k: 8.0,
            sigmoid_center: 0.45,
        }
    }
}

/// Кто выбирает: позиция, направление взгляда, и от чьего имени проверяется занятость
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub location: Vec3,
    pub forward: Vec3,
    pub claimant: Option<Entity>,
}

impl Viewpoint {
    pub fn new(location: Vec3, forward: Vec3) -> Self {
        Self {
            location,
            forward,
            claimant: None,
        }
    }

    pub fn for_claimant(mut self, claimant: Entity) -> Self {
        self.claimant = Some(claimant);
        self
    }

    fn can_take(&self, bunker: &Bunker, position: PositionRef) -> bool {
        match self.claimant {
            Some(claimant) => bunker.is_free_for(position, claimant),
            None => bunker.claimant_at(position).is_none(),
        }
    }
}

/// Оценённая позиция (эфемерная, пересчитывается на каждый запрос)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct BunkerCandidate {
    pub bunker: BunkerId,
    pub position: PositionRef,
    pub world_transform: Transform,
    pub score: f32,
    pub distance: f32,
    /// cos угла между forward и направлением на позицию (в плоскости XZ)
    pub angle_cos: f32,
    pub occupancy_penalty: f32,
}

/// Логистическая функция, x ∈ [0, 1] → (0, 1)
pub fn sigmoid01(x: f32, k: f32, center: f32) -> f32 {
    1.0 / (1.0 + (-k * (x - center)).exp())
}

/// cos угла между взглядом и направлением на точку (XZ). Точка под ногами → 1.
pub fn view_cos(viewer: &Viewpoint, target: Vec3) -> f32 {
    let to_target = planar(target - viewer.location).normalize_or_zero();
    let forward = planar(viewer.forward).normalize_or_zero();
    if to_target == Vec3::ZERO || forward == Vec3::ZERO {
        return 1.0;
    }
    forward.dot(to_target).clamp(-1.0, 1.0)
}

pub fn score_position(
    config: &SelectionConfig,
    viewer: &Viewpoint,
    bunker: &Bunker,
    position: PositionRef,
    world_transform: Transform,
) -> BunkerCandidate {
    let distance = world_transform.translation.distance(viewer.location);
    let angle_cos = view_cos(viewer, world_transform.translation);
    let occupancy_penalty = bunker.occupancy().occupancy_ratio();

    let normalized = distance / config.max_distance.max(1.0);
    let distance_term = 1.0 - sigmoid01(normalized, config.sigmoid_k, config.sigmoid_center);
    let angle_term = angle_cos * 0.5 + 0.5;
    let occupancy_term = 1.0 - occupancy_penalty;

    BunkerCandidate {
        bunker: bunker.id,
        position,
        world_transform,
        score: config.distance_weight * distance_term
            + config.angle_weight * angle_term
            + config.occupancy_weight * occupancy_term,
        distance,
        angle_cos,
        occupancy_penalty,
    }
}

/// Свободные позиции bunker'а в радиусе (slots: все; spline: ближайшая alpha + равномерные)
pub fn free_positions(bunker: &Bunker, viewer: &Viewpoint, max_distance: f32) -> Vec<(PositionRef, Transform)> {
    let positions: Vec<PositionRef> = match bunker.find_closest_alpha(viewer.location) {
        Some(closest) => {
            let mut alphas: Vec<f32> = bunker
                .surface
                .spline()
                .map(|spline| spline.sample_alphas(SPLINE_CANDIDATE_SAMPLES))
                .unwrap_or_default();
            alphas.push(closest);
            alphas.sort_by(f32::total_cmp);
            alphas.dedup_by(|a, b| PositionRef::Alpha(*a).same_as(PositionRef::Alpha(*b)));
            alphas.into_iter().map(PositionRef::Alpha).collect()
        }
        None => (0..bunker.slot_count()).map(PositionRef::Slot).collect(),
    };

    positions
        .into_iter()
        .filter(|position| viewer.can_take(bunker, *position))
        .filter_map(|position| Some((position, bunker.transform_at(position)?)))
        .filter(|(_, transform)| transform.translation.distance(viewer.location) <= max_distance)
        .collect()
}

/// Все кандидаты: prefilter по дистанции, затем scoring. Порядок: по убыванию score.
pub fn build_candidates(
    registry: &BunkerRegistry,
    config: &SelectionConfig,
    viewer: &Viewpoint,
    exclude: Option<BunkerId>,
) -> Vec<BunkerCandidate> {
    let mut nearby: Vec<(&Bunker, PositionRef, Transform, f32)> = registry
        .iter()
        .filter(|bunker| Some(bunker.id) != exclude)
        .flat_map(|bunker| {
            free_positions(bunker, viewer, config.max_distance)
                .into_iter()
                .map(move |(position, transform)| {
                    let distance = transform.translation.distance_squared(viewer.location);
                    (bunker, position, transform, distance)
                })
        })
        .collect();

    nearby.sort_by(|a, b| a.3.total_cmp(&b.3));
    nearby.truncate(config.prefilter_count);

    let mut candidates: Vec<BunkerCandidate> = nearby
        .into_iter()
        .map(|(bunker, position, transform, _)| score_position(config, viewer, bunker, position, transform))
        .collect();
    sort_by_score(&mut candidates);
    candidates
}

/// Лучшая позиция каждого bunker'а, top-K bunkers по score
pub fn top_k_across_bunkers(
    registry: &BunkerRegistry,
    config: &SelectionConfig,
    viewer: &Viewpoint,
    k: usize,
    exclude: Option<BunkerId>,
) -> Vec<BunkerCandidate> {
    let mut best: Vec<BunkerCandidate> = Vec::new();
    for candidate in build_candidates(registry, config, viewer, exclude) {
        // кандидаты уже отсортированы → первый встреченный на bunker'е лучший
        if !best.iter().any(|b| b.bunker == candidate.bunker) {
            best.push(candidate);
        }
    }
    best.truncate(k);
    best
}

/// Top-K свободных позиций одного bunker'а
pub fn top_k_within_bunker(
    registry: &BunkerRegistry,
    config: &SelectionConfig,
    viewer: &Viewpoint,
    bunker: BunkerId,
    k: usize,
) -> Vec<BunkerCandidate> {
    let Some(bunker) = registry.get(bunker) else {
        return Vec::new();
    };
    let mut candidates: Vec<BunkerCandidate> = free_positions(bunker, viewer, config.max_distance)
        .into_iter()
        .map(|(position, transform)| score_position(config, viewer, bunker, position, transform))
        .collect();
    sort_by_score(&mut candidates);
    candidates.truncate(k);
    candidates
}

/// Стабильная сортировка по убыванию score (ничьи: в порядке registry)
fn sort_by_score(candidates: &mut [BunkerCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}
