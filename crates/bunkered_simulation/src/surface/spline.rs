//! Continuous cover spline.
//!
//! Catmull-Rom через control points (local space bunker'а), параметризованный по длине дуги:
//! alpha ∈ [0, 1] = доля пройденной длины. Используемый участок: [Tmin, Tmax].
//!
//! Правила stance/peek задаются регионами по alpha; как разрешаются пересекающиеся
//! регионы: `RegionMatch` (одинаково для обоих списков).

use super::PeekDirection;
use crate::components::Stance;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Сэмплов на сегмент Catmull-Rom (arc-length таблица)
const SAMPLES_PER_SEGMENT: usize = 16;

/// Как разрешать пересекающиеся регионы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum RegionMatch {
    /// Первый содержащий регион в порядке authoring'а
    FirstMatch,
    /// Peek: максимальная depth среди всех совпавших; stance: самая строгая поза
    MaxDepthOverMatches,
}

impl Default for RegionMatch {
    fn default() -> Self {
        Self::FirstMatch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeekRegion {
    pub t_min: f32,
    pub t_max: f32,
    pub allowed: PeekDirection,
    pub max_depth_cm: f32,
}

impl Default for PeekRegion {
    fn default() -> Self {
        Self {
            t_min: 0.0,
            t_max: 1.0,
            allowed: PeekDirection::None,
            max_depth_cm: 30.0,
        }
    }
}

impl PeekRegion {
    pub fn new(t_min: f32, t_max: f32, allowed: PeekDirection, max_depth_cm: f32) -> Self {
        Self {
            t_min,
            t_max,
            allowed,
            max_depth_cm,
        }
    }

    pub fn contains(&self, alpha: f32) -> bool {
        alpha >= self.t_min && alpha <= self.t_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StanceRegion {
    pub t_min: f32,
    pub t_max: f32,
    pub required: Stance,
}

impl Default for StanceRegion {
    fn default() -> Self {
        Self {
            t_min: 0.0,
            t_max: 1.0,
            required: Stance::Crouch,
        }
    }
}

impl StanceRegion {
    pub fn new(t_min: f32, t_max: f32, required: Stance) -> Self {
        Self {
            t_min,
            t_max,
            required,
        }
    }

    pub fn contains(&self, alpha: f32) -> bool {
        alpha >= self.t_min && alpha <= self.t_max
    }
}

/// Stance вне всех регионов
pub const DEFAULT_SPLINE_STANCE: Stance = Stance::Crouch;

#[derive(Debug, Clone)]
pub struct CoverSpline {
    control_points: Vec<Vec3>,
    t_min: f32,
    t_max: f32,
    /// Outward normal смотрит влево от tangent (иначе вправо)
    pub outward_is_left: bool,
    pub peek_regions: Vec<PeekRegion>,
    pub stance_regions: Vec<StanceRegion>,
    pub region_match: RegionMatch,
    /// Точки кривой (local space), равномерно по параметру сегмента
    samples: Vec<Vec3>,
    /// Накопленная длина до каждого сэмпла
    cumulative: Vec<f32>,
}

impl CoverSpline {
    pub fn new(control_points: Vec<Vec3>) -> Self {
        let samples = sample_catmull_rom(&control_points);
        let mut cumulative = Vec::with_capacity(samples.len());
        let mut length = 0.0;
        for (i, point) in samples.iter().enumerate() {
            if i > 0 {
                length += point.distance(samples[i - 1]);
            }
            cumulative.push(length);
        }

        Self {
            control_points,
            t_min: 0.0,
            t_max: 1.0,
            outward_is_left: true,
            peek_regions: Vec::new(),
            stance_regions: Vec::new(),
            region_match: RegionMatch::default(),
            samples,
            cumulative,
        }
    }

    /// Используемый участок. Значения зажимаются в [0, 1], порядок нормализуется.
    pub fn with_range(mut self, t_min: f32, t_max: f32) -> Self {
        let a = if t_min.is_nan() { 0.0 } else { t_min.clamp(0.0, 1.0) };
        let b = if t_max.is_nan() { 1.0 } else { t_max.clamp(0.0, 1.0) };
        self.t_min = a.min(b);
        self.t_max = a.max(b);
        self
    }

    pub fn with_outward_left(mut self, outward_is_left: bool) -> Self {
        self.outward_is_left = outward_is_left;
        self
    }

    pub fn with_peek_region(mut self, region: PeekRegion) -> Self {
        self.peek_regions.push(region);
        self
    }

    pub fn with_stance_region(mut self, region: StanceRegion) -> Self {
        self.stance_regions.push(region);
        self
    }

    pub fn with_region_match(mut self, region_match: RegionMatch) -> Self {
        self.region_match = region_match;
        self
    }

    pub fn control_points(&self) -> &[Vec3] {
        &self.control_points
    }

    pub fn t_min(&self) -> f32 {
        self.t_min
    }

    pub fn t_max(&self) -> f32 {
        self.t_max
    }

    /// Длина кривой (local space, cm)
    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Saturate в [Tmin, Tmax]; NaN → Tmin
    pub fn clamp_t(&self, alpha: f32) -> f32 {
        if alpha.is_nan() {
            return self.t_min;
        }
        alpha.clamp(self.t_min, self.t_max)
    }

    /// `count` равномерно распределённых alpha на [Tmin, Tmax] (включая концы)
    pub fn sample_alphas(&self, count: usize) -> Vec<f32> {
        match count {
            0 => Vec::new(),
            1 => vec![0.5 * (self.t_min + self.t_max)],
            _ => (0..count)
                .map(|i| self.t_min + (self.t_max - self.t_min) * i as f32 / (count - 1) as f32)
                .collect(),
        }
    }

    /// Индекс сэмпла-конца сегмента, содержащего дистанцию `distance`, и доля внутри сегмента
    fn locate(&self, alpha: f32) -> Option<(usize, f32)> {
        if self.samples.len() < 2 {
            return None;
        }
        let distance = alpha.clamp(0.0, 1.0) * self.length();
        let last = self.samples.len() - 1;
        let end = self
            .cumulative
            .partition_point(|&c| c < distance)
            .clamp(1, last);
        let span = (self.cumulative[end] - self.cumulative[end - 1]).max(1e-6);
        let local = ((distance - self.cumulative[end - 1]) / span).clamp(0.0, 1.0);
        Some((end, local))
    }

    pub fn local_position_at(&self, alpha: f32) -> Vec3 {
        match self.locate(alpha) {
            Some((end, local)) => self.samples[end - 1].lerp(self.samples[end], local),
            None => self.samples.first().copied().unwrap_or(Vec3::ZERO),
        }
    }

    pub fn local_tangent_at(&self, alpha: f32) -> Vec3 {
        self.locate(alpha)
            .map(|(end, _)| (self.samples[end] - self.samples[end - 1]).normalize_or_zero())
            .filter(|tangent| *tangent != Vec3::ZERO)
            .unwrap_or(Vec3::X)
    }

    pub fn position_at(&self, bunker: &Transform, alpha: f32) -> Vec3 {
        bunker.transform_point(self.local_position_at(self.clamp_t(alpha)))
    }

    /// World tangent (нормализованный) в сторону роста alpha
    pub fn tangent_at(&self, bunker: &Transform, alpha: f32) -> Vec3 {
        let tangent = bunker.rotation * self.local_tangent_at(self.clamp_t(alpha));
        tangent.normalize_or(Vec3::X)
    }

    /// Горизонтальный outward normal: Y × tangent (left) или tangent × Y (right)
    pub fn outward_at(&self, bunker: &Transform, alpha: f32) -> Vec3 {
        let tangent = self.tangent_at(bunker, alpha);
        let left = Vec3::Y.cross(tangent);
        let outward = if self.outward_is_left { left } else { -left };
        Vec3::new(outward.x, 0.0, outward.z).normalize_or_zero()
    }

    /// Transform позиции: translation на кривой, forward = outward
    pub fn world_transform_at(&self, bunker: &Transform, alpha: f32) -> Transform {
        let translation = self.position_at(bunker, alpha);
        let outward = self.outward_at(bunker, alpha);
        if outward == Vec3::ZERO {
            return Transform::from_translation(translation).with_rotation(bunker.rotation);
        }
        Transform::from_translation(translation).looking_to(outward, Vec3::Y)
    }

    /// Ближайшая к world точке alpha (зажатая в [Tmin, Tmax])
    pub fn find_closest_t(&self, bunker: &Transform, world: Vec3) -> f32 {
        if self.samples.len() < 2 || self.length() < 1e-3 {
            return self.t_min;
        }
        let local = bunker.compute_affine().inverse().transform_point3(world);

        let mut best_distance_sq = f32::MAX;
        let mut best_along = 0.0;
        for end in 1..self.samples.len() {
            let a = self.samples[end - 1];
            let b = self.samples[end];
            let ab = b - a;
            let len_sq = ab.length_squared();
            let t = if len_sq > 1e-8 {
                ((local - a).dot(ab) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let distance_sq = local.distance_squared(a + ab * t);
            if distance_sq < best_distance_sq {
                best_distance_sq = distance_sq;
                best_along = self.cumulative[end - 1] + t * len_sq.sqrt();
            }
        }

        self.clamp_t(best_along / self.length())
    }

    /// Stance, обязательная на alpha
    pub fn required_stance_at(&self, alpha: f32) -> Stance {
        let alpha = self.clamp_t(alpha);
        let mut matches = self
            .stance_regions
            .iter()
            .filter(|region| region.contains(alpha))
            .map(|region| region.required);

        match self.region_match {
            RegionMatch::FirstMatch => matches.next(),
            RegionMatch::MaxDepthOverMatches => matches.max(),
        }
        .unwrap_or(DEFAULT_SPLINE_STANCE)
    }

    /// Legal max depth (cm) для направления на alpha. Over/None на spline'ах запрещены.
    pub fn is_peek_allowed_at(&self, alpha: f32, direction: PeekDirection) -> Option<f32> {
        if !matches!(direction, PeekDirection::Left | PeekDirection::Right) {
            return None;
        }
        let alpha = self.clamp_t(alpha);
        let mut matches = self
            .peek_regions
            .iter()
            .filter(|region| region.allowed == direction && region.contains(alpha))
            .map(|region| region.max_depth_cm.max(0.0));

        match self.region_match {
            RegionMatch::FirstMatch => matches.next(),
            RegionMatch::MaxDepthOverMatches => matches.reduce(f32::max),
        }
    }
}

/// Сэмплирует uniform Catmull-Rom. Концы продлеваются отражением, чтобы кривая
/// проходила через первую и последнюю точки (2 точки → отрезок).
fn sample_catmull_rom(points: &[Vec3]) -> Vec<Vec3> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut samples = Vec::with_capacity(last * SAMPLES_PER_SEGMENT + 1);
    samples.push(points[0]);

    for i in 0..last {
        let p1 = points[i];
        let p2 = points[i + 1];
        let p0 = if i == 0 { 2.0 * p1 - p2 } else { points[i - 1] };
        let p3 = if i + 1 == last { 2.0 * p2 - p1 } else { points[i + 2] };

        for k in 1..=SAMPLES_PER_SEGMENT {
            let u = k as f32 / SAMPLES_PER_SEGMENT as f32;
            samples.push(catmull_rom(p0, p1, p2, p3, u));
        }
    }

    samples
}

fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, u: f32) -> Vec3 {
    let u2 = u * u;
    let u3 = u2 * u;
    0.5 * (2.0 * p1
        + (p2 - p0) * u
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * u3)
}
