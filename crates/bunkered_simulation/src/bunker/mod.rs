//! Bunker: cover surface + occupancy + world transform.
//!
//! Bunkers живут в `BunkerRegistry` (resource), адресуются `BunkerId`. Физическое тело
//! (коллайдер): отдельная entity с `BunkerBody`; её despawn снимает bunker с регистрации.

mod occupancy;
mod registry;

#[cfg(test)]
mod bunker_tests;

pub use occupancy::{OccupancyTable, ReleasePolicy, SplineOccupancy};
pub use registry::{
    release_orphaned_claims, sync_slot_markers, unregister_despawned_bunkers, BunkerBody,
    BunkerRegistry,
};

use crate::components::Stance;
use crate::error::{CoverError, CoverResult};
use crate::surface::{CoverSpline, CoverSurface, PeekDirection, PositionRef, SlotSet};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Радиус поиска свободного slot'а по умолчанию (cm)
pub const DEFAULT_FREE_SLOT_SEARCH: f32 = 5000.0;

/// Стабильный handle bunker'а в registry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
pub struct BunkerId(pub u32);

#[derive(Debug, Clone)]
pub struct Bunker {
    pub id: BunkerId,
    pub name: String,
    pub transform: Transform,
    pub surface: CoverSurface,
    /// Entity с коллайдером укрытия (ignore при sweep'ах, exposure trace)
    pub body: Option<Entity>,
    occupancy: OccupancyTable,
}

impl Bunker {
    pub fn new(name: impl Into<String>, transform: Transform, surface: CoverSurface) -> Self {
        let occupancy = match &surface {
            CoverSurface::Slots(set) => OccupancyTable::for_slots(set.len()),
            CoverSurface::Spline(_) => OccupancyTable::for_spline(),
        };
        Self {
            id: BunkerId(0),
            name: name.into(),
            transform,
            surface,
            body: None,
            occupancy,
        }
    }

    pub fn with_slots(name: impl Into<String>, transform: Transform, slots: SlotSet) -> Self {
        Self::new(name, transform, CoverSurface::Slots(slots))
    }

    pub fn with_spline(name: impl Into<String>, transform: Transform, spline: CoverSpline) -> Self {
        Self::new(name, transform, CoverSurface::Spline(spline))
    }

    pub fn with_body(mut self, body: Entity) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.occupancy.release_policy = policy;
        self
    }

    pub fn with_spline_occupancy(mut self, occupancy: SplineOccupancy) -> Self {
        self.occupancy.spline_occupancy = occupancy;
        self
    }

    pub fn occupancy(&self) -> &OccupancyTable {
        &self.occupancy
    }

    pub fn is_spline(&self) -> bool {
        self.surface.is_spline()
    }

    // --- slots ---

    pub fn slot_count(&self) -> usize {
        self.surface.slot_set().map_or(0, SlotSet::len)
    }

    /// Предпочтительная stance slot'а (первая разрешённая); None = без ограничений / нет slot'а
    pub fn slot_stance(&self, index: usize) -> Option<Stance> {
        self.surface
            .slot_set()?
            .get(index)?
            .allowed_stances
            .first()
            .copied()
    }

    pub fn is_slot_occupied(&self, index: usize) -> bool {
        self.occupancy.is_occupied(PositionRef::Slot(index))
    }

    pub fn slot_world_transform(&self, index: usize) -> Option<Transform> {
        self.transform_at(PositionRef::Slot(index))
    }

    pub fn slot_normal(&self, index: usize) -> Option<Vec3> {
        self.normal_at(PositionRef::Slot(index))
    }

    pub fn claim_slot(&mut self, index: usize, claimant: Entity) -> bool {
        self.occupancy.claim(PositionRef::Slot(index), claimant)
    }

    pub fn release_slot(&mut self, index: usize, claimant: Entity) -> bool {
        self.occupancy.release(PositionRef::Slot(index), claimant)
    }

    /// Ближайший slot, не занятый никем
    pub fn find_nearest_free_slot(&self, from: Vec3, max_distance: f32) -> Option<usize> {
        self.nearest_slot_where(from, max_distance, |index| !self.is_slot_occupied(index))
    }

    /// Ближайший slot, который `claimant` может занять (свободный или уже его)
    pub fn find_closest_valid_slot(
        &self,
        from: Vec3,
        max_distance: f32,
        claimant: Entity,
    ) -> Option<usize> {
        self.nearest_slot_where(from, max_distance, |index| {
            self.occupancy.is_free_for(PositionRef::Slot(index), claimant)
        })
    }

    fn nearest_slot_where(
        &self,
        from: Vec3,
        max_distance: f32,
        accept: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let max_sq = max_distance * max_distance;
        (0..self.slot_count())
            .filter(|index| accept(*index))
            .filter_map(|index| {
                let location = self.slot_world_transform(index)?.translation;
                Some((index, location.distance_squared(from)))
            })
            .filter(|(_, distance_sq)| *distance_sq <= max_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    // --- spline ---

    pub fn find_closest_alpha(&self, world: Vec3) -> Option<f32> {
        self.surface
            .spline()
            .map(|spline| spline.find_closest_t(&self.transform, world))
    }

    pub fn tangent_at(&self, alpha: f32) -> Option<Vec3> {
        self.surface
            .spline()
            .map(|spline| spline.tangent_at(&self.transform, alpha))
    }

    pub fn outward_at(&self, alpha: f32) -> Option<Vec3> {
        self.surface
            .spline()
            .map(|spline| spline.outward_at(&self.transform, alpha))
    }

    // --- общий контракт ---

    pub fn normalize(&self, position: PositionRef) -> Option<PositionRef> {
        self.surface.normalize(position)
    }

    pub fn transform_at(&self, position: PositionRef) -> Option<Transform> {
        self.surface.transform_at(&self.transform, position)
    }

    pub fn normal_at(&self, position: PositionRef) -> Option<Vec3> {
        self.surface.normal_at(&self.transform, position)
    }

    pub fn resolve_stance(&self, position: PositionRef, current: Stance) -> Option<Stance> {
        self.surface.resolve_stance(position, current)
    }

    pub fn is_stance_allowed(&self, position: PositionRef, stance: Stance) -> bool {
        self.surface.is_stance_allowed(position, stance)
    }

    pub fn peek_allowance(&self, position: PositionRef, direction: PeekDirection) -> Option<f32> {
        self.surface.peek_allowance(position, direction)
    }

    pub fn entry_radius(&self, position: PositionRef) -> f32 {
        self.surface.entry_radius(position)
    }

    pub fn claimant_at(&self, position: PositionRef) -> Option<Entity> {
        self.normalize(position)
            .and_then(|position| self.occupancy.claimant_at(position))
    }

    pub fn is_free_for(&self, position: PositionRef, claimant: Entity) -> bool {
        self.normalize(position)
            .is_some_and(|position| self.occupancy.is_free_for(position, claimant))
    }

    /// Claim позиции. Возвращает нормализованную позицию (alpha зажата в [Tmin, Tmax]).
    pub fn claim(&mut self, position: PositionRef, claimant: Entity) -> CoverResult<PositionRef> {
        let Some(normalized) = self.normalize(position) else {
            return Err(CoverError::InvalidPosition {
                bunker: self.id,
                position,
            });
        };
        if self.occupancy.claim(normalized, claimant) {
            Ok(normalized)
        } else {
            Err(CoverError::SlotOccupied {
                bunker: self.id,
                position: normalized,
            })
        }
    }

    pub fn release(&mut self, position: PositionRef, claimant: Entity) -> bool {
        match self.normalize(position) {
            Some(position) => self.occupancy.release(position, claimant),
            None => false,
        }
    }

    pub fn release_all_by(&mut self, claimant: Entity) -> usize {
        self.occupancy.release_all_by(claimant)
    }

    pub(crate) fn slots_mut(&mut self) -> Option<&mut SlotSet> {
        match &mut self.surface {
            CoverSurface::Slots(set) => Some(set),
            CoverSurface::Spline(_) => None,
        }
    }
}
