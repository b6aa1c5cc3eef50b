//! Discrete slots: именованные точки укрытия с фиксированными stance/peek правилами.

use super::{PeekDirection, DEFAULT_ENTRY_RADIUS};
use crate::components::Stance;
use bevy::prelude::*;

/// Откуда slot берёт свой transform
#[derive(Debug, Clone, PartialEq)]
pub enum SlotAnchor {
    /// Transform относительно bunker'а
    Local(Transform),
    /// Child marker entity (editor authoring). `resolved` обновляется `sync_slot_markers`;
    /// пока marker не найден: используется `fallback` (local).
    Marker {
        entity: Entity,
        fallback: Transform,
        resolved: Option<Transform>,
    },
}

impl SlotAnchor {
    pub fn world_transform(&self, bunker: &Transform) -> Transform {
        match self {
            SlotAnchor::Local(local) => bunker.mul_transform(*local),
            SlotAnchor::Marker {
                resolved: Some(world),
                ..
            } => *world,
            SlotAnchor::Marker { fallback, .. } => bunker.mul_transform(*fallback),
        }
    }

    pub fn marker(&self) -> Option<Entity> {
        match self {
            SlotAnchor::Marker { entity, .. } => Some(*entity),
            SlotAnchor::Local(_) => None,
        }
    }
}

/// Один slot. Пустой `allowed_stances` / `allowed_peeks` = разрешено всё.
///
/// Forward slot transform'а = cover normal.
#[derive(Debug, Clone)]
pub struct CoverSlot {
    pub name: String,
    pub anchor: SlotAnchor,
    /// Порядок важен: первая stance форсится на входе, если текущая запрещена
    pub allowed_stances: Vec<Stance>,
    pub allowed_peeks: Vec<PeekDirection>,
    pub entry_radius: f32,
    /// Legal depth (cm) для Left/Right
    pub lateral_peek_offset: f32,
    /// Legal depth (cm) для Over
    pub vertical_peek_offset: f32,
}

impl CoverSlot {
    pub fn new(name: impl Into<String>, local: Transform) -> Self {
        Self {
            name: name.into(),
            anchor: SlotAnchor::Local(local),
            allowed_stances: Vec::new(),
            allowed_peeks: Vec::new(),
            entry_radius: DEFAULT_ENTRY_RADIUS,
            lateral_peek_offset: 30.0,
            vertical_peek_offset: 20.0,
        }
    }

    pub fn at_marker(name: impl Into<String>, entity: Entity, fallback: Transform) -> Self {
        Self {
            anchor: SlotAnchor::Marker {
                entity,
                fallback,
                resolved: None,
            },
            ..Self::new(name, fallback)
        }
    }

    pub fn with_stances(mut self, stances: &[Stance]) -> Self {
        self.allowed_stances = stances.to_vec();
        self
    }

    pub fn with_peeks(mut self, peeks: &[PeekDirection]) -> Self {
        self.allowed_peeks = peeks.to_vec();
        self
    }

    pub fn with_entry_radius(mut self, radius: f32) -> Self {
        self.entry_radius = radius.max(0.0);
        self
    }

    pub fn allows_stance(&self, stance: Stance) -> bool {
        self.allowed_stances.is_empty() || self.allowed_stances.contains(&stance)
    }

    pub fn resolve_stance(&self, current: Stance) -> Stance {
        if self.allows_stance(current) {
            return current;
        }
        self.allowed_stances.first().copied().unwrap_or(current)
    }

    pub fn peek_allowance(&self, direction: PeekDirection) -> Option<f32> {
        if direction == PeekDirection::None {
            return None;
        }
        if !self.allowed_peeks.is_empty() && !self.allowed_peeks.contains(&direction) {
            return None;
        }
        match direction {
            PeekDirection::Left | PeekDirection::Right => Some(self.lateral_peek_offset),
            PeekDirection::Over => Some(self.vertical_peek_offset),
            PeekDirection::None => None,
        }
    }
}

/// Упорядоченный набор slots (индекс = адрес позиции)
#[derive(Debug, Clone, Default)]
pub struct SlotSet {
    slots: Vec<CoverSlot>,
}

impl SlotSet {
    pub fn new(slots: Vec<CoverSlot>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CoverSlot> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoverSlot> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CoverSlot> {
        self.slots.iter_mut()
    }

    pub fn world_transform(&self, bunker: &Transform, index: usize) -> Option<Transform> {
        self.slots.get(index).map(|slot| slot.anchor.world_transform(bunker))
    }
}
