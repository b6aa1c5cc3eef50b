//! Cover surface: дискретные slots или непрерывный spline.
//!
//! Обе модели отвечают на одни и те же вопросы о позиции:
//! - world transform (forward = cover normal, смотрит из укрытия в сторону угрозы)
//! - normal
//! - legality stance / peek direction
//!
//! Позиция адресуется либо индексом slot'а, либо alpha ∈ [Tmin, Tmax]: никогда обоими
//! на одном bunker'е (`normalize` отбрасывает несовпадающий вариант).

mod slots;
mod spline;


pub use slots::{CoverSlot, SlotAnchor, SlotSet};
pub use spline::{CoverSpline, PeekRegion, RegionMatch, StanceRegion};

use crate::components::Stance;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Entry radius по умолчанию (cm)
pub const DEFAULT_ENTRY_RADIUS: f32 = 75.0;

/// Две alpha считаются одной позицией, если ближе этого
pub const ALPHA_EPSILON: f32 = 1e-3;

/// Направление выглядывания
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum PeekDirection {
    None,
    Left,
    Right,
    Over,
}

impl Default for PeekDirection {
    fn default() -> Self {
        Self::None
    }
}

impl PeekDirection {
    /// -1 для Left, +1 для Right, 0 иначе
    pub fn lateral_sign(self) -> f32 {
        match self {
            PeekDirection::Left => -1.0,
            PeekDirection::Right => 1.0,
            PeekDirection::None | PeekDirection::Over => 0.0,
        }
    }

    pub fn from_axis(axis: f32) -> Self {
        if axis < 0.0 {
            PeekDirection::Left
        } else if axis > 0.0 {
            PeekDirection::Right
        } else {
            PeekDirection::None
        }
    }
}

/// Адрес позиции на поверхности
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub enum PositionRef {
    Slot(usize),
    Alpha(f32),
}

impl PositionRef {
    pub fn slot(self) -> Option<usize> {
        match self {
            PositionRef::Slot(index) => Some(index),
            PositionRef::Alpha(_) => None,
        }
    }

    pub fn alpha(self) -> Option<f32> {
        match self {
            PositionRef::Alpha(alpha) => Some(alpha),
            PositionRef::Slot(_) => None,
        }
    }

    /// Та же позиция (alpha сравниваются с допуском)
    pub fn same_as(self, other: PositionRef) -> bool {
        match (self, other) {
            (PositionRef::Slot(a), PositionRef::Slot(b)) => a == b,
            (PositionRef::Alpha(a), PositionRef::Alpha(b)) => (a - b).abs() <= ALPHA_EPSILON,
            _ => false,
        }
    }
}

/// Поверхность укрытия (выбирается один раз при authoring'е bunker'а)
#[derive(Debug, Clone)]
pub enum CoverSurface {
    Slots(SlotSet),
    Spline(CoverSpline),
}

impl CoverSurface {
    pub fn is_spline(&self) -> bool {
        matches!(self, CoverSurface::Spline(_))
    }

    pub fn slot_set(&self) -> Option<&SlotSet> {
        match self {
            CoverSurface::Slots(set) => Some(set),
            CoverSurface::Spline(_) => None,
        }
    }

    pub fn spline(&self) -> Option<&CoverSpline> {
        match self {
            CoverSurface::Spline(spline) => Some(spline),
            CoverSurface::Slots(_) => None,
        }
    }

    /// Валидирует позицию: slot index в диапазоне, alpha зажимается в [Tmin, Tmax].
    pub fn normalize(&self, position: PositionRef) -> Option<PositionRef> {
        match (self, position) {
            (CoverSurface::Slots(set), PositionRef::Slot(index)) => {
                (index < set.len()).then_some(position)
            }
            (CoverSurface::Spline(spline), PositionRef::Alpha(alpha)) => {
                Some(PositionRef::Alpha(spline.clamp_t(alpha)))
            }
            _ => None,
        }
    }

    pub fn transform_at(&self, bunker: &Transform, position: PositionRef) -> Option<Transform> {
        match (self, self.normalize(position)?) {
            (CoverSurface::Slots(set), PositionRef::Slot(index)) => set.world_transform(bunker, index),
            (CoverSurface::Spline(spline), PositionRef::Alpha(alpha)) => {
                Some(spline.world_transform_at(bunker, alpha))
            }
            _ => None,
        }
    }

    /// Cover normal (горизонтальный, нормализованный)
    pub fn normal_at(&self, bunker: &Transform, position: PositionRef) -> Option<Vec3> {
        let normal = match (self, self.normalize(position)?) {
            (CoverSurface::Slots(set), PositionRef::Slot(index)) => {
                set.world_transform(bunker, index)?.forward().as_vec3()
            }
            (CoverSurface::Spline(spline), PositionRef::Alpha(alpha)) => spline.outward_at(bunker, alpha),
            _ => return None,
        };
        let flat = Vec3::new(normal.x, 0.0, normal.z).normalize_or_zero();
        (flat != Vec3::ZERO).then_some(flat)
    }

    pub fn is_stance_allowed(&self, position: PositionRef, stance: Stance) -> bool {
        match (self, self.normalize(position)) {
            (CoverSurface::Slots(set), Some(PositionRef::Slot(index))) => {
                set.get(index).is_some_and(|slot| slot.allows_stance(stance))
            }
            (CoverSurface::Spline(spline), Some(PositionRef::Alpha(alpha))) => {
                spline.required_stance_at(alpha) == stance
            }
            _ => false,
        }
    }

    /// Stance, в которой персонаж окажется на позиции: текущая если разрешена,
    /// иначе первая разрешённая (slot) / обязательная (spline).
    pub fn resolve_stance(&self, position: PositionRef, current: Stance) -> Option<Stance> {
        match (self, self.normalize(position)?) {
            (CoverSurface::Slots(set), PositionRef::Slot(index)) => {
                set.get(index).map(|slot| slot.resolve_stance(current))
            }
            (CoverSurface::Spline(spline), PositionRef::Alpha(alpha)) => {
                Some(spline.required_stance_at(alpha))
            }
            _ => None,
        }
    }

    /// Legal max peek depth (cm) для направления, `None` = запрещено
    pub fn peek_allowance(&self, position: PositionRef, direction: PeekDirection) -> Option<f32> {
        if direction == PeekDirection::None {
            return None;
        }
        match (self, self.normalize(position)?) {
            (CoverSurface::Slots(set), PositionRef::Slot(index)) => set.get(index)?.peek_allowance(direction),
            (CoverSurface::Spline(spline), PositionRef::Alpha(alpha)) => {
                spline.is_peek_allowed_at(alpha, direction)
            }
            _ => None,
        }
    }

    pub fn entry_radius(&self, position: PositionRef) -> f32 {
        match (self, position) {
            (CoverSurface::Slots(set), PositionRef::Slot(index)) => set
                .get(index)
                .map(|slot| slot.entry_radius)
                .unwrap_or(DEFAULT_ENTRY_RADIUS),
            _ => DEFAULT_ENTRY_RADIUS,
        }
    }
}
