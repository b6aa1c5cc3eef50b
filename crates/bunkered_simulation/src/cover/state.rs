//! Cover state component и вспомогательные типы.

use crate::bunker::BunkerId;
use crate::selection::BunkerCandidate;
use crate::surface::{PeekDirection, PositionRef};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Фаза cover state machine
///
/// None → Approaching → InPosition ⇄ Peeking; InPosition → None (exit), Approaching → None (fail)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum CoverPhase {
    None,
    Approaching,
    InPosition,
    Peeking,
}

impl Default for CoverPhase {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum Exposure {
    Hidden,
    Peeking,
    Exposed,
}

impl Default for Exposure {
    fn default() -> Self {
        Self::Exposed
    }
}

/// Как персонаж добирается до точки подхода
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum ApproachMode {
    /// Короткий чистый путь: movement input прямо к цели
    Nudge,
    /// Navigation goal в CharacterMovement (внешний mover)
    Nav,
}

impl Default for ApproachMode {
    fn default() -> Self {
        Self::Nudge
    }
}

/// Откуда брать suggestions / best cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum SelectionPolicy {
    Global,
    /// Только позиции текущего bunker'а (вне укрытия: как Global)
    SameBunkerOnly,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::Global
    }
}

/// Активный blend (entry или slide между позициями)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct CoverTransition {
    pub start: Transform,
    pub target: Transform,
    pub elapsed: f32,
    pub duration: f32,
}

impl CoverTransition {
    pub fn new(start: Transform, target: Transform, duration: f32) -> Self {
        Self {
            start,
            target,
            elapsed: 0.0,
            duration,
        }
    }

    pub fn alpha(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

/// Базовый transform в укрытии (lean считается от него)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct HugBase {
    pub location: Vec3,
    pub rotation: Quat,
    /// Half-height капсулы в момент захвата: при смене stance база сдвигается по Y
    pub half_height: f32,
}

/// Что сохранить до входа в укрытие и вернуть на выходе
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct SavedCamera {
    pub socket_offset: Vec3,
    pub arm_length: f32,
    pub do_collision_test: bool,
}

/// Cover state персонажа (authoritative на сервере, replica у клиентов)
///
/// Инвариант: `bunker.is_some() ⇔ position.is_some()`.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct BunkerCover {
    pub phase: CoverPhase,
    pub bunker: Option<BunkerId>,
    pub position: Option<PositionRef>,
    pub exposure: Exposure,
    pub peek: PeekDirection,
    pub approach_mode: ApproachMode,
    pub selection_policy: SelectionPolicy,

    /// Точка подхода (Approaching)
    pub approach_target: Option<Vec3>,
    /// Финальный aligned transform текущей позиции
    pub aligned: Option<Transform>,
    pub transition: Option<CoverTransition>,
    pub base: Option<HugBase>,

    /// Lean axis ∈ [-1, 1]
    pub desired_lean: f32,
    pub current_lean: f32,

    pub(crate) saved_camera: Option<SavedCamera>,
    pub(crate) saved_walk_speed: Option<f32>,

    pub suggestions: Vec<BunkerCandidate>,
    pub suggestion_index: usize,

    /// Последняя фаза, о которой отправлен CoverStateChanged
    pub(crate) reported_phase: CoverPhase,
}

impl BunkerCover {
    pub fn with_policy(policy: SelectionPolicy) -> Self {
        Self {
            selection_policy: policy,
            ..Default::default()
        }
    }

    pub fn is_in_cover(&self) -> bool {
        self.bunker.is_some()
    }

    /// InPosition или Peeking
    pub fn is_settled(&self) -> bool {
        matches!(self.phase, CoverPhase::InPosition | CoverPhase::Peeking)
    }

    /// Approach или blend ещё идут
    pub fn is_busy(&self) -> bool {
        self.phase == CoverPhase::Approaching || self.transition.is_some()
    }

    pub fn current(&self) -> Option<(BunkerId, PositionRef)> {
        Some((self.bunker?, self.position?))
    }

    pub fn selected_suggestion(&self) -> Option<&BunkerCandidate> {
        self.suggestions.get(self.suggestion_index)
    }

    /// Сбросить всё, кроме suggestions (policy → Global)
    pub(crate) fn reset(&mut self) {
        *self = Self {
            suggestions: std::mem::take(&mut self.suggestions),
            suggestion_index: self.suggestion_index,
            reported_phase: self.reported_phase,
            ..Default::default()
        };
    }
}
