//! Peek state: режимы, фазы ramp'а, replicated snapshot, плоскость края укрытия.

use crate::surface::PeekDirection;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Как был начат peek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum PeekMode {
    None,
    /// Короткий tap: ramp out → сразу ramp in
    Burst,
    /// Держится, пока нажата кнопка
    Hold,
    /// Double-tap: остаётся снаружи до явного stop
    Toggle,
}

impl Default for PeekMode {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum PeekPhase {
    Idle,
    RampingOut,
    Holding,
    RampingIn,
}

impl Default for PeekPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Replicated peek state (authority → все)
///
/// Depth квантуется в байт: 0 = за укрытием, 255 = max offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub struct PeekNetState {
    pub direction: PeekDirection,
    pub mode: PeekMode,
    pub depth_q: u8,
}

impl PeekNetState {
    pub fn quantize(alpha: f32) -> u8 {
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    pub fn depth_alpha(&self) -> f32 {
        self.depth_q as f32 / 255.0
    }

    pub fn is_active(&self) -> bool {
        self.direction != PeekDirection::None
    }
}

/// Запрос к authority (input или RPC)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PeekRequest {
    Begin {
        direction: PeekDirection,
        mode: PeekMode,
        depth_hint: u8,
    },
    Stop,
    /// Колесо мыши: ± шаги `depth_step_alpha`
    AdjustDepth { steps: i8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum RampEase {
    /// 1 - (1 - t)³
    Out,
    /// (1 - t)³ к цели
    In,
}

/// Ramp глубины (alpha), продвигается dt каждый tick
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct PeekRamp {
    pub from: f32,
    pub to: f32,
    pub duration: f32,
    pub elapsed: f32,
    pub ease: RampEase,
}

impl PeekRamp {
    pub fn out(from: f32, to: f32, duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: 0.0,
            ease: RampEase::Out,
        }
    }

    pub fn retract(from: f32, duration: f32) -> Self {
        Self {
            from,
            to: 0.0,
            duration,
            elapsed: 0.0,
            ease: RampEase::In,
        }
    }

    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn is_done(&self) -> bool {
        self.progress() >= 1.0
    }

    pub fn value(&self) -> f32 {
        let t = self.progress();
        let rest = (1.0 - t).powi(3);
        match self.ease {
            RampEase::Out => self.from + (self.to - self.from) * (1.0 - rest),
            RampEase::In => self.to + (self.from - self.to) * rest,
        }
    }
}

/// Плоскость края укрытия для peek в направлении `edge`
///
/// `edge`: наружу за край (вправо/влево по поверхности или вверх для Over);
/// signed distance > 0 означает «уже за краем».
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct PeekAnchor {
    pub origin: Vec3,
    pub edge: Vec3,
    pub plane_d: f32,
}

impl PeekAnchor {
    /// `normal`: cover normal позиции (от персонажа к укрытию)
    pub fn new(origin: Vec3, normal: Vec3, direction: PeekDirection) -> Option<Self> {
        let right = normal.cross(Vec3::Y).normalize_or_zero();
        let edge = match direction {
            PeekDirection::None => return None,
            PeekDirection::Left => -right,
            PeekDirection::Right => right,
            PeekDirection::Over => Vec3::Y,
        };
        if edge == Vec3::ZERO {
            return None;
        }
        Some(Self {
            origin,
            edge,
            plane_d: -edge.dot(origin),
        })
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.edge.dot(point) + self.plane_d
    }
}
