//! Настройки peek (per character).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Дистанции в cm, времена в секундах
///
/// Local offsets proxy'ей заданы как (forward, right, up) относительно капсулы.
#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct PeekSettings {
    pub max_offset: f32,
    /// Минимальная глубина burst'а (короткий tap не должен быть «пустым»)
    pub min_burst_offset: f32,
    pub time_out: f32,
    pub time_in: f32,
    pub camera_tilt_deg: f32,
    /// Запас между muzzle и плоскостью края укрытия
    pub margin_clearance: f32,
    pub refractory: f32,
    /// Шаг AdjustDepth (колесо мыши) в alpha
    pub depth_step_alpha: f32,
    /// Depth hint по умолчанию (доля от max)
    pub hint_fraction: f32,

    // Hit proxies
    pub head_radius: f32,
    pub head_local: Vec3,
    pub shoulder_local: Vec3,
    pub gun_local: Vec3,
}

impl Default for PeekSettings {
    fn default() -> Self {
        Self {
            max_offset: 28.0,
            min_burst_offset: 12.0,
            time_out: 0.12,
            time_in: 0.10,
            camera_tilt_deg: 6.0,
            margin_clearance: 2.5,
            refractory: 0.12,
            depth_step_alpha: 0.08,
            hint_fraction: 0.4,
            head_radius: 10.0,
            head_local: Vec3::new(0.0, 10.0, 65.0),
            shoulder_local: Vec3::new(0.0, 15.0, 50.0),
            gun_local: Vec3::new(25.0, 18.0, 45.0),
        }
    }
}

impl PeekSettings {
    pub fn shoulder_radius(&self) -> f32 {
        self.head_radius * 1.2
    }

    pub fn gun_radius(&self) -> f32 {
        self.head_radius * 0.8
    }

    /// Минимальная глубина burst'а в alpha
    pub fn min_burst_alpha(&self) -> f32 {
        (self.min_burst_offset / self.max_offset.max(1e-3)).clamp(0.0, 1.0)
    }

    /// Hint по умолчанию, квантованный в байт
    pub fn default_hint(&self) -> u8 {
        (255.0 * self.hint_fraction.clamp(0.0, 1.0)).round() as u8
    }
}

/// Точка тела персонажа по local offset (forward, right, up)
pub fn body_point(transform: &Transform, local: Vec3) -> Vec3 {
    transform.translation
        + transform.forward().as_vec3() * local.x
        + transform.right().as_vec3() * local.y
        + Vec3::Y * local.z
}
