//! Настройки cover state machine (per character).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Все дистанции в cm, времена в секундах
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct CoverTuning {
    // Floor snap
    pub floor_search_up: f32,
    pub floor_search_down: f32,
    pub floor_padding: f32,

    // Offsets от anchor'а
    pub back_offset: f32,
    pub wall_clearance: f32,

    // Lean
    pub lean_lateral: f32,
    pub lean_vertical: f32,
    pub lean_speed: f32,

    // Camera boom в укрытии
    pub shoulder_offset: f32,
    pub cover_arm_length: f32,

    // Approach
    pub stop_distance: f32,
    pub nudge_max_distance: f32,
    /// Scale nudge input'а (0..1)
    pub approach_move_speed: f32,
    pub approach_walk_speed: f32,

    // Blend / slide
    pub entry_blend_time: f32,
    /// cm/s, длительность slide = дистанция / скорость
    pub slide_speed: f32,
    pub min_transition_time: f32,
    pub slide_step_alpha: f32,

    // Suggestions
    pub suggestion_count: usize,
    pub min_cos_to_view: f32,

    // Search
    pub best_cover_search_count: usize,
    pub nearest_search_radius: f32,

    // Peek input
    pub peek_double_tap_window: f32,
    pub peek_tap_threshold: f32,
}

impl Default for CoverTuning {
    fn default() -> Self {
        Self {
            floor_search_up: 50.0,
            floor_search_down: 150.0,
            floor_padding: 1.5,
            back_offset: 30.0,
            wall_clearance: 12.0,
            lean_lateral: 28.0,
            lean_vertical: 8.0,
            lean_speed: 10.0,
            shoulder_offset: 55.0,
            cover_arm_length: 260.0,
            stop_distance: 35.0,
            nudge_max_distance: 450.0,
            approach_move_speed: 1.0,
            approach_walk_speed: 220.0,
            entry_blend_time: 0.18,
            slide_speed: 1200.0,
            min_transition_time: 0.08,
            slide_step_alpha: 0.02,
            suggestion_count: 3,
            min_cos_to_view: 0.25,
            best_cover_search_count: 5,
            nearest_search_radius: 5000.0,
            peek_double_tap_window: 0.25,
            peek_tap_threshold: 0.15,
        }
    }
}

impl CoverTuning {
    /// Отступ центра капсулы от anchor'а вдоль нормали (hug position)
    pub fn hug_back_off(&self, radius: f32) -> f32 {
        self.back_offset + radius * 0.6 + self.wall_clearance
    }

    /// Отступ точки подхода (approach point)
    pub fn approach_back_off(&self, radius: f32) -> f32 {
        self.back_offset + radius * 0.5 + self.wall_clearance
    }

    /// Длительность slide'а между позициями: пропорционально дистанции, но не мгновенно
    pub fn slide_duration(&self, distance: f32) -> f32 {
        (distance / self.slide_speed.max(1.0)).max(self.min_transition_time)
    }
}
