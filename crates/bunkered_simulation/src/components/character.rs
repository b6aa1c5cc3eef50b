//! Капсула персонажа и stance.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Поза тела (Stand/Crouch/Prone)
///
/// Порядок вариантов = строгость укрытия: `Stand < Crouch < Prone`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
pub enum Stance {
    Stand,
    Crouch,
    Prone,
}

impl Default for Stance {
    fn default() -> Self {
        Self::Stand
    }
}

/// Капсула персонажа (cm)
///
/// `half_height()`: полная половина высоты (с полусферами), как у engine-капсул.
/// Центр капсулы = Transform.translation.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct CharacterCapsule {
    pub radius: f32,
    pub stand_half_height: f32,
    pub crouch_half_height: f32,
    pub prone_half_height: f32,
    pub stance: Stance,
}

impl Default for CharacterCapsule {
    fn default() -> Self {
        Self {
            radius: 42.0,
            stand_half_height: 88.0,
            crouch_half_height: 44.0,
            prone_half_height: 30.0,
            stance: Stance::Stand,
        }
    }
}

impl CharacterCapsule {
    pub fn half_height_for(&self, stance: Stance) -> f32 {
        match stance {
            Stance::Stand => self.stand_half_height,
            Stance::Crouch => self.crouch_half_height,
            Stance::Prone => self.prone_half_height,
        }
    }

    pub fn half_height(&self) -> f32 {
        self.half_height_for(self.stance)
    }

    /// Меняет stance, сдвигая центр так, чтобы ноги остались на том же полу.
    ///
    /// Возвращает изменение half-height (отрицательное при приседании).
    pub fn apply_stance(&mut self, stance: Stance, transform: &mut Transform) -> f32 {
        if self.stance == stance {
            return 0.0;
        }
        let delta = self.half_height_for(stance) - self.half_height();
        self.stance = stance;
        transform.translation.y += delta;
        delta
    }

    /// Нижняя точка капсулы (feet)
    pub fn feet(&self, center: Vec3) -> Vec3 {
        center - Vec3::Y * self.half_height()
    }
}
