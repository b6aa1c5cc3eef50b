//! Movement компоненты: команды перемещения, nudge input, скорость ходьбы

use bevy::prelude::*;

/// Команда движения (исполняется внешним mover'ом / navigation)
///
/// Архитектура:
/// - Cover state machine пишет MovementCommand (high-level intent, Nav approach)
/// - Mover система (headless: `crate::physics::movement`) двигает Transform
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum MovementCommand {
    /// Стоять на месте
    Idle,
    /// Двигаться к позиции (world coordinates)
    MoveToPosition { target: Vec3 },
}

impl Default for MovementCommand {
    fn default() -> Self {
        Self::Idle
    }
}

/// Движение персонажа (collaborator для approach/traverse)
///
/// - `pending_input`: накопленный за тик nudge input (как AddMovementInput), обнуляется mover'ом
/// - `command`: navigation goal (Nav approach, traverse к suggestion)
/// - `max_walk_speed`: cm/s, cover временно подменяет на approach speed
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct CharacterMovement {
    pub max_walk_speed: f32,
    pub pending_input: Vec3,
    pub command: MovementCommand,
}

impl Default for CharacterMovement {
    fn default() -> Self {
        Self {
            max_walk_speed: 500.0,
            pending_input: Vec3::ZERO,
            command: MovementCommand::Idle,
        }
    }
}

impl CharacterMovement {
    /// Накопить input (direction нормализуется, scale ∈ [0..1])
    pub fn add_movement_input(&mut self, direction: Vec3, scale: f32) {
        self.pending_input += direction.normalize_or_zero() * scale.clamp(0.0, 1.0);
    }

    pub fn move_to(&mut self, target: Vec3) {
        self.command = MovementCommand::MoveToPosition { target };
    }

    /// Сбросить nav goal и накопленный input
    pub fn stop_movement_immediately(&mut self) {
        self.command = MovementCommand::Idle;
        self.pending_input = Vec3::ZERO;
    }

    pub fn nav_target(&self) -> Option<Vec3> {
        match self.command {
            MovementCommand::MoveToPosition { target } => Some(target),
            MovementCommand::Idle => None,
        }
    }
}
