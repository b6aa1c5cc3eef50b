//! Physics: headless mover
//!
//! Исполняет CharacterMovement через sweep по collision world.
//! В игре эту роль берёт движок; cover-логика видит только CharacterMovement.

pub mod movement;

// Re-export основных типов
pub use movement::{drive_character_movement, step_character, CharacterMoverPlugin, NAV_ARRIVE_DISTANCE};
