//! ECS Components персонажа (collaborators cover-подсистемы)
//!
//! Организация по доменам:
//! - character: капсула + stance (half-height зависит от stance)
//! - movement: команды перемещения, nudge input, max walk speed
//! - camera: spring-arm (socket offset, arm length, collision test, roll) + view rotation
//!
//! Cover-логика читает/пишет только эти компоненты и Transform: никаких engine-specific типов.

pub mod camera;
pub mod character;
pub mod movement;

// Re-exports для удобного импорта
pub use camera::*;
pub use character::*;
pub use movement::*;
