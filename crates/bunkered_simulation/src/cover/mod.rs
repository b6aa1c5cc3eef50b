//! Cover state machine (core)
//!
//! ECS ответственность:
//! - BunkerCover: текущий bunker/позиция, фаза, exposure, lean, suggestions
//! - Операции: enter/exit/traverse/slide/lean/peek/stance (authority only)
//! - Tick: approach → blend → hug
//!
//! Фазы: None → Approaching → InPosition ⇄ Peeking; InPosition → None (exit).
//! Non-authority персонажи не мутируют ничего: команды уходят RPC'ом (см. `replication`).

use bevy::prelude::*;

pub mod alignment;
pub mod controller;
pub mod events;
pub mod state;
pub mod suggestions;
pub mod systems;
pub mod tick;
pub mod tuning;

#[cfg(test)]
mod cover_tests;

// Re-export основных типов
pub use alignment::{compute_alignment_transform, compute_approach_point, AlignmentQuery};
pub use controller::{find_adjacent_free_slot, CoverActor, CoverEnv};
pub use events::{CoverCommand, CoverCommandRejected, CoverIntent, CoverStateChanged};
pub use state::{
    ApproachMode, BunkerCover, CoverPhase, CoverTransition, Exposure, HugBase, SelectionPolicy,
};
pub use systems::CoverActorData;
pub use tuning::CoverTuning;

use crate::SimulationSet;

/// Cover Plugin
///
/// Регистрирует cover системы в FixedUpdate (60Hz).
///
/// Порядок выполнения:
/// 1. exit_cover_on_removal: claims снятых BunkerCover
/// 2. apply_cover_commands: intents → операции (или RPC forward)
/// 3. tick_cover: approach / blend / hug
/// 4. report_cover_state_changes: CoverStateChanged
pub struct CoverPlugin;

impl Plugin for CoverPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<CoverCommand>()
            .add_event::<CoverCommandRejected>()
            .add_event::<CoverStateChanged>();

        app.register_type::<BunkerCover>()
            .register_type::<CoverTuning>();

        app.add_systems(
            FixedUpdate,
            (
                systems::exit_cover_on_removal,
                systems::apply_cover_commands,
                systems::tick_cover,
                systems::report_cover_state_changes,
            )
                .chain() // Последовательное выполнение
                .in_set(SimulationSet::Cover),
        );
    }
}
