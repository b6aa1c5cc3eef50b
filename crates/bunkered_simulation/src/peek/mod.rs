//! Peek sub-system (ортогонален cover state)
//!
//! ECS ответственность:
//! - PeekController: input classification (Hold / Burst / Toggle), ramps глубины, refractory
//! - PeekNetState: replicated snapshot (direction, mode, depth byte)
//! - Hit proxies (head/shoulder/gun) и camera tilt, выводятся только из net state
//!
//! Authority мутирует; owning client только классифицирует input и шлёт запросы.

use bevy::prelude::*;

pub mod controller;
pub mod events;
pub mod proxies;
pub mod settings;
pub mod state;
pub mod systems;


pub use controller::{PeekController, RequestedPeek};
pub use events::{PeekCommand, PeekInput, PeekRejected};
pub use proxies::{PeekProxies, PeekProxy, ProxyKind};
pub use settings::PeekSettings;
pub use state::{PeekAnchor, PeekMode, PeekNetState, PeekPhase, PeekRamp, PeekRequest};

use crate::SimulationSet;

/// Peek Plugin
///
/// Порядок выполнения (после cover):
/// 1. classify_peek_input: кнопки → PeekCommand
/// 2. apply_peek_commands: begin/stop/adjust (или RPC forward)
/// 3. tick_peek: ramps, refractory clock
/// 4. update_peek_presentation: proxies + camera
pub struct PeekPlugin;

impl Plugin for PeekPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PeekInput>()
            .add_event::<PeekCommand>()
            .add_event::<PeekRejected>();

        app.register_type::<PeekController>();

        app.add_systems(
            FixedUpdate,
            (
                systems::classify_peek_input,
                systems::apply_peek_commands,
                systems::tick_peek,
                systems::update_peek_presentation,
            )
                .chain() // Последовательное выполнение
                .in_set(SimulationSet::Peek),
        );
    }
}
