//! Peek ECS системы (FixedUpdate, после cover).

use super::controller::PeekController;
use super::events::{PeekCommand, PeekInput, PeekRejected};
use crate::bunker::BunkerRegistry;
use crate::components::CameraBoom;
use crate::cover::{BunkerCover, CoverTuning};
use crate::logger::{log, log_warning};
use crate::replication::{NetRole, OutgoingPeekRequest};
use bevy::prelude::*;

/// Система: кнопки → PeekCommand (на стороне владельца)
pub fn classify_peek_input(
    mut inputs: EventReader<PeekInput>,
    mut commands: EventWriter<PeekCommand>,
    mut controllers: Query<(&mut PeekController, &CoverTuning)>,
) {
    for input in inputs.read() {
        let Ok((mut controller, tuning)) = controllers.get_mut(input.actor) else {
            log_warning(&format!("Peek: input for {:?} without PeekController", input.actor));
            continue;
        };
        if let Some(request) = controller.handle_input(input.direction, input.pressed, tuning) {
            commands.write(PeekCommand {
                actor: input.actor,
                request,
            });
        }
    }
}

/// Система: PeekCommand → authority, либо RPC forward с owning proxy
pub fn apply_peek_commands(
    mut incoming: EventReader<PeekCommand>,
    mut rejected: EventWriter<PeekRejected>,
    mut outgoing: EventWriter<OutgoingPeekRequest>,
    registry: Res<BunkerRegistry>,
    mut actors: Query<(&mut PeekController, &mut BunkerCover, &Transform, Option<&NetRole>)>,
) {
    for command in incoming.read() {
        let Ok((mut controller, mut cover, transform, role)) = actors.get_mut(command.actor) else {
            continue;
        };

        match role.copied().unwrap_or_default() {
            NetRole::Authority => {}
            NetRole::OwnedProxy => {
                outgoing.write(OutgoingPeekRequest {
                    actor: command.actor,
                    request: command.request,
                });
                continue;
            }
            NetRole::SimulatedProxy => continue,
        }

        if let Err(error) = controller.apply_request(&mut cover, &registry, transform, command.request) {
            log(&format!(
                "Peek: {:?} rejected {:?}: {}",
                command.actor, command.request, error
            ));
            rejected.write(PeekRejected {
                actor: command.actor,
                request: command.request,
                error,
            });
        }
    }
}

/// Система: ramps на authority, только clock у остальных
pub fn tick_peek(
    time: Res<Time<Fixed>>,
    mut actors: Query<(&mut PeekController, &mut BunkerCover, Option<&NetRole>)>,
) {
    let dt = time.delta_secs();
    for (mut controller, mut cover, role) in actors.iter_mut() {
        if role.is_some_and(|role| !role.is_authority()) {
            controller.advance_clock(dt);
            continue;
        }
        controller.tick(&mut cover, dt);
    }
}

/// Система: proxies + camera tilt из net state (все стороны)
pub fn update_peek_presentation(
    registry: Res<BunkerRegistry>,
    mut actors: Query<(
        &mut PeekController,
        &BunkerCover,
        &Transform,
        Option<&mut CameraBoom>,
        Option<&NetRole>,
    )>,
) {
    for (mut controller, cover, transform, mut camera, role) in actors.iter_mut() {
        let authority = role.is_none_or(|role| role.is_authority());
        controller.update_presentation(cover, &registry, transform, camera.as_deref_mut(), authority);
    }
}
