//! Cover ECS системы (FixedUpdate).

use super::controller::{CoverActor, CoverEnv};
use super::events::{CoverCommand, CoverCommandRejected, CoverStateChanged};
use super::state::BunkerCover;
use super::tuning::CoverTuning;
use crate::bunker::BunkerRegistry;
use crate::components::{CameraBoom, CharacterCapsule, CharacterMovement};
use crate::geometry::CoverCollision;
use crate::logger::{log, log_warning};
use crate::replication::{NetRole, OutgoingCoverRequest};
use crate::selection::SelectionConfig;
use bevy::prelude::*;

/// Всё, что cover операции трогают у персонажа
pub type CoverActorData = (
    &'static mut BunkerCover,
    &'static mut Transform,
    &'static mut CharacterCapsule,
    &'static mut CharacterMovement,
    Option<&'static mut CameraBoom>,
    &'static CoverTuning,
    Option<&'static NetRole>,
);

/// Система: CoverCommand → операция на authority, RPC forward на owning proxy
///
/// Отклонённые команды → CoverCommandRejected (состояние не меняется).
pub fn apply_cover_commands(
    mut incoming: EventReader<CoverCommand>,
    mut rejected: EventWriter<CoverCommandRejected>,
    mut outgoing: EventWriter<OutgoingCoverRequest>,
    mut registry: ResMut<BunkerRegistry>,
    selection: Res<SelectionConfig>,
    collision: CoverCollision,
    mut actors: Query<CoverActorData>,
) {
    for command in incoming.read() {
        let Ok((mut cover, mut transform, mut capsule, mut movement, mut camera, tuning, role)) =
            actors.get_mut(command.actor)
        else {
            log_warning(&format!(
                "Cover: command {:?} for {:?} without cover components",
                command.intent, command.actor
            ));
            continue;
        };

        match role.copied().unwrap_or_default() {
            NetRole::Authority => {}
            NetRole::OwnedProxy => {
                // Клиент ничего не мутирует сам: intent уходит на authority
                outgoing.write(OutgoingCoverRequest {
                    actor: command.actor,
                    intent: command.intent,
                });
                continue;
            }
            NetRole::SimulatedProxy => {
                log(&format!(
                    "Cover: ignoring {:?} for simulated proxy {:?}",
                    command.intent, command.actor
                ));
                continue;
            }
        }

        let result = collision.with(|world| {
            let mut actor = CoverActor {
                entity: command.actor,
                transform: &mut transform,
                capsule: &mut capsule,
                movement: &mut movement,
                camera: camera.as_deref_mut(),
                tuning,
            };
            let mut env = CoverEnv {
                registry: &mut registry,
                collision: world,
                selection: &selection,
            };
            cover.apply_intent(&mut actor, &mut env, command.intent)
        });

        if let Err(error) = result {
            log(&format!(
                "Cover: {:?} rejected {:?}: {}",
                command.actor, command.intent, error
            ));
            rejected.write(CoverCommandRejected {
                actor: command.actor,
                intent: command.intent,
                error,
            });
        }
    }
}

/// Система: approach / blend / hug для authority персонажей
pub fn tick_cover(
    time: Res<Time<Fixed>>,
    mut registry: ResMut<BunkerRegistry>,
    selection: Res<SelectionConfig>,
    collision: CoverCollision,
    mut actors: Query<(Entity, CoverActorData)>,
) {
    let dt = time.delta_secs();

    collision.with(|world| {
        for (entity, (mut cover, mut transform, mut capsule, mut movement, mut camera, tuning, role)) in
            actors.iter_mut()
        {
            if role.is_some_and(|role| !role.is_authority()) {
                continue;
            }
            let mut actor = CoverActor {
                entity,
                transform: &mut transform,
                capsule: &mut capsule,
                movement: &mut movement,
                camera: camera.as_deref_mut(),
                tuning,
            };
            let mut env = CoverEnv {
                registry: &mut registry,
                collision: world,
                selection: &selection,
            };
            cover.tick(&mut actor, &mut env, dt);
        }
    });
}

/// Система: CoverStateChanged при смене фазы (один раз на переход)
pub fn report_cover_state_changes(
    mut covers: Query<(Entity, &mut BunkerCover)>,
    mut changed: EventWriter<CoverStateChanged>,
) {
    for (entity, mut cover) in covers.iter_mut() {
        if cover.phase == cover.reported_phase {
            continue;
        }
        changed.write(CoverStateChanged {
            actor: entity,
            from: cover.reported_phase,
            to: cover.phase,
            bunker: cover.bunker,
        });
        cover.reported_phase = cover.phase;
    }
}

/// Система: BunkerCover снят с entity → claims освобождаются, approach останавливается
pub fn exit_cover_on_removal(
    mut removed: RemovedComponents<BunkerCover>,
    mut registry: ResMut<BunkerRegistry>,
    mut movers: Query<&mut CharacterMovement>,
) {
    for entity in removed.read() {
        let released = registry.release_all_by(entity);
        if released > 0 {
            log(&format!(
                "Cover: released {} claim(s) of {:?} after BunkerCover removal",
                released, entity
            ));
        }
        if let Ok(mut movement) = movers.get_mut(entity) {
            movement.stop_movement_immediately();
        }
    }
}
