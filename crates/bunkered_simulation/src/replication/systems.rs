//! Replication системы: сервер (requests in, snapshots out) и клиент (requests out, snapshots in).

use super::messages::NetMessage;
use super::snapshot::{CoverNetState, ReplicatedState};
use super::transport::{NetEndpoint, NetSide};
use super::{CoverRepNotify, NetId, NetRole, OutgoingCoverRequest, OutgoingPeekRequest, PeekRepNotify};
use crate::components::CharacterCapsule;
use crate::cover::{BunkerCover, CoverCommand};
use crate::logger::{log, log_warning};
use crate::peek::{PeekCommand, PeekController};
use bevy::prelude::*;
use std::collections::HashMap;

/// Run condition: этот мир: authority сервер
pub fn is_server(endpoint: Option<Res<NetEndpoint>>) -> bool {
    endpoint.is_some_and(|endpoint| endpoint.side == NetSide::Server)
}

pub fn is_client(endpoint: Option<Res<NetEndpoint>>) -> bool {
    endpoint.is_some_and(|endpoint| endpoint.side == NetSide::Client)
}

// --- server ---

/// Система: RPC requests → CoverCommand / PeekCommand для authority entities
pub fn receive_requests(
    mut endpoint: ResMut<NetEndpoint>,
    actors: Query<(Entity, &NetId, Option<&NetRole>)>,
    mut cover_commands: EventWriter<CoverCommand>,
    mut peek_commands: EventWriter<PeekCommand>,
) {
    let messages = endpoint.receive();
    if messages.is_empty() {
        return;
    }
    let by_id: HashMap<NetId, Entity> = actors
        .iter()
        .filter(|(_, _, role)| role.is_none_or(|role| role.is_authority()))
        .map(|(entity, net_id, _)| (*net_id, entity))
        .collect();

    for message in messages {
        let Some(&actor) = by_id.get(&message.net_id()) else {
            log_warning(&format!(
                "Replication: request for unknown {:?} dropped",
                message.net_id()
            ));
            continue;
        };
        match message {
            NetMessage::CoverRequest { intent, .. } => {
                cover_commands.write(CoverCommand { actor, intent });
            }
            NetMessage::PeekRequest { request, .. } => {
                peek_commands.write(PeekCommand { actor, request });
            }
            NetMessage::CoverState { .. } | NetMessage::PeekState { .. } => {
                log(&format!("Replication: server ignores state message for {:?}", actor));
            }
        }
    }
}

/// Система: изменившиеся cover/peek states → клиентам (в порядке NetId)
pub fn publish_snapshots(
    mut endpoint: ResMut<NetEndpoint>,
    mut actors: Query<(
        &NetId,
        &BunkerCover,
        &CharacterCapsule,
        Option<&PeekController>,
        &mut ReplicatedState,
        Option<&NetRole>,
    )>,
) {
    let mut outgoing = Vec::new();
    for (net_id, cover, capsule, peek, mut replicated, role) in actors.iter_mut() {
        if role.is_some_and(|role| !role.is_authority()) {
            continue;
        }
        let state = CoverNetState::capture(cover, capsule);
        if replicated.last_cover != Some(state) {
            replicated.last_cover = Some(state);
            outgoing.push(NetMessage::CoverState {
                net_id: *net_id,
                state,
            });
        }
        if let Some(peek) = peek {
            if replicated.last_peek != Some(peek.net) {
                replicated.last_peek = Some(peek.net);
                outgoing.push(NetMessage::PeekState {
                    net_id: *net_id,
                    state: peek.net,
                });
            }
        }
    }

    outgoing.sort_by_key(|message| message.net_id());
    for message in outgoing {
        endpoint.send(message);
    }
}

// --- client ---

/// Система: intents owning proxy → сервер
pub fn forward_requests(
    mut endpoint: ResMut<NetEndpoint>,
    mut cover_requests: EventReader<OutgoingCoverRequest>,
    mut peek_requests: EventReader<OutgoingPeekRequest>,
    ids: Query<&NetId>,
) {
    for request in cover_requests.read() {
        let Ok(net_id) = ids.get(request.actor) else {
            log_warning(&format!("Replication: {:?} has no NetId, request dropped", request.actor));
            continue;
        };
        endpoint.send(NetMessage::CoverRequest {
            net_id: *net_id,
            intent: request.intent,
        });
    }
    for request in peek_requests.read() {
        let Ok(net_id) = ids.get(request.actor) else {
            log_warning(&format!("Replication: {:?} has no NetId, request dropped", request.actor));
            continue;
        };
        endpoint.send(NetMessage::PeekRequest {
            net_id: *net_id,
            request: request.request,
        });
    }
}

/// Система: snapshots → replica components (ничего не claim'ится локально)
pub fn receive_snapshots(
    mut endpoint: ResMut<NetEndpoint>,
    ids: Query<(Entity, &NetId)>,
    mut replicas: Query<(
        &mut BunkerCover,
        &mut CharacterCapsule,
        Option<&mut PeekController>,
        &mut ReplicatedState,
    )>,
) {
    let messages = endpoint.receive();
    if messages.is_empty() {
        return;
    }
    let by_id: HashMap<NetId, Entity> = ids.iter().map(|(entity, net_id)| (*net_id, entity)).collect();

    for message in messages {
        let Some(&entity) = by_id.get(&message.net_id()) else {
            log(&format!("Replication: state for unknown {:?}", message.net_id()));
            continue;
        };
        let Ok((mut cover, mut capsule, peek, mut replicated)) = replicas.get_mut(entity) else {
            continue;
        };
        match message {
            NetMessage::CoverState { state, .. } => {
                state.apply_to(&mut cover, &mut capsule);
                replicated.last_cover = Some(state);
            }
            NetMessage::PeekState { state, .. } => {
                if let Some(mut peek) = peek {
                    peek.net = state;
                }
                replicated.last_peek = Some(state);
            }
            NetMessage::CoverRequest { .. } | NetMessage::PeekRequest { .. } => {
                log_warning(&format!("Replication: client got a request for {:?}", entity));
            }
        }
    }
}

/// Система: rep-notify один раз на устоявшееся значение
pub fn notify_replicated_changes(
    mut replicas: Query<(Entity, &mut ReplicatedState)>,
    mut cover_changed: EventWriter<CoverRepNotify>,
    mut peek_changed: EventWriter<PeekRepNotify>,
) {
    for (actor, mut replicated) in replicas.iter_mut() {
        if let Some(state) = replicated.take_cover_change() {
            cover_changed.write(CoverRepNotify { actor, state });
        }
        if let Some(state) = replicated.take_peek_change() {
            peek_changed.write(PeekRepNotify { actor, state });
        }
    }
}
