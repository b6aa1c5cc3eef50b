//! Replication: authority мутирует, клиенты получают snapshots
//!
//! ECS ответственность:
//! - NetRole: кто мутирует (Authority) и кто только форвардит intents (OwnedProxy)
//! - NetId: стабильный id персонажа в обоих мирах
//! - Сервер: requests → CoverCommand/PeekCommand, изменившиеся states → клиентам
//! - Клиент: OutgoingCoverRequest/OutgoingPeekRequest → сервер, states → replica + rep-notify
//!
//! Без `NetEndpoint` resource'а мир локальный: все персонажи authority, системы не работают.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub mod messages;
pub mod snapshot;
pub mod systems;
pub mod transport;

pub use messages::NetMessage;
pub use snapshot::{CoverNetState, ReplicatedState};
pub use systems::{is_client, is_server};
pub use transport::{LoopbackTransport, NetEndpoint, NetSide, ReplicationTransport};

use crate::cover::CoverIntent;
use crate::peek::{PeekNetState, PeekRequest};
use crate::SimulationSet;

/// Роль персонажа в этом мире
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub enum NetRole {
    /// Мутирует state (сервер или локальная игра)
    Authority,
    /// Управляется этим клиентом: intents уходят на сервер
    OwnedProxy,
    /// Чужой персонаж на клиенте: только snapshots
    SimulatedProxy,
}

impl Default for NetRole {
    fn default() -> Self {
        Self::Authority
    }
}

impl NetRole {
    pub fn is_authority(self) -> bool {
        self == NetRole::Authority
    }
}

/// Сетевой id персонажа (одинаковый на сервере и клиентах)
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
#[reflect(Component)]
pub struct NetId(pub u64);

/// Cover intent owning proxy → на authority
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct OutgoingCoverRequest {
    pub actor: Entity,
    pub intent: CoverIntent,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct OutgoingPeekRequest {
    pub actor: Entity,
    pub request: PeekRequest,
}

/// Клиент: cover state replica изменился
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct CoverRepNotify {
    pub actor: Entity,
    pub state: CoverNetState,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PeekRepNotify {
    pub actor: Entity,
    pub state: PeekNetState,
}

/// Replication Plugin
///
/// Порядок выполнения:
/// 1. NetReceive: receive_requests (сервер) / receive_snapshots → notify_replicated_changes (клиент)
/// 2. ... cover, peek ...
/// 3. NetSend: publish_snapshots (сервер) / forward_requests (клиент)
pub struct ReplicationPlugin;

impl Plugin for ReplicationPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<OutgoingCoverRequest>()
            .add_event::<OutgoingPeekRequest>()
            .add_event::<CoverRepNotify>()
            .add_event::<PeekRepNotify>();

        app.register_type::<NetRole>()
            .register_type::<NetId>()
            .register_type::<ReplicatedState>();

        app.add_systems(
            FixedUpdate,
            (
                systems::receive_requests.run_if(is_server),
                (systems::receive_snapshots, systems::notify_replicated_changes)
                    .chain()
                    .run_if(is_client),
            )
                .in_set(SimulationSet::NetReceive),
        );

        app.add_systems(
            FixedUpdate,
            (
                systems::publish_snapshots.run_if(is_server),
                systems::forward_requests.run_if(is_client),
            )
                .in_set(SimulationSet::NetSend),
        );
    }
}
