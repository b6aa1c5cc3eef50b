//! Bunkered Simulation Core
//!
//! Cover traversal для third-person shooter'а на Bevy 0.16 (headless ECS)
//!
//! Слои:
//! - surface / bunker / selection: данные укрытий, occupancy, ранжирование позиций
//! - cover: state machine персонажа (approach → blend → hug, lean, stance, traverse)
//! - advisor / traversal: подсказка лучшего укрытия и путь к нему
//! - peek: выглядывание из-за края (ramps, proxies, camera tilt)
//! - replication: authority/proxy роли, RPC и snapshots через transport
//!
//! Всё работает в FixedUpdate (60Hz), порядок задаёт `SimulationSet`.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod advisor;
pub mod bunker;
pub mod components;
pub mod cover;
pub mod error;
pub mod geometry;
pub mod logger;
pub mod peek;
pub mod physics;
pub mod replication;
pub mod selection;
pub mod surface;
pub mod traversal;

// Re-export базовых типов для удобства
pub use advisor::{AdvisorPlugin, BeginTraverseTo, BunkerAdvisor, SuggestionChanged};
pub use bunker::{Bunker, BunkerBody, BunkerId, BunkerRegistry};
pub use components::*;
pub use cover::{BunkerCover, CoverCommand, CoverIntent, CoverPhase, CoverPlugin, CoverTuning};
pub use error::{CoverError, CoverResult};
pub use geometry::{StaticBox, StaticGeometry};
pub use logger::{init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel};
pub use peek::{PeekController, PeekPlugin};
pub use physics::CharacterMoverPlugin;
pub use replication::{NetEndpoint, NetId, NetRole, ReplicationPlugin};
pub use selection::SelectionConfig;
pub use surface::{CoverSlot, CoverSpline, PeekDirection, PositionRef, SlotSet};
pub use traversal::{PendingTraverse, TraversalPlugin};

/// Порядок подсистем внутри FixedUpdate
///
/// NetReceive → Advisor → Traversal → Cover → Movement → Peek → NetSend
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// RPC от клиентов (server) / snapshots (client)
    NetReceive,
    Advisor,
    Traversal,
    Cover,
    /// Headless mover
    Movement,
    Peek,
    /// Snapshots (server) / RPC forward (client)
    NetSend,
}

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct BunkeredPlugin;

impl Plugin for BunkeredPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .init_resource::<BunkerRegistry>()
            .init_resource::<SelectionConfig>()
            .init_resource::<StaticGeometry>()
            .register_type::<BunkerBody>()
            .register_type::<SelectionConfig>()
            .register_type::<CharacterCapsule>()
            .register_type::<CharacterMovement>()
            .register_type::<CameraBoom>();

        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }

        app.configure_sets(
            FixedUpdate,
            (
                SimulationSet::NetReceive,
                SimulationSet::Advisor,
                SimulationSet::Traversal,
                SimulationSet::Cover,
                SimulationSet::Movement,
                SimulationSet::Peek,
                SimulationSet::NetSend,
            )
                .chain(),
        );

        // Lifecycle bunkers: до всего остального в тике
        app.add_systems(
            FixedUpdate,
            (
                bunker::unregister_despawned_bunkers,
                bunker::sync_slot_markers,
                bunker::release_orphaned_claims,
            )
                .chain() // Последовательное выполнение
                .before(SimulationSet::NetReceive),
        );

        // Подсистемы
        app.add_plugins((
            ReplicationPlugin,
            AdvisorPlugin,
            TraversalPlugin,
            CoverPlugin,
            CharacterMoverPlugin,
            PeekPlugin,
        ));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
///
/// MinimalPlugins + BunkeredPlugin, seeded RNG. Logger инициализируется (console).
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .add_plugins(BunkeredPlugin);

    app
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    // Через Debug (простейший стабильный формат)
    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
