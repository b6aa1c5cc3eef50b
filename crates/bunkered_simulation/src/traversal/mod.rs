//! Traversal к suggestion: дойти пешком и войти в укрытие
//!
//! BeginTraverseTo → PendingTraverse + navigation goal. Каждые 0.1s (накопленного времени)
//! проверяется дистанция; в пределах порога → CoverCommand::Enter, advisor пересчитывается.
//! Bunker пропал или mover сдался → запрос снимается.

use bevy::prelude::*;

use crate::advisor::{AdvisorConfig, BeginTraverseTo, BunkerAdvisor};
use crate::bunker::{BunkerId, BunkerRegistry};
use crate::components::CharacterMovement;
use crate::cover::{CoverCommand, CoverIntent};
use crate::logger::{log, log_info, log_warning};
use crate::surface::PositionRef;
use crate::SimulationSet;

/// Период опроса прибытия (сек)
pub const TRAVERSE_POLL_INTERVAL: f32 = 0.1;

/// Персонаж идёт к позиции укрытия
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct PendingTraverse {
    pub bunker: BunkerId,
    pub position: PositionRef,
    pub target: Vec3,
    pub since_poll: f32,
}

impl PendingTraverse {
    pub fn new(bunker: BunkerId, position: PositionRef, target: Vec3) -> Self {
        Self {
            bunker,
            position,
            target,
            since_poll: 0.0,
        }
    }

    /// Накопить dt; true раз в TRAVERSE_POLL_INTERVAL
    pub fn poll_due(&mut self, dt: f32) -> bool {
        self.since_poll += dt;
        if self.since_poll + 1e-6 < TRAVERSE_POLL_INTERVAL {
            return false;
        }
        self.since_poll = 0.0;
        true
    }
}

/// Система: BeginTraverseTo → PendingTraverse + navigation goal
pub fn begin_traverse(
    mut commands: Commands,
    mut requests: EventReader<BeginTraverseTo>,
    mut movers: Query<&mut CharacterMovement>,
) {
    for request in requests.read() {
        let Ok(mut movement) = movers.get_mut(request.actor) else {
            log_warning(&format!("Traverse: {:?} cannot move, request dropped", request.actor));
            continue;
        };
        movement.move_to(request.target);
        commands.entity(request.actor).insert(PendingTraverse::new(
            request.bunker,
            request.position,
            request.target,
        ));
        log_info(&format!(
            "Traverse: {:?} → {:?} {:?}",
            request.actor, request.bunker, request.position
        ));
    }
}

/// Система: опрос прибытия
pub fn poll_pending_traverse(
    time: Res<Time<Fixed>>,
    mut commands: Commands,
    registry: Res<BunkerRegistry>,
    mut cover_commands: EventWriter<CoverCommand>,
    mut travellers: Query<(
        Entity,
        &mut PendingTraverse,
        &Transform,
        &mut CharacterMovement,
        Option<&mut BunkerAdvisor>,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut pending, transform, mut movement, advisor) in travellers.iter_mut() {
        if !pending.poll_due(dt) {
            continue;
        }

        if !registry.contains(pending.bunker) {
            log_warning(&format!(
                "Traverse: {:?} target {:?} is gone, dropping",
                entity, pending.bunker
            ));
            movement.stop_movement_immediately();
            commands.entity(entity).remove::<PendingTraverse>();
            continue;
        }

        let threshold = advisor
            .as_ref()
            .map(|advisor| advisor.config.enter_distance_threshold)
            .unwrap_or_else(|| AdvisorConfig::default().enter_distance_threshold);

        if transform.translation.distance(pending.target) <= threshold {
            movement.stop_movement_immediately();
            cover_commands.write(CoverCommand {
                actor: entity,
                intent: CoverIntent::Enter {
                    bunker: pending.bunker,
                    position: pending.position,
                },
            });
            if let Some(mut advisor) = advisor {
                advisor.needs_update = true;
            }
            commands.entity(entity).remove::<PendingTraverse>();
            log(&format!("Traverse: {:?} arrived, entering cover", entity));
            continue;
        }

        if movement.nav_target().is_none() {
            log_warning(&format!("Traverse: {:?} stopped short of {:?}", entity, pending.target));
            commands.entity(entity).remove::<PendingTraverse>();
        }
    }
}

/// Traversal Plugin
///
/// Порядок выполнения (после advisor, до cover):
/// 1. begin_traverse: BeginTraverseTo → PendingTraverse
/// 2. poll_pending_traverse: прибытие → CoverCommand::Enter
pub struct TraversalPlugin;

impl Plugin for TraversalPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<PendingTraverse>();

        app.add_systems(
            FixedUpdate,
            (begin_traverse, poll_pending_traverse)
                .chain() // Последовательное выполнение
                .in_set(SimulationSet::Traversal),
        );
    }
}
