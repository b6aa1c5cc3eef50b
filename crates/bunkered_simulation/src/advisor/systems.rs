//! Advisor ECS системы (FixedUpdate, до cover).

use super::scoring::AdvisorView;
use super::{AcceptOutcome, AdvisorAction, AdvisorCommand, BeginTraverseTo, BunkerAdvisor, SuggestionChanged};
use crate::bunker::BunkerRegistry;
use crate::components::{CameraBoom, CharacterCapsule};
use crate::cover::{BunkerCover, CoverCommand, CoverIntent};
use crate::geometry::CoverCollision;
use crate::logger::log;
use bevy::prelude::*;

type AdvisorData = (
    Entity,
    &'static mut BunkerAdvisor,
    &'static Transform,
    &'static CharacterCapsule,
    Option<&'static CameraBoom>,
    Option<&'static BunkerCover>,
);

fn advisor_view(
    entity: Entity,
    transform: &Transform,
    capsule: &CharacterCapsule,
    camera: Option<&CameraBoom>,
    cover: Option<&BunkerCover>,
) -> AdvisorView {
    AdvisorView {
        actor: entity,
        location: transform.translation,
        forward: camera
            .map(CameraBoom::view_forward)
            .unwrap_or_else(|| transform.forward().as_vec3()),
        stance: capsule.stance,
        current: cover.and_then(BunkerCover::current),
    }
}

/// Позиции известных врагов (despawned пропускаются)
fn enemy_positions(advisor: &BunkerAdvisor, transforms: &Query<&Transform>) -> Vec<(Entity, Vec3)> {
    advisor
        .known_enemies
        .iter()
        .filter_map(|enemy| transforms.get(*enemy).ok().map(|t| (*enemy, t.translation)))
        .collect()
}

/// Система: AdvisorCommand → update / accept / manual override
pub fn apply_advisor_commands(
    mut incoming: EventReader<AdvisorCommand>,
    mut changed: EventWriter<SuggestionChanged>,
    mut traverse: EventWriter<BeginTraverseTo>,
    mut cover_commands: EventWriter<CoverCommand>,
    registry: Res<BunkerRegistry>,
    collision: CoverCollision,
    mut advisors: Query<AdvisorData>,
    transforms: Query<&Transform>,
) {
    for command in incoming.read() {
        let Ok((entity, mut advisor, transform, capsule, camera, cover)) = advisors.get_mut(command.actor)
        else {
            continue;
        };

        match command.action {
            AdvisorAction::Update => {
                let view = advisor_view(entity, transform, capsule, camera, cover);
                let enemies = enemy_positions(&advisor, &transforms);
                let updated =
                    collision.with(|world| advisor.update_suggestion(&registry, world, &view, &enemies));
                if updated {
                    changed.write(SuggestionChanged {
                        actor: entity,
                        suggestion: advisor.suggestion,
                    });
                }
            }
            AdvisorAction::Accept => match advisor.accept(&registry, transform.translation) {
                Some(AcceptOutcome::EnterNow { bunker, position }) => {
                    cover_commands.write(CoverCommand {
                        actor: entity,
                        intent: CoverIntent::Enter { bunker, position },
                    });
                    advisor.needs_update = true;
                }
                Some(AcceptOutcome::Traverse {
                    bunker,
                    position,
                    target,
                }) => {
                    traverse.write(BeginTraverseTo {
                        actor: entity,
                        bunker,
                        position,
                        target,
                    });
                }
                None => log(&format!("Advisor: {:?} has nothing to accept", entity)),
            },
            AdvisorAction::SetManual { bunker, position } => {
                if advisor.set_manual_override(&registry, bunker, position) {
                    changed.write(SuggestionChanged {
                        actor: entity,
                        suggestion: advisor.suggestion,
                    });
                }
            }
            AdvisorAction::ClearManual => advisor.clear_manual_override(),
        }
    }
}

/// Система: auto update по интервалу и после accept/clear
pub fn refresh_advisors(
    time: Res<Time<Fixed>>,
    mut changed: EventWriter<SuggestionChanged>,
    registry: Res<BunkerRegistry>,
    collision: CoverCollision,
    mut advisors: Query<AdvisorData>,
    transforms: Query<&Transform>,
) {
    let dt = time.delta_secs();
    collision.with(|world| {
        for (entity, mut advisor, transform, capsule, camera, cover) in advisors.iter_mut() {
            advisor.since_update += dt;
            let interval = advisor.config.auto_update_interval;
            let due = interval > 0.0 && advisor.since_update >= interval;
            if !advisor.needs_update && !due {
                continue;
            }
            let view = advisor_view(entity, transform, capsule, camera, cover);
            let enemies = enemy_positions(&advisor, &transforms);
            if advisor.update_suggestion(&registry, world, &view, &enemies) {
                changed.write(SuggestionChanged {
                    actor: entity,
                    suggestion: advisor.suggestion,
                });
            }
        }
    });
}
