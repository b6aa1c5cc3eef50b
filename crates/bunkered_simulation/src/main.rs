//! Headless симуляция Bunkered
//!
//! Сцена: пол, стена с тремя slots, игрок и враг. Игрок принимает подсказку advisor'а,
//! доходит до укрытия, выглядывает (hold) и возвращается.

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::Rng;
use std::time::Duration;

use bunkered_simulation::advisor::{AdvisorAction, AdvisorCommand};
use bunkered_simulation::peek::PeekInput;
use bunkered_simulation::{
    create_headless_app, log_info, Bunker, BunkerAdvisor, BunkerBody, BunkerCover, BunkerRegistry,
    CameraBoom, CharacterCapsule, CharacterMovement, CoverSlot, CoverTuning, DeterministicRng,
    PeekController, PeekDirection, SlotSet, StaticBox, StaticGeometry,
};

fn spawn_scene(app: &mut App) -> (Entity, Entity) {
    let world = app.world_mut();

    // Враг где-то за стеной (seeded → одинаково между запусками)
    let enemy_x = world.resource_mut::<DeterministicRng>().rng.gen_range(-300.0..300.0);
    let enemy = world.spawn(Transform::from_xyz(enemy_x, 88.0, -1000.0)).id();

    let body = world.spawn_empty().id();
    let slots = SlotSet::new(vec![
        CoverSlot::new("left", Transform::from_xyz(-150.0, 0.0, 0.0)),
        CoverSlot::new("middle", Transform::IDENTITY).with_peeks(&[PeekDirection::Over]),
        CoverSlot::new("right", Transform::from_xyz(150.0, 0.0, 0.0)),
    ]);
    let bunker = Bunker::with_slots("wall", Transform::from_xyz(0.0, 0.0, 500.0), slots).with_body(body);
    let id = world.resource_mut::<BunkerRegistry>().register(bunker);
    world.entity_mut(body).insert(BunkerBody { id });

    let mut geometry = world.resource_mut::<StaticGeometry>();
    geometry.add(StaticBox::floor(0.0, 5000.0));
    geometry.add(StaticBox::new(Vec3::new(0.0, 60.0, 480.0), Vec3::new(300.0, 60.0, 15.0)).with_entity(body));

    let player = world
        .spawn((
            Transform::from_xyz(40.0, 89.5, 1500.0).looking_to(Vec3::NEG_Z, Vec3::Y),
            CharacterCapsule::default(),
            CharacterMovement::default(),
            CameraBoom::default(),
            CoverTuning::default(),
            BunkerCover::default(),
            PeekController::default(),
            BunkerAdvisor::default().with_enemies(vec![enemy]),
        ))
        .id();

    (player, enemy)
}

fn main() {
    let seed = 42;
    println!("Starting Bunkered headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(1.0 / 60.0)));
    let (player, _enemy) = spawn_scene(&mut app);

    for tick in 0..600 {
        match tick {
            5 => {
                app.world_mut().send_event(AdvisorCommand {
                    actor: player,
                    action: AdvisorAction::Update,
                });
            }
            10 => {
                app.world_mut().send_event(AdvisorCommand {
                    actor: player,
                    action: AdvisorAction::Accept,
                });
            }
            300 => {
                app.world_mut().send_event(PeekInput {
                    actor: player,
                    direction: PeekDirection::Right,
                    pressed: true,
                });
            }
            360 => {
                app.world_mut().send_event(PeekInput {
                    actor: player,
                    direction: PeekDirection::Right,
                    pressed: false,
                });
            }
            _ => {}
        }

        app.update();

        if tick % 60 == 0 {
            let world = app.world();
            let Some(cover) = world.get::<BunkerCover>(player) else {
                break;
            };
            let transform = world.get::<Transform>(player).copied().unwrap_or_default();
            let peek = world.get::<PeekController>(player).map(|peek| peek.net).unwrap_or_default();
            log_info(&format!(
                "Tick {}: {:?} at {:?}, peek {:?}",
                tick, cover.phase, transform.translation, peek
            ));
        }
    }

    println!("Simulation complete!");
}
