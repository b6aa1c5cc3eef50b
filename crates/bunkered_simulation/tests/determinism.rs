//! Тесты детерминизма
//!
//! Одинаковый seed + одинаковые команды → идентичные snapshots мира

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::Rng;
use std::time::Duration;

use bunkered_simulation::advisor::{AdvisorAction, AdvisorCommand};
use bunkered_simulation::*;

/// Запускает сценарий и возвращает snapshot (Transform + BunkerCover)
///
/// Seeded RNG раскидывает персонажей и bunkers, каждый персонаж ищет укрытие через advisor.
fn run_simulation(seed: u64, characters: usize, ticks: usize) -> Vec<u8> {
    let mut app = create_headless_app(seed);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(1.0 / 60.0)));

    let world = app.world_mut();
    world.resource_mut::<StaticGeometry>().add(StaticBox::floor(0.0, 10_000.0));

    let mut placements = Vec::new();
    {
        let mut rng = world.resource_mut::<DeterministicRng>();
        for _ in 0..4 {
            placements.push(Vec3::new(
                rng.rng.gen_range(-2000.0..2000.0),
                0.0,
                rng.rng.gen_range(-2000.0..2000.0),
            ));
        }
        for _ in 0..characters {
            placements.push(Vec3::new(
                rng.rng.gen_range(-2500.0..2500.0),
                89.5,
                rng.rng.gen_range(-2500.0..2500.0),
            ));
        }
    }

    for (i, at) in placements.iter().take(4).enumerate() {
        let slots = SlotSet::new(vec![
            CoverSlot::new("a", Transform::from_xyz(-100.0, 0.0, 0.0)),
            CoverSlot::new("b", Transform::from_xyz(100.0, 0.0, 0.0)),
        ]);
        world
            .resource_mut::<BunkerRegistry>()
            .register(Bunker::with_slots(format!("bunker_{}", i), Transform::from_translation(*at), slots));
    }

    let actors: Vec<Entity> = placements
        .iter()
        .skip(4)
        .map(|at| {
            world
                .spawn((
                    Transform::from_translation(*at),
                    CharacterCapsule::default(),
                    CharacterMovement::default(),
                    CameraBoom::default(),
                    CoverTuning::default(),
                    BunkerCover::default(),
                    PeekController::default(),
                    BunkerAdvisor::default(),
                ))
                .id()
        })
        .collect();

    for tick in 0..ticks {
        if tick == 2 || tick == 4 {
            let action = if tick == 2 {
                AdvisorAction::Update
            } else {
                AdvisorAction::Accept
            };
            for actor in &actors {
                app.world_mut().send_event(AdvisorCommand {
                    actor: *actor,
                    action,
                });
            }
        }
        app.update();
    }

    let mut snapshot = world_snapshot::<Transform>(app.world_mut());
    snapshot.extend(world_snapshot::<BunkerCover>(app.world_mut()));
    snapshot
}

#[test]
fn test_determinism_same_seed() {
    const SEED: u64 = 12345;

    let snapshot1 = run_simulation(SEED, 8, 300);
    let snapshot2 = run_simulation(SEED, 8, 300);

    assert_eq!(
        snapshot1, snapshot2,
        "Симуляция с одинаковым seed ({}) дала разные результаты!",
        SEED
    );
}

#[test]
fn test_determinism_multiple_runs() {
    const SEED: u64 = 42;

    // Запускаем 3 раза: все должны быть идентичны
    let snapshots: Vec<_> = (0..3).map(|_| run_simulation(SEED, 6, 200)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(
            snapshots[0], *snapshot,
            "Прогон {} дал результат отличный от прогона 0",
            i
        );
    }
}

#[test]
fn test_different_seeds_differ() {
    assert_ne!(
        run_simulation(1, 4, 60),
        run_simulation(2, 4, 60),
        "разные seeds → разные сцены"
    );
}
