//! Cover Advisor: какое укрытие предложить персонажу (игрок или AI)
//!
//! ECS ответственность:
//! - BunkerAdvisor: веса, известные враги, текущая suggestion, manual override
//! - Update: gather → score → best (SuggestionChanged при смене)
//! - Accept: рядом → CoverCommand::Enter сразу, далеко → BeginTraverseTo
//!
//! Advisor ничего не claim'ит сам: вход идёт через cover state machine.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub mod scoring;
pub mod systems;


pub use scoring::{gather_candidates, is_exposed, pick_best, score_candidate, AdvisorCandidate, AdvisorView};

use crate::bunker::{BunkerId, BunkerRegistry};
use crate::geometry::CollisionWorld;
use crate::surface::{PositionRef, ALPHA_EPSILON};
use crate::SimulationSet;

#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct AdvisorWeights {
    pub distance_penalty: f32,
    pub forward_bias: f32,
    pub exposed_penalty: f32,
    pub stance_comfort: f32,
    pub novelty: f32,
}

impl Default for AdvisorWeights {
    fn default() -> Self {
        Self {
            distance_penalty: 1.0,
            forward_bias: 0.5,
            exposed_penalty: 2.0,
            stance_comfort: 0.5,
            novelty: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct AdvisorConfig {
    pub search_radius: f32,
    pub use_forward_bias: bool,
    /// Ближе этого accept входит сразу, без traverse
    pub enter_distance_threshold: f32,
    pub enemy_eye_height: f32,
    pub novelty_alpha_window: f32,
    /// Текущий bunker не предлагается
    pub exclude_current_bunker: bool,
    /// Автоматический update раз в N секунд (0 = только по команде)
    pub auto_update_interval: f32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            search_radius: 3000.0,
            use_forward_bias: true,
            enter_distance_threshold: 150.0,
            enemy_eye_height: 60.0,
            novelty_alpha_window: 0.05,
            exclude_current_bunker: true,
            auto_update_interval: 0.0,
        }
    }
}

/// Предложенная позиция
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct CoverSuggestion {
    pub bunker: BunkerId,
    pub position: PositionRef,
    pub world_transform: Transform,
    pub score: f32,
}

/// Что делать с accepted suggestion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptOutcome {
    EnterNow { bunker: BunkerId, position: PositionRef },
    Traverse { bunker: BunkerId, position: PositionRef, target: Vec3 },
}

#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct BunkerAdvisor {
    pub config: AdvisorConfig,
    pub weights: AdvisorWeights,
    /// Кого опасаться (despawned пропускаются)
    pub known_enemies: Vec<Entity>,
    pub suggestion: Option<CoverSuggestion>,
    pub manual_override: Option<CoverSuggestion>,
    /// Пересчитать на следующем tick'е (после accept/enter)
    pub needs_update: bool,
    pub(crate) since_update: f32,
}

impl BunkerAdvisor {
    pub fn new(config: AdvisorConfig, weights: AdvisorWeights) -> Self {
        Self {
            config,
            weights,
            ..Default::default()
        }
    }

    pub fn with_enemies(mut self, enemies: Vec<Entity>) -> Self {
        self.known_enemies = enemies;
        self
    }

    /// Пересчитать suggestion. true → изменилась.
    pub fn update_suggestion(
        &mut self,
        registry: &BunkerRegistry,
        collision: &dyn CollisionWorld,
        view: &AdvisorView,
        enemies: &[(Entity, Vec3)],
    ) -> bool {
        self.needs_update = false;
        self.since_update = 0.0;
        let next = match self.manual_override {
            Some(pinned) => Some(pinned),
            None => pick_best(registry, collision, &self.config, &self.weights, view, enemies),
        };
        self.replace_suggestion(next)
    }

    fn replace_suggestion(&mut self, next: Option<CoverSuggestion>) -> bool {
        let changed = match (&self.suggestion, &next) {
            (None, None) => false,
            (Some(old), Some(new)) => {
                old.bunker != new.bunker || !same_within(old.position, new.position, ALPHA_EPSILON)
            }
            _ => true,
        };
        self.suggestion = next;
        changed
    }

    /// Закрепить позицию (designer/AI), scoring не участвует. true → suggestion изменилась.
    pub fn set_manual_override(&mut self, registry: &BunkerRegistry, bunker: BunkerId, position: PositionRef) -> bool {
        let Some((position, world_transform)) = registry.get(bunker).and_then(|b| {
            let position = b.normalize(position)?;
            Some((position, b.transform_at(position)?))
        }) else {
            return false;
        };
        let pinned = CoverSuggestion {
            bunker,
            position,
            world_transform,
            score: 0.0,
        };
        self.manual_override = Some(pinned);
        self.replace_suggestion(Some(pinned))
    }

    pub fn clear_manual_override(&mut self) {
        self.manual_override = None;
        self.needs_update = true;
    }

    /// Accept текущей suggestion из точки `from`
    pub fn accept(&self, registry: &BunkerRegistry, from: Vec3) -> Option<AcceptOutcome> {
        let suggestion = self.suggestion?;
        let entry_radius = registry
            .get(suggestion.bunker)
            .map(|bunker| bunker.entry_radius(suggestion.position))
            .unwrap_or(0.0);
        let threshold = self.config.enter_distance_threshold.max(entry_radius);
        let target = suggestion.world_transform.translation;

        if target.distance(from) <= threshold {
            Some(AcceptOutcome::EnterNow {
                bunker: suggestion.bunker,
                position: suggestion.position,
            })
        } else {
            Some(AcceptOutcome::Traverse {
                bunker: suggestion.bunker,
                position: suggestion.position,
                target,
            })
        }
    }
}

fn same_within(a: PositionRef, b: PositionRef, epsilon: f32) -> bool {
    match (a, b) {
        (PositionRef::Slot(a), PositionRef::Slot(b)) => a == b,
        (PositionRef::Alpha(a), PositionRef::Alpha(b)) => (a - b).abs() <= epsilon,
        _ => false,
    }
}

/// Действие над advisor'ом (input, AI, UI)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvisorAction {
    Update,
    Accept,
    SetManual { bunker: BunkerId, position: PositionRef },
    ClearManual,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct AdvisorCommand {
    pub actor: Entity,
    pub action: AdvisorAction,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct SuggestionChanged {
    pub actor: Entity,
    pub suggestion: Option<CoverSuggestion>,
}

/// Suggestion далеко: внешний mover должен довести персонажа (см. `traversal`)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct BeginTraverseTo {
    pub actor: Entity,
    pub bunker: BunkerId,
    pub position: PositionRef,
    pub target: Vec3,
}

/// Advisor Plugin
///
/// Порядок выполнения:
/// 1. apply_advisor_commands: update/accept/manual
/// 2. refresh_advisors: auto interval + needs_update
pub struct AdvisorPlugin;

impl Plugin for AdvisorPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<AdvisorCommand>()
            .add_event::<SuggestionChanged>()
            .add_event::<BeginTraverseTo>();

        app.register_type::<BunkerAdvisor>();

        app.add_systems(
            FixedUpdate,
            (systems::apply_advisor_commands, systems::refresh_advisors)
                .chain() // Последовательное выполнение
                .in_set(SimulationSet::Advisor),
        );
    }
}
