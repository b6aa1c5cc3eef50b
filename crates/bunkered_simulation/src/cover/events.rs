//! Cover events: intents (input/AI/RPC), отказы, смена фазы.

use super::state::CoverPhase;
use crate::bunker::BunkerId;
use crate::components::Stance;
use crate::error::CoverError;
use crate::surface::{PeekDirection, PositionRef};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Мутирующие операции cover state machine
///
/// Один и тот же enum приходит от input'а, AI, advisor'а и по сети (RPC payload).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CoverIntent {
    /// Approach к лучшему укрытию (кроме текущего)
    EnterBest,
    /// Сразу blend в позицию
    Enter { bunker: BunkerId, position: PositionRef },
    EnterAtAlpha { bunker: BunkerId, alpha: f32 },
    /// Toggle: в укрытии → выход
    EnterNearest,
    Exit,
    TraverseBestOnCurrent,
    TraverseLeft,
    TraverseRight,
    Slide { step: f32 },
    SetLeanAxis { axis: f32 },
    SetPeek { direction: PeekDirection, on: bool },
    SetStance { stance: Stance },
    RefreshSuggestions,
    NextSuggestion,
    PreviousSuggestion,
    ConfirmSuggestion,
}

/// Запрос на мутацию cover state персонажа
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct CoverCommand {
    pub actor: Entity,
    pub intent: CoverIntent,
}

/// Intent отклонён (состояние не изменилось)
#[derive(Event, Debug, Clone, PartialEq)]
pub struct CoverCommandRejected {
    pub actor: Entity,
    pub intent: CoverIntent,
    pub error: CoverError,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct CoverStateChanged {
    pub actor: Entity,
    pub from: CoverPhase,
    pub to: CoverPhase,
    pub bunker: Option<BunkerId>,
}
