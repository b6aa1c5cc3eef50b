//! Peek events: кнопка, запрос к authority, отказ.

use super::state::PeekRequest;
use crate::error::CoverError;
use crate::surface::PeekDirection;
use bevy::prelude::*;

/// Кнопка peek (input layer)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PeekInput {
    pub actor: Entity,
    pub direction: PeekDirection,
    pub pressed: bool,
}

/// Классифицированный запрос (Begin/Stop/AdjustDepth)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PeekCommand {
    pub actor: Entity,
    pub request: PeekRequest,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct PeekRejected {
    pub actor: Entity,
    pub request: PeekRequest,
    pub error: CoverError,
}
