//! Replicated snapshots cover/peek state.

use crate::bunker::BunkerId;
use crate::components::{CharacterCapsule, Stance};
use crate::cover::{BunkerCover, CoverPhase, Exposure};
use crate::peek::PeekNetState;
use crate::surface::{PeekDirection, PositionRef};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// То, что observers знают о cover state персонажа
#[derive(Debug, Clone, Copy, PartialEq, Default, Reflect, Serialize, Deserialize)]
pub struct CoverNetState {
    pub phase: CoverPhase,
    pub bunker: Option<BunkerId>,
    pub position: Option<PositionRef>,
    pub stance: Stance,
    pub exposure: Exposure,
    pub peek: PeekDirection,
}

impl CoverNetState {
    pub fn capture(cover: &BunkerCover, capsule: &CharacterCapsule) -> Self {
        Self {
            phase: cover.phase,
            bunker: cover.bunker,
            position: cover.position,
            stance: capsule.stance,
            exposure: cover.exposure,
            peek: cover.peek,
        }
    }

    /// Зеркало на replica (без claims, без transitions)
    pub fn apply_to(&self, cover: &mut BunkerCover, capsule: &mut CharacterCapsule) {
        cover.phase = self.phase;
        cover.bunker = self.bunker;
        cover.position = self.position;
        cover.exposure = self.exposure;
        cover.peek = self.peek;
        capsule.stance = self.stance;
    }
}

/// Per-entity учёт репликации
///
/// Сервер: последнее отправленное. Клиент: последнее полученное + последнее,
/// о котором уже был rep-notify.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct ReplicatedState {
    pub last_cover: Option<CoverNetState>,
    pub last_peek: Option<PeekNetState>,
    pub(crate) notified_cover: Option<CoverNetState>,
    pub(crate) notified_peek: Option<PeekNetState>,
}

impl ReplicatedState {
    /// Новое значение cover для rep-notify (один раз на устоявшееся значение)
    pub(crate) fn take_cover_change(&mut self) -> Option<CoverNetState> {
        let current = self.last_cover?;
        if self.notified_cover == Some(current) {
            return None;
        }
        self.notified_cover = Some(current);
        Some(current)
    }

    pub(crate) fn take_peek_change(&mut self) -> Option<PeekNetState> {
        let current = self.last_peek?;
        if self.notified_peek == Some(current) {
            return None;
        }
        self.notified_peek = Some(current);
        Some(current)
    }
}
