//! Ошибки cover-подсистемы.
//!
//! Ни одна из них не фатальна: вызывающий остаётся в предыдущем валидном состоянии.

use crate::bunker::BunkerId;
use crate::components::Stance;
use crate::surface::{PeekDirection, PositionRef};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoverError {
    /// Bunker не зарегистрирован (или уже удалён из registry)
    #[error("unknown bunker {0:?}")]
    UnknownBunker(BunkerId),

    /// Позиция не существует на поверхности (slot index вне диапазона, alpha для SlotSet и т.д.)
    #[error("invalid position {position:?} on bunker {bunker:?}")]
    InvalidPosition { bunker: BunkerId, position: PositionRef },

    /// Contention: позицию держит кто-то другой
    #[error("position {position:?} on bunker {bunker:?} is already claimed")]
    SlotOccupied { bunker: BunkerId, position: PositionRef },

    /// Approach или blend ещё идут
    #[error("cover transition in progress")]
    Busy,

    #[error("no cover candidates")]
    NoCandidates,

    #[error("not in cover")]
    NotInCover,

    #[error("stance {0:?} is not allowed here")]
    IllegalStance(Stance),

    #[error("peek {0:?} is not allowed here")]
    IllegalPeek(PeekDirection),

    /// Peek запрошен раньше конца refractory окна
    #[error("peek refractory period ({remaining:.3}s left)")]
    Refractory { remaining: f32 },

    #[error("no floor found under {0:?}")]
    NoFloor(bevy::math::Vec3),

    #[error("replication transport: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for CoverError {
    fn from(err: serde_json::Error) -> Self {
        CoverError::Transport(err.to_string())
    }
}

pub type CoverResult<T> = Result<T, CoverError>;
