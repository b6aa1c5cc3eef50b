//! Wire messages (JSON).

use super::snapshot::CoverNetState;
use super::NetId;
use crate::cover::CoverIntent;
use crate::error::CoverResult;
use crate::peek::{PeekNetState, PeekRequest};
use serde::{Deserialize, Serialize};

/// Всё, что ходит между authority и клиентами
///
/// Requests: клиент → сервер. States: сервер → клиенты.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetMessage {
    CoverRequest { net_id: NetId, intent: CoverIntent },
    PeekRequest { net_id: NetId, request: PeekRequest },
    CoverState { net_id: NetId, state: CoverNetState },
    PeekState { net_id: NetId, state: PeekNetState },
}

impl NetMessage {
    pub fn net_id(&self) -> NetId {
        match self {
            NetMessage::CoverRequest { net_id, .. }
            | NetMessage::PeekRequest { net_id, .. }
            | NetMessage::CoverState { net_id, .. }
            | NetMessage::PeekState { net_id, .. } => *net_id,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, NetMessage::CoverRequest { .. } | NetMessage::PeekRequest { .. })
    }

    pub fn encode(&self) -> CoverResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> CoverResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
