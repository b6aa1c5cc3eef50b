//! Transport abstraction + in-process loopback.

use super::messages::NetMessage;
use crate::error::{CoverError, CoverResult};
use crate::logger::log_warning;
use bevy::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Доставка сообщений (реальная сеть или loopback)
///
/// Контракт: сообщения одного отправителя приходят в порядке отправки.
pub trait ReplicationTransport: Send + Sync + 'static {
    fn send(&mut self, message: &NetMessage) -> CoverResult<()>;

    /// Всё, что пришло с прошлого вызова
    fn receive(&mut self) -> CoverResult<Vec<NetMessage>>;
}

type Queue = Arc<Mutex<VecDeque<String>>>;

/// Два конца одного in-process канала (JSON строки, как по сети)
pub struct LoopbackTransport {
    outbox: Queue,
    inbox: Queue,
}

impl LoopbackTransport {
    pub fn pair() -> (Self, Self) {
        let a: Queue = Arc::default();
        let b: Queue = Arc::default();
        (
            Self {
                outbox: a.clone(),
                inbox: b.clone(),
            },
            Self {
                outbox: b,
                inbox: a,
            },
        )
    }

    /// Сообщений в пути к другому концу
    pub fn in_flight(&self) -> usize {
        self.outbox.lock().map(|queue| queue.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> CoverError {
    CoverError::Transport("loopback queue poisoned".to_string())
}

impl ReplicationTransport for LoopbackTransport {
    fn send(&mut self, message: &NetMessage) -> CoverResult<()> {
        let text = message.encode()?;
        self.outbox.lock().map_err(poisoned)?.push_back(text);
        Ok(())
    }

    fn receive(&mut self) -> CoverResult<Vec<NetMessage>> {
        let texts: Vec<String> = self.inbox.lock().map_err(poisoned)?.drain(..).collect();
        let mut messages = Vec::with_capacity(texts.len());
        for text in texts {
            match NetMessage::decode(&text) {
                Ok(message) => messages.push(message),
                Err(err) => log_warning(&format!("Replication: dropping malformed message: {}", err)),
            }
        }
        Ok(messages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetSide {
    Server,
    Client,
}

/// Сетевой конец этого мира (нет resource'а → локальная игра, всё authority)
#[derive(Resource)]
pub struct NetEndpoint {
    pub side: NetSide,
    transport: Box<dyn ReplicationTransport>,
}

impl NetEndpoint {
    pub fn server(transport: impl ReplicationTransport) -> Self {
        Self {
            side: NetSide::Server,
            transport: Box::new(transport),
        }
    }

    pub fn client(transport: impl ReplicationTransport) -> Self {
        Self {
            side: NetSide::Client,
            transport: Box::new(transport),
        }
    }

    pub fn send(&mut self, message: NetMessage) {
        if let Err(err) = self.transport.send(&message) {
            log_warning(&format!("Replication: send {:?} failed: {}", message, err));
        }
    }

    pub fn receive(&mut self) -> Vec<NetMessage> {
        self.transport.receive().unwrap_or_else(|err| {
            log_warning(&format!("Replication: receive failed: {}", err));
            Vec::new()
        })
    }
}
