//! The open gate
//!
//! `Link` is the only way outbound frames reach the socket. It holds the
//! sending side of the per-connection channel while, and only while, the
//! connection is open, so a closed link silently drops writes.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tungstenite::protocol::Message as WsMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

#[derive(Debug, Default)]
struct Outbound {
    sender: Option<mpsc::UnboundedSender<WsMessage>>,
    connected_once: bool,
}

#[derive(Debug)]
pub struct Link {
    outbound: Mutex<Outbound>,
    state: watch::Sender<ConnectionState>,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            outbound: Mutex::new(Outbound::default()),
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn set_connecting(&self) {
        self.state.send_replace(ConnectionState::Connecting);
    }

    /// Marks the link open with a fresh outbound channel.
    ///
    /// Returns `true` for the very first open of this link and `false` for
    /// every later one, which is what separates `open` from `reconnect`.
    pub fn open(&self, sender: mpsc::UnboundedSender<WsMessage>) -> bool {
        let first = {
            let mut outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
            outbound.sender = Some(sender);
            let first = !outbound.connected_once;
            outbound.connected_once = true;
            first
        };
        self.state.send_replace(ConnectionState::Open);
        first
    }

    /// Drops the outbound channel and marks the link disconnected.
    pub fn close(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sender = None;
        self.state.send_replace(ConnectionState::Disconnected);
    }

    pub fn connected_once(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected_once
    }

    /// Queues one binary frame. Returns `false`, writing nothing, when the
    /// link is not open.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match &outbound.sender {
            Some(sender) => sender.send(WsMessage::binary(frame)).is_ok(),
            None => false,
        }
    }
}
