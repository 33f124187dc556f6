use tokio::sync::broadcast;

use wslink_core::error::ErrorKind;
use wslink_core::protocol::Envelope;

use super::state::ConnectionState;

/// Lifecycle and message events, in the order the driver produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Open,
    Close { code: u16, reason: String },
    Error { kind: ErrorKind, message: String },
    /// Application-level message (never Ping/Pong).
    Message(Envelope),
    StateChange {
        from: ConnectionState,
        to: ConnectionState,
    },
    ReconnectAttempt { attempt: u32, max: u32 },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Open => "open",
            ClientEvent::Close { .. } => "close",
            ClientEvent::Error { .. } => "error",
            ClientEvent::Message(_) => "message",
            ClientEvent::StateChange { .. } => "stateChange",
            ClientEvent::ReconnectAttempt { .. } => "reconnectAttempt",
        }
    }
}

/// Fan-out to any number of subscribers. A subscriber that falls more than
/// `capacity` events behind sees `RecvError::Lagged` and skips ahead.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }
}
