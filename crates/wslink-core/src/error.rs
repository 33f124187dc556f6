//! Shared error type across wsLink crates.

use thiserror::Error;

/// Stable error categories (used in logs and events).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport could not open, or dropped unexpectedly.
    Transport,
    /// Malformed payload or envelope.
    Protocol,
    /// Outbound envelope exceeds the configured size limit.
    PayloadTooLarge,
    /// Outbound queue is full and configured to reject new messages.
    QueueFull,
    /// Invalid configuration.
    Config,
    /// Client driver is gone or the operation was cut short.
    Closed,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::QueueFull => "QUEUE_FULL",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Closed => "CLOSED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WsLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WsLinkError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("outbound queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("config: {0}")]
    Config(String),
    #[error("closed: {0}")]
    Closed(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl WsLinkError {
    /// Map to a stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WsLinkError::Transport(_) => ErrorKind::Transport,
            WsLinkError::Protocol(_) => ErrorKind::Protocol,
            WsLinkError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            WsLinkError::QueueFull { .. } => ErrorKind::QueueFull,
            WsLinkError::Config(_) => ErrorKind::Config,
            WsLinkError::Closed(_) => ErrorKind::Closed,
            WsLinkError::Internal(_) => ErrorKind::Internal,
        }
    }
}
