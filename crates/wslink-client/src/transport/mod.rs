//! Transport layer (full-duplex socket seam).
//!
//! The driver only sees [`Connector`] / [`Link`]; the WebSocket implementation
//! lives in `ws`, and `memory` provides a scripted in-process transport.

pub mod memory;
pub mod ws;

use async_trait::async_trait;

use wslink_core::error::Result;

pub use memory::{MemoryConnector, MemoryPeer};
pub use ws::WsConnector;

/// Close code sent on a client-initiated disconnect.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when a close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code reported when the peer vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Transport-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Writing half of an open link.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Reading half of an open link. `None` means the link is gone.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> Option<Result<Frame>>;
}

/// An open link, split so reads and writes never contend.
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

/// Opens links to an endpoint URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Link>;
}
