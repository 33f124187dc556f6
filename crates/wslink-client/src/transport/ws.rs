//! WebSocket transport over tokio-tungstenite.
//!
//! Responsibilities:
//! - Open the socket (`connect_async`) and split it into sink/stream halves
//! - Map tungstenite messages onto [`Frame`]
//! - Leave protocol ping/pong frames to tungstenite (it answers them itself)

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use wslink_core::error::{Result, WsLinkError};

use super::{Connector, Frame, FrameSink, FrameStream, Link, CLOSE_NO_STATUS};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real WebSocket connections.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Link> {
        let (socket, resp) = connect_async(url)
            .await
            .map_err(|e| WsLinkError::Transport(format!("open failed: {e}")))?;
        tracing::debug!(status = %resp.status(), "websocket handshake complete");

        let (tx, rx) = socket.split();
        Ok(Link {
            sink: Box::new(WsSink { tx }),
            stream: Box::new(WsStream { rx }),
        })
    }
}

struct WsSink {
    tx: SplitSink<Socket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.tx
            .send(Message::text(text))
            .await
            .map_err(|e| WsLinkError::Transport(format!("send failed: {e}")))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.tx
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| WsLinkError::Transport(format!("close failed: {e}")))
    }
}

struct WsStream {
    rx: SplitStream<Socket>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let msg = match self.rx.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(WsLinkError::Transport(format!("recv failed: {e}")))),
            };
            let frame = match msg {
                Message::Text(t) => Frame::Text(t.as_str().to_owned()),
                Message::Binary(b) => Frame::Binary(b.to_vec()),
                Message::Close(cf) => match cf {
                    Some(cf) => Frame::Close {
                        code: u16::from(cf.code),
                        reason: cf.reason.as_str().to_owned(),
                    },
                    None => Frame::Close {
                        code: CLOSE_NO_STATUS,
                        reason: String::new(),
                    },
                },
                // answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }
}
