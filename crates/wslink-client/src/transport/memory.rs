//! In-process transport with scripted open outcomes.
//!
//! Every accepted `open()` yields a [`MemoryPeer`] on the connector, which
//! plays the remote side: it observes outbound frames and injects inbound
//! ones. Dropping the peer looks like the remote vanishing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wslink_core::error::{Result, WsLinkError};

use super::{Connector, Frame, FrameSink, FrameStream, Link};

#[derive(Debug, Default)]
struct Script {
    refuse_next: u32,
    refuse_all: bool,
    send_limit: Option<usize>,
    open_delay: Option<Duration>,
    urls: Vec<String>,
    opened: usize,
}

/// Scripted in-memory connector. Clones share the same script and peers.
#[derive(Clone)]
pub struct MemoryConnector {
    script: Arc<Mutex<Script>>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            peers_tx,
            peers_rx: Arc::new(tokio::sync::Mutex::new(peers_rx)),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Refuse the next `n` open attempts.
    pub fn refuse_next(&self, n: u32) {
        self.script().refuse_next += n;
    }

    /// Refuse every open attempt until turned off again.
    pub fn refuse_all(&self, on: bool) {
        self.script().refuse_all = on;
    }

    /// Links opened from now on accept `n` outbound frames, then fail sends.
    pub fn limit_sends(&self, n: Option<usize>) {
        self.script().send_limit = n;
    }

    /// Accepted opens wait this long before the link is handed over.
    pub fn delay_opens(&self, delay: Option<Duration>) {
        self.script().open_delay = delay;
    }

    /// Number of `open()` calls so far, accepted or not.
    pub fn attempts(&self) -> usize {
        self.script().urls.len()
    }

    /// URLs passed to `open()`, in call order.
    pub fn urls(&self) -> Vec<String> {
        self.script().urls.clone()
    }

    /// Number of `open()` calls that ran to completion with a link.
    pub fn opened(&self) -> usize {
        self.script().opened
    }

    /// Wait for the peer side of the next accepted link.
    pub async fn next_peer(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<Link> {
        let (send_limit, open_delay) = {
            let mut script = self.script();
            script.urls.push(url.to_owned());
            if script.refuse_all {
                return Err(WsLinkError::Transport("connection refused".into()));
            }
            if script.refuse_next > 0 {
                script.refuse_next -= 1;
                return Err(WsLinkError::Transport("connection refused".into()));
            }
            (script.send_limit, script.open_delay)
        };

        // dropping this future mid-sleep abandons the open
        if let Some(delay) = open_delay {
            tokio::time::sleep(delay).await;
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            url: url.to_owned(),
            outbound: out_rx,
            inbound: in_tx,
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| WsLinkError::Transport("memory connector has no listener".into()))?;
        self.script().opened += 1;

        Ok(Link {
            sink: Box::new(MemorySink {
                tx: out_tx,
                remaining: send_limit,
            }),
            stream: Box::new(MemoryStream { rx: in_rx }),
        })
    }
}

struct MemorySink {
    tx: mpsc::UnboundedSender<Frame>,
    remaining: Option<usize>,
}

impl MemorySink {
    fn push(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| WsLinkError::Transport("peer gone".into()))
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if let Some(left) = self.remaining.as_mut() {
            if *left == 0 {
                return Err(WsLinkError::Transport("send budget exhausted".into()));
            }
            *left -= 1;
        }
        self.push(Frame::Text(text))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.push(Frame::Close {
            code,
            reason: reason.to_owned(),
        })
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Result<Frame>>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.rx.recv().await
    }
}

/// Remote side of one in-memory link.
pub struct MemoryPeer {
    url: String,
    outbound: mpsc::UnboundedReceiver<Frame>,
    inbound: mpsc::UnboundedSender<Result<Frame>>,
}

impl MemoryPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next frame the client sent, waiting if none yet.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next frame the client sent, if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    /// Every frame buffered so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Ok(f) = self.outbound.try_recv() {
            out.push(f);
        }
        out
    }

    /// Deliver a text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.inbound.send(Ok(Frame::Text(text.into()))).is_ok()
    }

    /// Deliver a binary frame to the client.
    pub fn push_binary(&self, bytes: Vec<u8>) -> bool {
        self.inbound.send(Ok(Frame::Binary(bytes))).is_ok()
    }

    /// Close the link from the remote side.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.inbound
            .send(Ok(Frame::Close {
                code,
                reason: reason.to_owned(),
            }))
            .is_ok()
    }

    /// Surface a transport error on the client's read half.
    pub fn fail(&self, message: &str) -> bool {
        self.inbound
            .send(Err(WsLinkError::Transport(message.to_owned())))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn scripted_refusals_then_accept() {
        let connector = MemoryConnector::new();
        connector.refuse_next(2);

        assert!(connector.open("ws://a").await.is_err());
        assert!(connector.open("ws://b").await.is_err());
        let mut link = connector.open("ws://c").await.unwrap();
        assert_eq!(connector.attempts(), 3);
        assert_eq!(connector.urls(), vec!["ws://a", "ws://b", "ws://c"]);

        let mut peer = connector.next_peer().await.unwrap();
        assert_eq!(peer.url(), "ws://c");

        link.sink.send_text("hi".into()).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Text("hi".into())));

        assert!(peer.push_text("back"));
        let got = link.stream.next_frame().await.unwrap().unwrap();
        assert_eq!(got, Frame::Text("back".into()));

        drop(peer);
        assert!(link.stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn send_limit_fails_after_budget() {
        let connector = MemoryConnector::new();
        connector.limit_sends(Some(1));
        let mut link = connector.open("ws://x").await.unwrap();
        let _peer = connector.next_peer().await.unwrap();

        assert!(link.sink.send_text("one".into()).await.is_ok());
        assert!(link.sink.send_text("two".into()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_open_can_be_abandoned() {
        let connector = MemoryConnector::new();
        connector.delay_opens(Some(Duration::from_secs(1)));

        let slow = connector.open("ws://slow");
        assert!(tokio::time::timeout(Duration::from_millis(500), slow).await.is_err());
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.opened(), 0);

        let started = tokio::time::Instant::now();
        let _link = connector.open("ws://slow").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.next_peer().await.unwrap().url(), "ws://slow");
    }
}
