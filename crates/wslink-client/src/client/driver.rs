//! Connection driver: the single task that owns the connection.
//!
//! State, attempt counter, queue, session context, the open link and both
//! timers live here and nowhere else. Handles reach the driver through
//! [`Command`]s; every timer and socket event is handled to completion inside
//! one `select!` loop, so nothing here needs a lock.

use std::future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

use wslink_core::error::{Result, WsLinkError};
use wslink_core::protocol::{self, Envelope};

use super::events::{ClientEvent, EventBus};
use super::state::{ConnectionState, StateCell};
use super::Delivery;
use crate::auth::{self, CredentialProvider};
use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, Route};
use crate::heartbeat::Heartbeat;
use crate::obs::ClientMetrics;
use crate::queue::OutboundQueue;
use crate::reconnect::ReconnectScheduler;
use crate::transport::{Connector, Frame, Link, CLOSE_ABNORMAL, CLOSE_NORMAL};

pub(crate) enum Command {
    Connect {
        session_id: Option<String>,
        user_id: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        env: Envelope,
        reply: oneshot::Sender<Result<Delivery>>,
    },
    Ping {
        reply: oneshot::Sender<bool>,
    },
    UpdateSession {
        session_id: String,
        user_id: Option<String>,
    },
}

/// Ids stamped onto outbound envelopes that carry none of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl SessionContext {
    pub fn stamp(&self, env: &mut Envelope) {
        if env.session_id.is_none() {
            env.session_id = self.session_id.clone();
        }
        if env.user_id.is_none() {
            env.user_id = self.user_id.clone();
        }
    }
}

pub(crate) struct Driver {
    cfg: Arc<ClientConfig>,
    connector: Arc<dyn Connector>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: StateCell,
    events: EventBus,
    metrics: Arc<ClientMetrics>,

    session: SessionContext,
    queue: OutboundQueue,
    reconnect: ReconnectScheduler,
    heartbeat: Heartbeat,
    dispatcher: Dispatcher,

    link: Option<Link>,
    opening: Option<BoxFuture<'static, Result<Link>>>,
    waiters: Vec<oneshot::Sender<Result<()>>>,
    manual_close: bool,
}

pub(crate) struct DriverParts {
    pub cfg: Arc<ClientConfig>,
    pub connector: Arc<dyn Connector>,
    pub credentials: Option<Arc<dyn CredentialProvider>>,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub state: StateCell,
    pub events: EventBus,
    pub metrics: Arc<ClientMetrics>,
}

impl Driver {
    pub(crate) fn new(parts: DriverParts) -> Self {
        let cfg = parts.cfg;
        Self {
            queue: OutboundQueue::new(cfg.queue_capacity, cfg.queue_overflow),
            reconnect: ReconnectScheduler::new(&cfg),
            heartbeat: Heartbeat::new(cfg.heartbeat_interval()),
            dispatcher: Dispatcher::new(),
            session: SessionContext::default(),
            link: None,
            opening: None,
            waiters: Vec::new(),
            manual_close: false,
            connector: parts.connector,
            credentials: parts.credentials,
            commands: parts.commands,
            state: parts.state,
            events: parts.events,
            metrics: parts.metrics,
            cfg,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => break,
                },
                opened = join_open(&mut self.opening) => match opened {
                    Ok(link) => self.on_open(link).await,
                    Err(e) => self.on_open_failed(e),
                },
                frame = next_inbound(&mut self.link) => self.on_inbound(frame).await,
                _ = self.heartbeat.tick() => self.on_heartbeat().await,
                _ = self.reconnect.due() => self.on_retry_due(),
            }
        }

        // every handle is gone
        self.disconnect().await;
        tracing::debug!("client driver stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect {
                session_id,
                user_id,
                reply,
            } => self.connect(session_id, user_id, reply),
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::Send { env, reply } => {
                let res = self.send(env).await;
                let _ = reply.send(res);
            }
            Command::Ping { reply } => {
                let sent = self.ping().await;
                let _ = reply.send(sent);
            }
            Command::UpdateSession {
                session_id,
                user_id,
            } => {
                self.session.session_id = Some(session_id);
                if user_id.is_some() {
                    self.session.user_id = user_id;
                }
            }
        }
    }

    fn connect(
        &mut self,
        session_id: Option<String>,
        user_id: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    ) {
        if self.state.get() == ConnectionState::Connected && self.link.is_some() {
            let _ = reply.send(Ok(()));
            return;
        }

        if session_id.is_some() {
            self.session.session_id = session_id;
        }
        if user_id.is_some() {
            self.session.user_id = user_id;
        }
        self.manual_close = false;
        self.waiters.push(reply);

        if self.opening.is_some() {
            return;
        }
        if self.reconnect.cancel() {
            tracing::debug!("pending retry replaced by explicit connect");
        }
        self.begin_open();
    }

    fn begin_open(&mut self) {
        let token = self.credentials.as_ref().and_then(|c| c.token());
        let url = match auth::endpoint_url(&self.cfg.endpoint, &self.cfg.token_param, token.as_deref())
        {
            Ok(url) => url,
            Err(e) => {
                self.on_open_failed(e);
                return;
            }
        };

        self.transition(ConnectionState::Connecting);
        tracing::info!(endpoint = %self.cfg.endpoint, "opening connection");

        let connector = Arc::clone(&self.connector);
        self.opening = Some(Box::pin(async move { connector.open(&url).await }));
    }

    async fn on_open(&mut self, link: Link) {
        self.link = Some(link);
        self.reconnect.reset();
        self.metrics.reconnect_attempts.set(0);
        self.metrics.opens.inc();

        self.heartbeat.start();
        self.flush().await;
        self.transition(ConnectionState::Connected);
        tracing::info!(endpoint = %self.cfg.endpoint, "connection open");
        self.events.emit(ClientEvent::Open);

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn on_open_failed(&mut self, err: WsLinkError) {
        tracing::warn!(error = %err, code = err.kind().as_str(), "connection attempt failed");
        self.transition(ConnectionState::Error);
        self.emit_error(&err);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(err.clone()));
        }
        self.on_closed(CLOSE_ABNORMAL, err.to_string());
    }

    fn on_closed(&mut self, code: u16, reason: String) {
        self.link = None;
        self.heartbeat.stop();
        self.transition(ConnectionState::Disconnected);
        tracing::info!(code, reason = %reason, "connection closed");
        self.events.emit(ClientEvent::Close { code, reason });

        if !self.manual_close {
            self.schedule_retry();
        }
    }

    fn schedule_retry(&mut self) {
        match self.reconnect.schedule() {
            Some((attempt, delay)) => {
                let max = self.reconnect.max_attempts();
                self.metrics.reconnect_attempts.set(u64::from(attempt));
                self.metrics.reconnect_attempts_total.inc();
                self.transition(ConnectionState::Reconnecting);
                tracing::info!(attempt, max, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.events.emit(ClientEvent::ReconnectAttempt { attempt, max });
            }
            None => {
                tracing::warn!(
                    attempts = self.reconnect.attempts(),
                    "reconnect attempts exhausted; waiting for an explicit connect"
                );
            }
        }
    }

    fn on_retry_due(&mut self) {
        if self.manual_close || self.state.get() != ConnectionState::Reconnecting {
            return;
        }
        self.begin_open();
    }

    async fn on_inbound(&mut self, frame: Option<Result<Frame>>) {
        match frame {
            Some(Ok(Frame::Text(text))) => self.on_text(text).await,
            Some(Ok(Frame::Binary(bytes))) => {
                self.metrics.frames_received.inc();
                tracing::debug!(len = bytes.len(), "binary frame ignored");
            }
            Some(Ok(Frame::Close { code, reason })) => self.on_closed(code, reason),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "transport error");
                self.transition(ConnectionState::Error);
                self.emit_error(&e);
                self.on_closed(CLOSE_ABNORMAL, e.to_string());
            }
            None => self.on_closed(CLOSE_ABNORMAL, "connection lost".into()),
        }
    }

    async fn on_text(&mut self, text: String) {
        self.metrics.frames_received.inc();
        if self.cfg.debug_logging {
            tracing::debug!(frame = %text, "inbound frame");
        }

        match self.dispatcher.route(&text) {
            Ok(Route::Reply(mut reply)) => {
                self.session.stamp(&mut reply);
                if let Err(e) = self.transmit_envelope(&reply).await {
                    tracing::warn!(error = %e, "pong reply failed");
                }
            }
            Ok(Route::Acknowledged) => {
                self.metrics.pongs_received.inc();
                match self.heartbeat.acknowledge() {
                    Some(delay) => {
                        self.metrics.last_pong_delay_ms.set(delay.as_millis() as u64);
                        tracing::trace!(delay_ms = delay.as_millis() as u64, "pong received");
                    }
                    None => tracing::trace!("pong received"),
                }
            }
            Ok(Route::Deliver(env)) => self.events.emit(ClientEvent::Message(env)),
            Err(e) => {
                self.metrics.frames_malformed.inc();
                tracing::warn!(error = %e, len = text.len(), "malformed inbound frame dropped");
            }
        }
    }

    async fn on_heartbeat(&mut self) {
        let mut ping = Envelope::ping();
        self.session.stamp(&mut ping);
        if let Err(e) = self.transmit_envelope(&ping).await {
            tracing::warn!(error = %e, "heartbeat ping failed");
        }
    }

    async fn ping(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        let mut ping = Envelope::ping();
        self.session.stamp(&mut ping);
        self.transmit_envelope(&ping).await.is_ok()
    }

    async fn send(&mut self, mut env: Envelope) -> Result<Delivery> {
        self.session.stamp(&mut env);
        env.touch();

        let text = match protocol::encode_checked(&env, self.cfg.max_message_size_bytes) {
            Ok(text) => text,
            Err(e) => {
                self.metrics.messages_rejected.inc();
                tracing::warn!(error = %e, message_type = env.message_type().as_str(), "outbound message rejected");
                return Err(e);
            }
        };

        if self.is_connected() {
            match self.transmit(text).await {
                Ok(()) => return Ok(Delivery::Sent),
                Err(e) => tracing::warn!(error = %e, "send failed; queueing"),
            }
        }

        self.enqueue(env)
    }

    fn enqueue(&mut self, env: Envelope) -> Result<Delivery> {
        let res = match self.queue.push(env) {
            Ok(evicted) => {
                self.metrics.messages_queued.inc();
                if evicted.is_some() {
                    self.metrics.messages_evicted.inc();
                    tracing::warn!(capacity = self.cfg.queue_capacity, "outbound queue full; oldest message dropped");
                }
                Ok(Delivery::Queued)
            }
            Err(e) => {
                self.metrics.messages_rejected.inc();
                tracing::warn!(error = %e, "outbound message rejected");
                Err(e)
            }
        };
        self.metrics.queue_depth.set(self.queue.len() as u64);
        res
    }

    async fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let mut pending = self.queue.take_all();
        let total = pending.len();

        while let Some(env) = pending.pop_front() {
            if let Err(e) = self.transmit_envelope(&env).await {
                tracing::warn!(error = %e, "queue drain interrupted");
                pending.push_front(env);
                break;
            }
        }

        let unsent = pending.len();
        self.queue.restore(pending);
        self.metrics.queue_depth.set(self.queue.len() as u64);
        tracing::debug!(sent = total - unsent, unsent, "outbound queue drained");
    }

    async fn disconnect(&mut self) {
        self.manual_close = true;
        self.heartbeat.stop();
        if self.reconnect.cancel() {
            tracing::debug!("pending retry cancelled");
        }

        if self.opening.take().is_some() {
            tracing::debug!("connection attempt abandoned");
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(WsLinkError::Closed("disconnected before open".into())));
        }

        let had_link = match self.link.take() {
            Some(mut link) => {
                if let Err(e) = link.sink.close(CLOSE_NORMAL, "client disconnect").await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                true
            }
            None => false,
        };

        self.transition(ConnectionState::Disconnected);
        if had_link {
            tracing::info!("connection closed by client");
            self.events.emit(ClientEvent::Close {
                code: CLOSE_NORMAL,
                reason: "client disconnect".into(),
            });
        }
    }

    fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected && self.link.is_some()
    }

    async fn transmit_envelope(&mut self, env: &Envelope) -> Result<()> {
        let text = protocol::encode(env)?;
        self.transmit(text).await
    }

    async fn transmit(&mut self, text: String) -> Result<()> {
        let Some(link) = self.link.as_mut() else {
            return Err(WsLinkError::Transport("not connected".into()));
        };
        if self.cfg.debug_logging {
            tracing::debug!(frame = %text, "outbound frame");
        }
        link.sink.send_text(text).await?;
        self.metrics.frames_sent.inc();
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        if let Some(prev) = self.state.set(next) {
            tracing::debug!(from = %prev, to = %next, "state change");
            self.metrics.set_state(next);
            self.events.emit(ClientEvent::StateChange {
                from: prev,
                to: next,
            });
        }
    }

    fn emit_error(&self, err: &WsLinkError) {
        self.events.emit(ClientEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

async fn join_open(opening: &mut Option<BoxFuture<'static, Result<Link>>>) -> Result<Link> {
    match opening.as_mut() {
        Some(fut) => {
            let res = fut.await;
            *opening = None;
            res
        }
        None => future::pending().await,
    }
}

async fn next_inbound(link: &mut Option<Link>) -> Option<Result<Frame>> {
    match link.as_mut() {
        Some(link) => link.stream.next_frame().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_fills_only_missing_ids() {
        let ctx = SessionContext {
            session_id: Some("s-1".into()),
            user_id: Some("u-1".into()),
        };

        let mut env = Envelope::chat("hi");
        ctx.stamp(&mut env);
        assert_eq!(env.session_id.as_deref(), Some("s-1"));
        assert_eq!(env.user_id.as_deref(), Some("u-1"));

        let mut env = Envelope::chat("hi").with_session("mine");
        ctx.stamp(&mut env);
        assert_eq!(env.session_id.as_deref(), Some("mine"));
        assert_eq!(env.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn empty_context_stamps_nothing() {
        let mut env = Envelope::ping();
        SessionContext::default().stamp(&mut env);
        assert!(env.session_id.is_none());
        assert!(env.user_id.is_none());
    }
}
