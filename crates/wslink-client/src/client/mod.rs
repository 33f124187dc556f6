//! Client handle.
//!
//! [`Client`] is a cheap, cloneable handle onto one connection driver task.
//! Operations that need the driver's answer (`connect`, `send`, `ping`,
//! `disconnect`) are async; state, counters and event subscriptions are read
//! without a round trip.

mod driver;
pub mod events;
pub mod state;

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use wslink_core::error::{Result, WsLinkError};
use wslink_core::protocol::{Envelope, DEFAULT_AUDIO_FORMAT};

use crate::auth::CredentialProvider;
use crate::config::ClientConfig;
use crate::obs::{ClientMetrics, MetricsSnapshot};
use crate::transport::Connector;

use driver::{Command, Driver, DriverParts};

pub use driver::SessionContext;
pub use events::ClientEvent;
pub use state::ConnectionState;

const EVENT_CAPACITY: usize = 256;

/// Outcome of an accepted `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the open link.
    Sent,
    /// Held in the outbound queue until the next open.
    Queued,
}

impl Delivery {
    pub fn is_sent(self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Settles once the link opens, or with the error that prevented it.
/// Dropping it does not cancel the attempt.
pub struct ConnectHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl IntoFuture for ConnectHandle {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.rx.await.unwrap_or_else(|_| Err(driver_gone())) })
    }
}

/// Cloneable handle onto one connection driver.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: events::EventBus,
    metrics: Arc<ClientMetrics>,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Validate `config` and start the driver on the current tokio runtime.
    pub fn new(config: ClientConfig, connector: impl Connector) -> Result<Self> {
        Self::spawn(config, Arc::new(connector), None)
    }

    /// Like [`Client::new`], attaching a token from `credentials` to every
    /// connection attempt.
    pub fn with_credentials(
        config: ClientConfig,
        connector: impl Connector,
        credentials: impl CredentialProvider + 'static,
    ) -> Result<Self> {
        Self::spawn(config, Arc::new(connector), Some(Arc::new(credentials)))
    }

    fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| WsLinkError::Internal(format!("no tokio runtime: {e}")))?;

        let config = Arc::new(config);
        let (tx, rx) = mpsc::unbounded_channel();
        let (cell, state) = state::StateCell::new();
        let events = events::EventBus::new(EVENT_CAPACITY);
        let metrics = Arc::new(ClientMetrics::default());

        let driver = Driver::new(DriverParts {
            cfg: Arc::clone(&config),
            connector,
            credentials,
            commands: rx,
            state: cell,
            events: events.clone(),
            metrics: Arc::clone(&metrics),
        });
        runtime.spawn(driver.run());

        Ok(Self {
            commands: tx,
            state,
            events,
            metrics,
            config,
        })
    }

    /// Open the connection. A no-op success when already connected.
    pub fn connect(&self, session_id: Option<&str>, user_id: Option<&str>) -> ConnectHandle {
        let (reply, rx) = oneshot::channel();
        // a closed channel drops `reply`, which the handle reports as closed
        let _ = self.commands.send(Command::Connect {
            session_id: session_id.map(str::to_owned),
            user_id: user_id.map(str::to_owned),
            reply,
        });
        ConnectHandle { rx }
    }

    /// Close the link and stop any pending retry. Idempotent.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Send now if connected, otherwise queue. Oversized envelopes are
    /// rejected and never queued.
    pub async fn send(&self, env: Envelope) -> Result<Delivery> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { env, reply })
            .map_err(|_| driver_gone())?;
        rx.await.map_err(|_| driver_gone())?
    }

    pub async fn send_chat(&self, text: impl Into<String>, session_id: Option<&str>) -> Result<Delivery> {
        let mut env = Envelope::chat(text);
        env.session_id = session_id.map(str::to_owned);
        self.send(env).await
    }

    /// Send raw audio; `format` defaults to [`DEFAULT_AUDIO_FORMAT`].
    pub async fn send_voice(
        &self,
        audio: &[u8],
        format: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Delivery> {
        let mut env = Envelope::voice(audio, format.unwrap_or(DEFAULT_AUDIO_FORMAT));
        env.session_id = session_id.map(str::to_owned);
        self.send(env).await
    }

    /// Send one `Ping` right away. `false` when not connected; pings are
    /// never queued.
    pub async fn ping(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Ping { reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Replace the session id stamped onto outbound envelopes; the user id
    /// only when one is given.
    pub fn update_session(&self, session_id: &str, user_id: Option<&str>) {
        let _ = self.commands.send(Command::UpdateSession {
            session_id: session_id.to_owned(),
            user_id: user_id.map(str::to_owned),
        });
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Events produced after this call, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Envelopes waiting in the outbound queue.
    pub fn queued(&self) -> usize {
        self.metrics.queue_depth.get() as usize
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.metrics.reconnect_attempts.get() as u32
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Prometheus text for this client's counters.
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn driver_gone() -> WsLinkError {
    WsLinkError::Closed("client driver stopped".into())
}
