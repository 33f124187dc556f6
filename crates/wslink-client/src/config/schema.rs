use std::time::Duration;

use serde::Deserialize;
use url::Url;
use wslink_core::error::{Result, WsLinkError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientFile {
    pub version: u32,

    pub client: ClientConfig,
}

impl ClientFile {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WsLinkError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.client.validate()?;   // Verify the scope of value

        Ok(())
    }
}

/// Fixed delay between attempts, or doubling up to `max_reconnect_interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

/// What the outbound queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOverflow {
    #[default]
    DropOldest,
    RejectNew,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub endpoint: String,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_max_reconnect_interval_ms")]
    pub max_reconnect_interval_ms: u64,

    #[serde(default)]
    pub backoff: Backoff,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_max_message_size_bytes")]
    pub max_message_size_bytes: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub queue_overflow: QueueOverflow,

    #[serde(default = "default_token_param")]
    pub token_param: String,

    #[serde(default)]
    pub debug_logging: bool,
}

impl ClientConfig {
    /// Config with every default applied.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_interval_ms: default_max_reconnect_interval_ms(),
            backoff: Backoff::default(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_message_size_bytes: default_max_message_size_bytes(),
            queue_capacity: default_queue_capacity(),
            queue_overflow: QueueOverflow::default(),
            token_param: default_token_param(),
            debug_logging: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| WsLinkError::Config(format!("client.endpoint is not a valid url: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(WsLinkError::Config(
                "client.endpoint must use the ws or wss scheme".into(),
            ));
        }
        if !(1000..=300_000).contains(&self.heartbeat_interval_ms) {
            return Err(WsLinkError::Config(
                "client.heartbeat_interval_ms must be between 1000 and 300000".into(),
            ));
        }
        if !(10..=600_000).contains(&self.reconnect_interval_ms) {
            return Err(WsLinkError::Config(
                "client.reconnect_interval_ms must be between 10 and 600000".into(),
            ));
        }
        if self.max_reconnect_interval_ms < self.reconnect_interval_ms {
            return Err(WsLinkError::Config(
                "client.max_reconnect_interval_ms must not be less than reconnect_interval_ms"
                    .into(),
            ));
        }
        if !(64..=MAX_MESSAGE_SIZE_CEILING).contains(&self.max_message_size_bytes) {
            return Err(WsLinkError::Config(format!(
                "client.max_message_size_bytes must be between 64 and {MAX_MESSAGE_SIZE_CEILING}"
            )));
        }
        if self.queue_capacity == 0 {
            return Err(WsLinkError::Config(
                "client.queue_capacity must be at least 1".into(),
            ));
        }
        if self.token_param.is_empty() {
            return Err(WsLinkError::Config(
                "client.token_param must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

const MAX_MESSAGE_SIZE_CEILING: usize = 64 * 1024 * 1024;

fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_reconnect_interval_ms() -> u64 {
    3000
}
fn default_max_reconnect_interval_ms() -> u64 {
    30000
}
fn default_heartbeat_interval_ms() -> u64 {
    30000
}
fn default_max_message_size_bytes() -> usize {
    1024 * 1024
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_token_param() -> String {
    "token".into()
}
