//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use wslink_core::error::{Result, WsLinkError};

pub use schema::{Backoff, ClientConfig, ClientFile, QueueOverflow};

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| WsLinkError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let file: ClientFile = serde_yaml::from_str(s)
        .map_err(|e| WsLinkError::Config(format!("invalid yaml: {e}")))?;
    file.validate()?;
    Ok(file.client)
}
