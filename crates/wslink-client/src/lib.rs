//! wsLink client library entry.
//!
//! This crate keeps one persistent connection to the remote service alive:
//! the connection state machine, heartbeat, reconnection scheduler, outbound
//! queue, and inbound dispatcher all run inside a single driver task behind
//! the cloneable [`Client`] handle. The transport is a seam ([`Connector`]),
//! with a WebSocket implementation for real use and an in-memory one for
//! tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied outside tests. Timer,
//! parsing, and transport failures are logged and contained; only an awaited
//! [`ConnectHandle`] reports failure to the caller.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod heartbeat;
pub mod obs;
pub mod queue;
pub mod reconnect;
pub mod transport;

pub use auth::{CredentialProvider, StaticToken};
pub use client::{Client, ClientEvent, ConnectHandle, ConnectionState, Delivery, SessionContext};
pub use config::ClientConfig;
pub use transport::{Connector, MemoryConnector, WsConnector};
