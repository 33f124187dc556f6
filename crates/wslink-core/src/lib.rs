//! wsLink core: transport-agnostic wire contracts and the shared error type.
//!
//! This crate defines the envelope exchanged with the remote service, the
//! typed payload union keyed by `message_type`, and the codec that enforces
//! the outbound size limit. It carries no transport or runtime dependencies
//! so it can be reused by clients, servers, and test tooling alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed input
//! surfaces as `WsLinkError::Protocol` so a bad frame never tears down the
//! connection that carried it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, Result, WsLinkError};
