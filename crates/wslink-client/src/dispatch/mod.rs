//! Dispatcher module exports.
//!
//! Re-exports the inbound dispatcher and its routing decision so the driver
//! can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, Route};
