//! Top-level facade crate for wsLink.
//!
//! Re-exports the wire contracts and the connection client so users can depend on a single crate.

pub mod core {
    pub use wslink_core::*;
}

pub mod client {
    pub use wslink_client::*;
}
