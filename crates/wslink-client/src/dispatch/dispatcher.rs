use wslink_core::error::Result;
use wslink_core::protocol::{self, Envelope, Payload};

/// What the driver should do with one decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Answer on the same link, without involving the application.
    Reply(Envelope),
    /// Protocol-internal acknowledgement (heartbeat pong).
    Acknowledged,
    /// Hand to the application untouched.
    Deliver(Envelope),
}

/// Classifies inbound text frames. Ping/Pong stay inside the connection
/// layer; every other message type is forwarded verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Decode and classify. A decode failure affects only this frame.
    pub fn route(&self, text: &str) -> Result<Route> {
        let env = protocol::decode(text)?;
        if !env.message_type().is_control() {
            return Ok(Route::Deliver(env));
        }
        Ok(match env.payload {
            Payload::Ping => Route::Reply(Envelope::pong()),
            _ => Route::Acknowledged,
        })
    }
}
