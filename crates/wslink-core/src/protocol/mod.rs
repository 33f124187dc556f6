//! Protocol modules (envelope + codec).
//!
//! - `envelope`: the typed message model. `data` is a tagged union keyed by
//!   `message_type` rather than an untyped blob.
//! - `codec`: JSON text-frame encoding/decoding with the outbound size check.
//!
//! All parsers are panic-free: malformed input is reported as
//! `WsLinkError::Protocol` instead of panicking.

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, encode_checked};
pub use envelope::{
    ChatData, Envelope, ErrorData, MessageType, Payload, StatusData, VoiceChunk,
    DEFAULT_AUDIO_FORMAT,
};
