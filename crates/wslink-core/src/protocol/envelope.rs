//! Envelope model (Text frame).
//!
//! Wire shape:
//! `{"message_type": "...", "session_id"?: "...", "user_id"?: "...", "data": ..., "timestamp": "<ISO-8601>"}`
//!
//! In memory the `message_type` tag and `data` are folded into one [`Payload`]
//! so each message kind carries its own concrete shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Result, WsLinkError};

/// Audio format stamped on voice chunks when the caller does not name one.
pub const DEFAULT_AUDIO_FORMAT: &str = "webm";

/// Message type tag (field name is `message_type` in JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Chat,
    VoiceData,
    StatusUpdate,
    Error,
    Ping,
    Pong,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Chat => "Chat",
            MessageType::VoiceData => "VoiceData",
            MessageType::StatusUpdate => "StatusUpdate",
            MessageType::Error => "Error",
            MessageType::Ping => "Ping",
            MessageType::Pong => "Pong",
        }
    }

    /// Ping/Pong are handled by the connection layer and never reach the application.
    pub fn is_control(self) -> bool {
        matches!(self, MessageType::Ping | MessageType::Pong)
    }
}

/// `Chat` data: plain text outbound, usually a structured reply inbound.
/// Any other JSON the service sends is kept untouched in `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatData {
    Text(String),
    Structured(Map<String, Value>),
    Other(Value),
}

impl ChatData {
    /// Text content, if this is a plain text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChatData::Text(s) => Some(s),
            ChatData::Structured(_) | ChatData::Other(_) => None,
        }
    }
}

/// `VoiceData` data: base64 audio plus its container/codec name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChunk {
    pub audio: String,
    pub format: String,
}

impl VoiceChunk {
    /// Encode raw audio bytes.
    pub fn from_audio(bytes: &[u8], format: impl Into<String>) -> Self {
        Self {
            audio: BASE64.encode(bytes),
            format: format.into(),
        }
    }

    /// Decode the base64 audio back into bytes.
    pub fn decode_audio(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.audio.as_bytes())
            .map_err(|e| WsLinkError::Protocol(format!("invalid base64 audio: {e}")))
    }
}

/// `StatusUpdate` data, kept exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusData(pub Value);

impl StatusData {
    pub fn new(status: impl Into<String>) -> Self {
        Self(json!({ "status": status.into() }))
    }

    /// Bare string data, or the `status` field of an object.
    pub fn status(&self) -> Option<&str> {
        match &self.0 {
            Value::String(s) => Some(s),
            other => other.get("status").and_then(Value::as_str),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// `Error` data sent by the remote service. Forwarded, never interpreted;
/// the accessors only read what happens to be there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorData(pub Value);

impl ErrorData {
    /// `code` as text, whether the service sent a string or a number.
    pub fn code(&self) -> Option<String> {
        match self.0.get("code")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Bare string data, or the `message` field of an object.
    pub fn message(&self) -> Option<&str> {
        match &self.0 {
            Value::String(s) => Some(s),
            other => other.get("message").and_then(Value::as_str),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Payload union keyed by message type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Chat(ChatData),
    VoiceData(VoiceChunk),
    StatusUpdate(StatusData),
    Error(ErrorData),
    Ping,
    Pong,
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Chat(_) => MessageType::Chat,
            Payload::VoiceData(_) => MessageType::VoiceData,
            Payload::StatusUpdate(_) => MessageType::StatusUpdate,
            Payload::Error(_) => MessageType::Error,
            Payload::Ping => MessageType::Ping,
            Payload::Pong => MessageType::Pong,
        }
    }
}

/// One message exchanged with the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub payload: Payload,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// New envelope stamped with the current time and no correlation ids.
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            session_id: None,
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn chat(text: impl Into<String>) -> Self {
        Self::new(Payload::Chat(ChatData::Text(text.into())))
    }

    pub fn voice(audio: &[u8], format: impl Into<String>) -> Self {
        Self::new(Payload::VoiceData(VoiceChunk::from_audio(audio, format)))
    }

    pub fn ping() -> Self {
        Self::new(Payload::Ping)
    }

    pub fn pong() -> Self {
        Self::new(Payload::Pong)
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Re-stamp the timestamp with the current time.
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}
