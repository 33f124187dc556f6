//! Envelope codec (UTF-8 JSON text frames).
//!
//! - `encode` / `encode_checked`: Envelope => JSON text, the latter rejecting
//!   anything larger than the configured byte limit before it is transmitted.
//! - `decode`: JSON text => Envelope. `data` is kept as `RawValue` until the
//!   `message_type` is known. Only `VoiceData` needs a fixed shape; every
//!   other kind is taken as whatever JSON the service sent. Unknown envelope
//!   fields are ignored, and a timestamp that is missing or unreadable falls
//!   back to the time of receipt.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::error::{Result, WsLinkError};
use crate::protocol::envelope::{Envelope, MessageType, Payload};

#[derive(Serialize)]
struct WireOut<'a> {
    message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    data: Value,
    timestamp: String,
}

#[derive(Deserialize)]
struct WireIn {
    message_type: MessageType,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    data: Option<Box<RawValue>>,
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Offset-less timestamps are read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Serialize an envelope into its text-frame form.
pub fn encode(env: &Envelope) -> Result<String> {
    let wire = WireOut {
        message_type: env.message_type(),
        session_id: env.session_id.as_deref(),
        user_id: env.user_id.as_deref(),
        data: payload_data(&env.payload)?,
        timestamp: env.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    serde_json::to_string(&wire)
        .map_err(|e| WsLinkError::Internal(format!("envelope encode failed: {e}")))
}

/// Serialize and enforce `max_bytes` on the serialized size.
pub fn encode_checked(env: &Envelope, max_bytes: usize) -> Result<String> {
    let text = encode(env)?;
    if text.len() > max_bytes {
        return Err(WsLinkError::PayloadTooLarge {
            size: text.len(),
            max: max_bytes,
        });
    }
    Ok(text)
}

/// Parse a text frame into an envelope.
pub fn decode(text: &str) -> Result<Envelope> {
    let wire: WireIn = serde_json::from_str(text)
        .map_err(|e| WsLinkError::Protocol(format!("invalid envelope json: {e}")))?;

    let ty = wire.message_type;
    let raw = wire.data.as_deref();
    let payload = match ty {
        MessageType::Chat => Payload::Chat(parse_loose(raw, ty)?),
        MessageType::VoiceData => Payload::VoiceData(parse_data(raw, ty)?),
        MessageType::StatusUpdate => Payload::StatusUpdate(parse_loose(raw, ty)?),
        MessageType::Error => Payload::Error(parse_loose(raw, ty)?),
        // control frames carry no meaningful data
        MessageType::Ping => Payload::Ping,
        MessageType::Pong => Payload::Pong,
    };

    Ok(Envelope {
        payload,
        session_id: wire.session_id,
        user_id: wire.user_id,
        timestamp: parse_timestamp(wire.timestamp.as_ref()),
    })
}

fn parse_timestamp(raw: Option<&Value>) -> DateTime<Utc> {
    let Some(text) = raw.and_then(Value::as_str) else {
        return Utc::now();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return ts.with_timezone(&Utc);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now)
}

fn payload_data(payload: &Payload) -> Result<Value> {
    let value = match payload {
        Payload::Chat(c) => serde_json::to_value(c),
        Payload::VoiceData(v) => serde_json::to_value(v),
        Payload::StatusUpdate(s) => serde_json::to_value(s),
        Payload::Error(e) => serde_json::to_value(e),
        Payload::Ping | Payload::Pong => Ok(Value::Object(Map::new())),
    };
    value.map_err(|e| WsLinkError::Internal(format!("payload encode failed: {e}")))
}

/// Missing data reads as `null`; anything present is accepted as-is.
fn parse_loose<T: DeserializeOwned>(raw: Option<&RawValue>, ty: MessageType) -> Result<T> {
    let text = raw.map_or("null", RawValue::get);
    serde_json::from_str(text)
        .map_err(|e| WsLinkError::Protocol(format!("invalid {} data: {e}", ty.as_str())))
}

fn parse_data<T: DeserializeOwned>(raw: Option<&RawValue>, ty: MessageType) -> Result<T> {
    let raw = raw.ok_or_else(|| {
        WsLinkError::Protocol(format!("{} envelope missing data", ty.as_str()))
    })?;
    serde_json::from_str(raw.get())
        .map_err(|e| WsLinkError::Protocol(format!("invalid {} data: {e}", ty.as_str())))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use chrono::TimeZone;

    use super::*;
    use crate::protocol::envelope::ChatData;

    fn fixed(env: Envelope) -> Envelope {
        Envelope {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ..env
        }
    }

    #[test]
    fn chat_wire_shape() {
        let env = fixed(Envelope::chat("hello").with_session("s-1"));
        let text = encode(&env).unwrap();
        assert_eq!(
            text,
            r#"{"message_type":"Chat","session_id":"s-1","data":"hello","timestamp":"2024-05-01T12:00:00.000Z"}"#
        );
    }

    #[test]
    fn ping_carries_empty_object() {
        let text = encode(&fixed(Envelope::ping())).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["message_type"], "Ping");
        assert_eq!(v["data"], serde_json::json!({}));
        assert!(v.get("session_id").is_none());
    }

    #[test]
    fn size_limit_is_inclusive() {
        let env = fixed(Envelope::chat("x"));
        let len = encode(&env).unwrap().len();
        assert!(encode_checked(&env, len).is_ok());
        let err = encode_checked(&env, len - 1).unwrap_err();
        assert_eq!(err, WsLinkError::PayloadTooLarge { size: len, max: len - 1 });
    }

    #[test]
    fn decode_structured_chat_reply() {
        let env = decode(
            r#"{"message_type":"Chat","data":{"response":"ok","confidence":0.9},"timestamp":"2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        match env.payload {
            Payload::Chat(ChatData::Structured(map)) => assert_eq!(map["response"], "ok"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode("not-json").unwrap_err();
        assert_eq!(err.kind().as_str(), "PROTOCOL");

        let err = decode(r#"{"message_type":"Shout","data":1}"#).unwrap_err();
        assert_eq!(err.kind().as_str(), "PROTOCOL");
    }

    #[test]
    fn only_voice_requires_data() {
        let err = decode(r#"{"message_type":"VoiceData"}"#).unwrap_err();
        assert!(err.to_string().contains("missing data"));
        assert!(decode(r#"{"message_type":"Pong"}"#).is_ok());

        let env = decode(r#"{"message_type":"Chat"}"#).unwrap();
        assert_eq!(env.payload, Payload::Chat(ChatData::Other(Value::Null)));
    }

    #[test]
    fn pass_through_data_is_kept_verbatim() {
        let env = decode(r#"{"message_type":"Error","data":{"code":500,"message":"boom"}}"#).unwrap();
        match &env.payload {
            Payload::Error(err) => assert_eq!(err.0, serde_json::json!({"code":500,"message":"boom"})),
            other => panic!("unexpected payload: {other:?}"),
        }

        let env = decode(r#"{"message_type":"Chat","data":[1,2,3]}"#).unwrap();
        assert_eq!(
            env.payload,
            Payload::Chat(ChatData::Other(serde_json::json!([1, 2, 3])))
        );
    }

    #[test]
    fn unknown_envelope_fields_are_ignored() {
        let env = decode(r#"{"message_type":"Chat","id":7,"data":"hi"}"#).unwrap();
        assert_eq!(env.payload, Payload::Chat(ChatData::Text("hi".into())));
    }

    #[test]
    fn timestamp_without_offset_is_utc() {
        let env = decode(r#"{"message_type":"Ping","timestamp":"2024-05-01T12:00:00"}"#).unwrap();
        assert_eq!(env.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let env = decode(r#"{"message_type":"Ping","timestamp":"2024-05-01T12:00:00.250"}"#).unwrap();
        assert_eq!(env.timestamp.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn unreadable_timestamp_falls_back_to_receipt_time() {
        let before = Utc::now();
        let env = decode(r#"{"message_type":"Ping","timestamp":"yesterday"}"#).unwrap();
        assert!(env.timestamp >= before);
        let env = decode(r#"{"message_type":"Ping","timestamp":1714564800}"#).unwrap();
        assert!(env.timestamp >= before);
    }
}
