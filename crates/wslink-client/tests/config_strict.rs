#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use wslink_client::config::{self, Backoff, QueueOverflow};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
client:
  endpoint: "ws://localhost:8080/ws"
  heartbeat_interval: 30000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn deny_unknown_top_level_section() {
    let bad = r#"
version: 1
client:
  endpoint: "ws://localhost:8080/ws"
server:
  listen: "0.0.0.0:8080"
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
client:
  endpoint: "ws://localhost:8080/ws"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.endpoint, "ws://localhost:8080/ws");
    assert_eq!(cfg.max_reconnect_attempts, 5);
    assert_eq!(cfg.reconnect_interval_ms, 3000);
    assert_eq!(cfg.heartbeat_interval_ms, 30_000);
    assert_eq!(cfg.max_message_size_bytes, 1024 * 1024);
    assert_eq!(cfg.queue_capacity, 1000);
    assert_eq!(cfg.queue_overflow, QueueOverflow::DropOldest);
    assert_eq!(cfg.backoff, Backoff::Fixed);
    assert_eq!(cfg.token_param, "token");
    assert!(!cfg.debug_logging);
}

#[test]
fn full_config_round_trips_values() {
    let ok = r#"
version: 1
client:
  endpoint: "wss://api.example.com/ws"
  max_reconnect_attempts: 10
  reconnect_interval_ms: 500
  max_reconnect_interval_ms: 8000
  backoff: exponential
  heartbeat_interval_ms: 15000
  max_message_size_bytes: 4096
  queue_capacity: 50
  queue_overflow: reject_new
  token_param: "access_token"
  debug_logging: true
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.backoff, Backoff::Exponential);
    assert_eq!(cfg.queue_overflow, QueueOverflow::RejectNew);
    assert_eq!(cfg.reconnect_interval().as_millis(), 500);
    assert_eq!(cfg.max_reconnect_interval().as_millis(), 8000);
    assert_eq!(cfg.heartbeat_interval().as_secs(), 15);
    assert_eq!(cfg.token_param, "access_token");
    assert!(cfg.debug_logging);
}

#[test]
fn reject_non_websocket_scheme() {
    let bad = r#"
version: 1
client:
  endpoint: "http://localhost:8080/ws"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("ws or wss"));
}

#[test]
fn reject_out_of_range_values() {
    for (field, value) in [
        ("heartbeat_interval_ms", "999"),
        ("heartbeat_interval_ms", "300001"),
        ("reconnect_interval_ms", "5"),
        ("max_message_size_bytes", "10"),
        ("queue_capacity", "0"),
    ] {
        let bad = format!(
            "version: 1\nclient:\n  endpoint: \"ws://localhost/ws\"\n  {field}: {value}\n"
        );
        let err = config::load_from_str(&bad).expect_err(field);
        assert!(err.to_string().contains(field), "{field}: {err}");
    }
}

#[test]
fn reject_cap_below_base_interval() {
    let bad = r#"
version: 1
client:
  endpoint: "ws://localhost/ws"
  reconnect_interval_ms: 5000
  max_reconnect_interval_ms: 1000
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn reject_unsupported_version() {
    let bad = r#"
version: 2
client:
  endpoint: "ws://localhost/ws"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("version"));
}

#[test]
fn missing_file_is_config_error() {
    let err = config::load_from_file("/nonexistent/wslink.yaml").expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}
