//! wsLink demo client.
//!
//! Usage: `wslink-client [config.yaml]` (default `wslink.yaml`).
//! Every stdin line is sent as a `Chat` envelope; events are printed as they
//! arrive. A bearer token is read from `WSLINK_TOKEN` when set.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, EnvFilter};

use wslink_client::{config, Client, ClientEvent, StaticToken, WsConnector};
use wslink_core::protocol::Payload;

#[tokio::main]
async fn main() -> wslink_core::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wslink.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    tracing::info!(endpoint = %cfg.endpoint, "wslink-client starting");

    let client = match std::env::var("WSLINK_TOKEN") {
        Ok(token) if !token.is_empty() => {
            Client::with_credentials(cfg, WsConnector::new(), StaticToken(token))?
        }
        _ => Client::new(cfg, WsConnector::new())?,
    };

    let mut events = client.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Err(e) = client.connect(None, None).await {
        // the scheduler keeps retrying; lines typed meanwhile are queued
        tracing::warn!(error = %e, "initial connect failed");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match client.send_chat(line, None).await {
                    Ok(delivery) if !delivery.is_sent() => println!("(queued, {} waiting)", client.queued()),
                    Ok(_) => {}
                    Err(e) => eprintln!("send rejected: {e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    tracing::debug!(metrics = %client.render_metrics(), "final metrics");
    Ok(())
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Message(env) => match &env.payload {
            Payload::Chat(chat) => match chat.as_text() {
                Some(text) => println!("< {text}"),
                None => println!("< {chat:?}"),
            },
            other => println!("< [{}] {other:?}", env.message_type().as_str()),
        },
        ClientEvent::StateChange { from, to } => println!("* {from} -> {to}"),
        ClientEvent::ReconnectAttempt { attempt, max } => {
            println!("* reconnecting ({attempt}/{max})")
        }
        ClientEvent::Close { code, reason } => println!("* closed ({code}) {reason}"),
        ClientEvent::Error { kind, message } => println!("! {} {message}", kind.as_str()),
        ClientEvent::Open => println!("* open"),
    }
}
