//! Client-side counters and gauges.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::client::ConnectionState;

#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, v: u64) {
        self.0.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        let _ = writeln!(out, "{} {}", name, self.get());
    }
}

#[derive(Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, v: u64) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        let _ = writeln!(out, "{} {}", name, self.get());
    }
}

/// Point-in-time copy of [`ClientMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_malformed: u64,
    pub messages_queued: u64,
    pub messages_evicted: u64,
    pub messages_rejected: u64,
    pub reconnect_attempts_total: u64,
    pub opens: u64,
    pub pongs_received: u64,
    pub queue_depth: u64,
    pub reconnect_attempts: u64,
    pub last_pong_delay_ms: u64,
    pub state: ConnectionState,
}

#[derive(Default)]
pub struct ClientMetrics {
    pub frames_sent: Counter,
    pub frames_received: Counter,
    /// Inbound text frames that failed to decode.
    pub frames_malformed: Counter,
    pub messages_queued: Counter,
    /// Dropped from the head of a full queue.
    pub messages_evicted: Counter,
    /// Refused by the size limit or a full `reject_new` queue.
    pub messages_rejected: Counter,
    pub reconnect_attempts_total: Counter,
    pub opens: Counter,
    pub pongs_received: Counter,
    pub queue_depth: Gauge,
    /// Attempts since the last successful open.
    pub reconnect_attempts: Gauge,
    /// Latest heartbeat ping to pong delay.
    pub last_pong_delay_ms: Gauge,
    state: AtomicU8,
}

impl ClientMetrics {
    pub fn set_state(&self, state: ConnectionState) {
        let idx = ConnectionState::ALL
            .iter()
            .position(|s| *s == state)
            .unwrap_or(0);
        self.state.store(idx as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> ConnectionState {
        let idx = self.state.load(Ordering::Relaxed) as usize;
        ConnectionState::ALL.get(idx).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.get(),
            frames_received: self.frames_received.get(),
            frames_malformed: self.frames_malformed.get(),
            messages_queued: self.messages_queued.get(),
            messages_evicted: self.messages_evicted.get(),
            messages_rejected: self.messages_rejected.get(),
            reconnect_attempts_total: self.reconnect_attempts_total.get(),
            opens: self.opens.get(),
            pongs_received: self.pongs_received.get(),
            queue_depth: self.queue_depth.get(),
            reconnect_attempts: self.reconnect_attempts.get(),
            last_pong_delay_ms: self.last_pong_delay_ms.get(),
            state: self.state(),
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.frames_sent.render("wslink_frames_sent_total", &mut out);
        self.frames_received.render("wslink_frames_received_total", &mut out);
        self.frames_malformed.render("wslink_frames_malformed_total", &mut out);
        self.messages_queued.render("wslink_messages_queued_total", &mut out);
        self.messages_evicted.render("wslink_messages_evicted_total", &mut out);
        self.messages_rejected.render("wslink_messages_rejected_total", &mut out);
        self.reconnect_attempts_total
            .render("wslink_reconnect_attempts_total", &mut out);
        self.opens.render("wslink_opens_total", &mut out);
        self.pongs_received.render("wslink_pongs_received_total", &mut out);
        self.queue_depth.render("wslink_queue_depth", &mut out);
        self.reconnect_attempts.render("wslink_reconnect_attempts", &mut out);
        self.last_pong_delay_ms
            .render("wslink_last_pong_delay_ms", &mut out);

        let current = self.state();
        let _ = writeln!(out, "# TYPE wslink_connection_state gauge");
        for s in ConnectionState::ALL {
            let _ = writeln!(
                out,
                "wslink_connection_state{{state=\"{}\"}} {}",
                s,
                u8::from(s == current)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() {
        let m = ClientMetrics::default();
        m.frames_sent.inc();
        m.frames_sent.add(2);
        m.queue_depth.set(7);
        m.set_state(ConnectionState::Reconnecting);

        let snap = m.snapshot();
        assert_eq!(snap.frames_sent, 3);
        assert_eq!(snap.queue_depth, 7);
        assert_eq!(snap.state, ConnectionState::Reconnecting);
        assert_eq!(snap.opens, 0);
    }

    #[test]
    fn render_marks_current_state_only() {
        let m = ClientMetrics::default();
        m.set_state(ConnectionState::Connected);
        m.frames_received.add(4);

        let text = m.render();
        assert!(text.contains("# TYPE wslink_frames_received_total counter\nwslink_frames_received_total 4\n"));
        assert!(text.contains("wslink_connection_state{state=\"connected\"} 1"));
        assert!(text.contains("wslink_connection_state{state=\"disconnected\"} 0"));
        assert_eq!(text.matches("} 1\n").count(), 1);
    }
}
