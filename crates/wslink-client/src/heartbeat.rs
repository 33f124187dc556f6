//! Heartbeat monitor.
//!
//! Ticks every `heartbeat_interval_ms` while running; the driver turns each
//! tick into a `Ping` envelope. Stopping drops the interval, so a stopped
//! monitor has no timer left to fire.
//!
//! Pongs are not matched against outstanding pings; a silent half-open link
//! is left for the transport to report. The delay from the latest ping to a
//! pong is handed back for metrics only.

use std::future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub struct Heartbeat {
    period: Duration,
    ticker: Option<Interval>,
    last_ping: Option<Instant>,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
            last_ping: None,
        }
    }

    /// (Re)start; the first tick is one full period from now.
    pub fn start(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    pub fn stop(&mut self) {
        self.ticker = None;
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Resolves on the next tick; never resolves while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
                self.last_ping = Some(Instant::now());
            }
            None => future::pending().await,
        }
    }

    /// Time since the latest ping, if one was sent.
    pub fn acknowledge(&self) -> Option<Duration> {
        self.last_ping.map(|ping| ping.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn ticks_on_fixed_period() {
        let mut hb = Heartbeat::new(Duration::from_secs(30));
        let start = Instant::now();
        hb.start();
        hb.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(30));
        hb.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_monitor_never_ticks() {
        let mut hb = Heartbeat::new(Duration::from_secs(1));
        assert!(timeout(Duration::from_secs(10), hb.tick()).await.is_err());

        hb.start();
        assert!(hb.is_running());
        hb.stop();
        assert!(!hb.is_running());
        assert!(timeout(Duration::from_secs(10), hb.tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pong_delay_is_measured_from_last_ping() {
        let mut hb = Heartbeat::new(Duration::from_secs(1));
        assert_eq!(hb.acknowledge(), None);

        hb.start();
        hb.tick().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(hb.acknowledge(), Some(Duration::from_millis(40)));
    }
}
