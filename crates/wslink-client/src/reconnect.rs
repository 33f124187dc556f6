//! Reconnection scheduler.
//!
//! Decides if and when to retry after an unplanned close. The attempt budget
//! is `max_reconnect_attempts`; the counter only goes back to zero on a
//! successful open. The pending retry is a `Sleep` owned by the scheduler,
//! so cancelling it is dropping it.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

use crate::config::{Backoff, ClientConfig};

pub struct ReconnectScheduler {
    attempts: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    backoff: Backoff,
    pending: Option<Pin<Box<Sleep>>>,
}

impl ReconnectScheduler {
    pub fn new(cfg: &ClientConfig) -> Self {
        Self {
            attempts: 0,
            max_attempts: cfg.max_reconnect_attempts,
            base: cfg.reconnect_interval(),
            cap: cfg.max_reconnect_interval(),
            backoff: cfg.backoff,
            pending: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn should_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Delay before the given (1-based) attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base.saturating_mul(factor).min(self.cap)
            }
        }
    }

    /// Arm the next retry if the budget allows. Returns `(attempt, delay)`.
    pub fn schedule(&mut self) -> Option<(u32, Duration)> {
        if !self.should_retry() {
            return None;
        }
        self.attempts += 1;
        let delay = self.delay_for(self.attempts);
        self.pending = Some(Box::pin(sleep(delay)));
        Some((self.attempts, delay))
    }

    /// Drop the pending retry. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Resolves when the armed retry is due; never resolves when none is armed.
    pub async fn due(&mut self) {
        match self.pending.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.pending = None;
            }
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tokio::time::{timeout, Instant};

    fn cfg(max: u32, interval_ms: u64) -> ClientConfig {
        let mut cfg = ClientConfig::new("ws://localhost:8080/ws");
        cfg.max_reconnect_attempts = max;
        cfg.reconnect_interval_ms = interval_ms;
        cfg
    }

    #[tokio::test(start_paused = true)]
    async fn budget_is_bounded() {
        let mut s = ReconnectScheduler::new(&cfg(3, 100));
        assert_eq!(s.schedule(), Some((1, Duration::from_millis(100))));
        assert_eq!(s.schedule(), Some((2, Duration::from_millis(100))));
        assert_eq!(s.schedule(), Some((3, Duration::from_millis(100))));
        assert!(!s.should_retry());
        assert_eq!(s.schedule(), None);
        assert_eq!(s.attempts(), 3);

        s.reset();
        assert!(s.should_retry());
        assert_eq!(s.schedule().unwrap().0, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn due_fires_after_delay() {
        let mut s = ReconnectScheduler::new(&cfg(3, 250));
        let start = Instant::now();
        s.schedule();
        s.due().await;
        assert!(start.elapsed() >= Duration::from_millis(250));
        assert!(!s.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_retry_never_fires() {
        let mut s = ReconnectScheduler::new(&cfg(3, 100));
        s.schedule();
        assert!(s.cancel());
        assert!(!s.cancel());
        assert!(timeout(Duration::from_secs(5), s.due()).await.is_err());
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let mut c = cfg(10, 100);
        c.backoff = Backoff::Exponential;
        c.max_reconnect_interval_ms = 1000;
        let s = ReconnectScheduler::new(&c);
        assert_eq!(s.delay_for(1), Duration::from_millis(100));
        assert_eq!(s.delay_for(2), Duration::from_millis(200));
        assert_eq!(s.delay_for(4), Duration::from_millis(800));
        assert_eq!(s.delay_for(5), Duration::from_millis(1000));
        assert_eq!(s.delay_for(40), Duration::from_millis(1000));
    }
}
