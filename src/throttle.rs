//! Per-session turn pacing
//!
//! A turn that arrives sooner than the minimum interval after the previous
//! turn's processing start is delayed, never rejected.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

/// Rate-limit clock for one session
#[derive(Debug, Clone)]
pub struct TurnThrottle {
    /// Minimum gap between two processing starts
    min_interval: Duration,
    /// When the previous turn started processing
    last_start: Option<Instant>,
}

impl TurnThrottle {
    /// Create a new throttle
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: None,
        }
    }

    /// When the previous turn started processing
    pub fn last_start(&self) -> Option<Instant> {
        self.last_start
    }

    /// Get time until the next turn may start
    pub fn delay_for(&self, now: Instant) -> Duration {
        match self.last_start {
            Some(last) => self.min_interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Wait until a turn may start, then record its start
    pub async fn wait(&mut self) -> Instant {
        let delay = self.delay_for(Instant::now());
        if !delay.is_zero() {
            debug!("Turn arrived early, delaying processing by {:?}", delay);
            sleep(delay).await;
        }
        let start = Instant::now();
        self.last_start = Some(start);
        start
    }

    /// Forget the previous turn
    pub fn reset(&mut self) {
        self.last_start = None;
    }
}
