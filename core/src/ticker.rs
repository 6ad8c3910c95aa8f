//! Fixed-period timers polled from a shell's event loop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    last: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether the period has elapsed at `now`. The first check always fires.
    ///
    /// Firing rearms from `now`, so a stalled loop skips missed periods
    /// instead of replaying them.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Make the next check fire regardless of elapsed time.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
