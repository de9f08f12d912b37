//! Tick-time gates for work that runs below frame rate

use std::time::Duration;

/// Fires once every `interval` of accumulated tick time
///
/// Time is whatever the caller feeds in, never the wall clock, so a paused
/// or sped-up host stays consistent.
#[derive(Debug, Clone)]
pub struct TimerGate {
    interval: f32,
    elapsed: f32,
}

impl TimerGate {
    /// Gate that first fires after one full interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.as_secs_f32(),
            elapsed: 0.0,
        }
    }

    /// Gate that fires on the first tick
    pub fn ready(interval: Duration) -> Self {
        let interval = interval.as_secs_f32();
        Self {
            interval,
            elapsed: interval,
        }
    }

    /// Add `dt` seconds; true when the interval has been reached
    ///
    /// Fires at most once per call; leftover time beyond one interval is
    /// dropped so a long stall does not cause a burst.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed += dt.max(0.0);
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f32(self.interval)
    }
}
