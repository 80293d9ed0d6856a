use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Injected time source for the scheduler.
///
/// Production uses [`SystemClock`]; tests drive a [`ManualClock`] so progress
/// math is deterministic and independent of wall-clock timing.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Controllable clock: a fixed base instant plus an offset that only moves
/// when a test advances it.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *offset += delta;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pluggable "request next tick" primitive for the production driver loop.
#[async_trait]
pub trait TickSource: Send {
    /// Resolve when the next frame should be processed.
    async fn wait_frame(&mut self);
}

/// Frame-rate ticker backed by `tokio::time::interval`.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(frame: Duration) -> Self {
        let mut interval = tokio::time::interval(frame.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    async fn wait_frame(&mut self) {
        self.interval.tick().await;
    }
}
