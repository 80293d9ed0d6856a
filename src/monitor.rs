use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::scheduler::Retired;
use crate::tween::{AnimationId, PlaybackState};

/// Metrics snapshot returned by the facade.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMetrics {
    pub active_count: usize,
    pub total_created: u64,
    pub average_frame_time: Duration,
    pub error_count: u64,
}

/// Running stats for one named operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpStats {
    pub calls: u64,
    pub last: Duration,
    pub average: Duration,
}

/// Tracks frame and operation timings, and retains a bounded history of
/// retired animations so late state queries still resolve.
pub(crate) struct PerformanceMonitor {
    frame_times: Vec<Duration>,
    target_frame_time: Duration,
    warn_threshold: Duration,
    ops: HashMap<String, OpStats>,
    retired: HashMap<AnimationId, Retired>,
    total_created: u64,
    error_count: u64,
    sweep_interval: Duration,
    retired_max_age: Duration,
    last_sweep: Option<Instant>,
}

impl PerformanceMonitor {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        let target_frame_time = config.frame_duration();
        Self {
            frame_times: Vec::with_capacity(60),
            target_frame_time,
            warn_threshold: target_frame_time.mul_f32(config.frame_warn_fraction.max(0.0)),
            ops: HashMap::new(),
            retired: HashMap::new(),
            total_created: 0,
            error_count: 0,
            sweep_interval: config.sweep_interval(),
            retired_max_age: config.retired_max_age(),
            last_sweep: None,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_time: Duration) {
        self.frame_times.push(frame_time);
        if self.frame_times.len() > 60 {
            self.frame_times.remove(0);
        }
    }

    /// Record one call of a named operation; warns when a single call eats
    /// most of the frame budget.
    pub(crate) fn record_op(&mut self, name: &str, duration: Duration) {
        let stats = self.ops.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.last = duration;
        stats.average = Duration::from_secs_f64(
            (stats.average.as_secs_f64() * (stats.calls - 1) as f64 + duration.as_secs_f64())
                / stats.calls as f64,
        );

        if duration > self.warn_threshold {
            warn!(
                "⚠️  Operation '{}' took {:?} (budget {:?})",
                name, duration, self.target_frame_time
            );
        }
    }

    pub(crate) fn op_stats(&self, name: &str) -> Option<OpStats> {
        self.ops.get(name).copied()
    }

    pub(crate) fn created(&mut self) {
        self.total_created += 1;
    }

    pub(crate) fn add_errors(&mut self, count: u64) {
        self.error_count += count;
    }

    pub(crate) fn retire(&mut self, entry: Retired) {
        self.retired.insert(entry.id, entry);
    }

    pub(crate) fn retired_state(&self, id: AnimationId) -> Option<PlaybackState> {
        self.retired.get(&id).map(|entry| entry.state)
    }

    pub(crate) fn retired_subscribe(&self, id: AnimationId) -> Option<watch::Receiver<PlaybackState>> {
        self.retired.get(&id).map(|entry| entry.state_tx.subscribe())
    }

    /// Drop retired entries past the cutoff age. Runs at most once per sweep
    /// interval; `now` comes from the engine clock so tests can drive it.
    pub(crate) fn maybe_sweep(&mut self, now: Instant) {
        match self.last_sweep {
            None => {
                self.last_sweep = Some(now);
                return;
            }
            Some(last) if now.saturating_duration_since(last) < self.sweep_interval => return,
            Some(_) => {}
        }
        self.last_sweep = Some(now);

        let cutoff = self.retired_max_age;
        let before = self.retired.len();
        self.retired
            .retain(|_, entry| now.saturating_duration_since(entry.at) < cutoff);
        let dropped = before - self.retired.len();
        if dropped > 0 {
            debug!("🧹 Swept {} retired animation entries", dropped);
        }
    }

    pub(crate) fn average_frame_time(&self) -> Duration {
        if self.frame_times.is_empty() {
            return self.target_frame_time;
        }
        self.frame_times.iter().sum::<Duration>() / self.frame_times.len() as u32
    }

    pub(crate) fn snapshot(&self, active_count: usize) -> EngineMetrics {
        EngineMetrics {
            active_count,
            total_created: self.total_created,
            average_frame_time: self.average_frame_time(),
            error_count: self.error_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    fn retired(id: u64, at: Instant) -> Retired {
        let (state_tx, _) = watch::channel(PlaybackState::Completed);
        Retired {
            id: AnimationId(id),
            state: PlaybackState::Completed,
            at,
            state_tx,
        }
    }

    #[test]
    fn test_running_average() {
        let mut monitor = PerformanceMonitor::new(&EngineConfig::default());
        monitor.record_op("tick", Duration::from_millis(2));
        monitor.record_op("tick", Duration::from_millis(4));

        let stats = monitor.op_stats("tick").unwrap();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.last, Duration::from_millis(4));
        assert_eq!(stats.average, Duration::from_millis(3));
    }

    #[test]
    fn test_frame_window_is_bounded() {
        let mut monitor = PerformanceMonitor::new(&EngineConfig::default());
        for _ in 0..100 {
            monitor.record_frame(Duration::from_millis(16));
        }
        assert_eq!(monitor.frame_times.len(), 60);
        assert_eq!(monitor.average_frame_time(), Duration::from_millis(16));
    }

    #[test]
    fn test_sweep_drops_old_entries_only() {
        let mut config = EngineConfig::default();
        config.sweep_interval_secs = 10;
        config.retired_max_age_secs = 30;
        let mut monitor = PerformanceMonitor::new(&config);

        let start = Instant::now();
        monitor.retire(retired(1, start));
        monitor.maybe_sweep(start); // arms the sweep timer

        let later = start + Duration::from_secs(15);
        monitor.retire(retired(2, later));
        monitor.maybe_sweep(later);
        // Entry 1 is only 15s old, nothing dropped yet
        assert!(monitor.retired_state(AnimationId(1)).is_some());

        let much_later = start + Duration::from_secs(40);
        monitor.maybe_sweep(much_later);
        assert!(monitor.retired_state(AnimationId(1)).is_none());
        assert!(monitor.retired_state(AnimationId(2)).is_some());
    }

    #[test]
    fn test_sweep_respects_interval() {
        let mut config = EngineConfig::default();
        config.sweep_interval_secs = 60;
        config.retired_max_age_secs = 1;
        let mut monitor = PerformanceMonitor::new(&config);

        let start = Instant::now();
        monitor.maybe_sweep(start);
        monitor.retire(retired(1, start));

        // Old enough to drop, but the interval has not elapsed
        monitor.maybe_sweep(start + Duration::from_secs(30));
        assert!(monitor.retired_state(AnimationId(1)).is_some());
    }
}
