use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::clock::{Clock, IntervalTicker, SystemClock, TickSource};
use crate::config::EngineConfig;
use crate::error::{default_error_sink, CallbackPhase, EngineError, ErrorSink};
use crate::monitor::{EngineMetrics, PerformanceMonitor};
use crate::properties::{PropertyKeyframe, PropertyValue};
use crate::scheduler::{ActiveItem, Scheduler};
use crate::target::SharedTarget;
use crate::timeline::{child_span, Timeline, TimelineBuilder};
use crate::tween::{AnimationId, AnimationOptions, IdAllocator, PlaybackState, Tween};

/// Whether the scheduler is asking for frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Active set is empty; no tick requested.
    Idle,
    /// At least one item is registered; a tick is requested every frame.
    Running,
}

/// The unified animation manager facade.
///
/// An explicit, constructible instance: multiple engines coexist and tests
/// isolate state by building their own. All mutation flows through facade
/// methods or [`tick`](Self::tick); the scheduler's registry is never touched
/// directly by callers.
pub struct AnimationEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    monitor: PerformanceMonitor,
    error_sink: ErrorSink,
    ids: IdAllocator,
    wake: Arc<Notify>,
    animations_enabled: bool,
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an engine against an injected clock; tests pass a
    /// [`ManualClock`](crate::clock::ManualClock) here.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let monitor = PerformanceMonitor::new(&config);
        let animations_enabled = config.animations_enabled;
        Self {
            config,
            clock,
            scheduler: Scheduler::default(),
            monitor,
            error_sink: default_error_sink(),
            ids: IdAllocator::default(),
            wake: Arc::new(Notify::new()),
            animations_enabled,
        }
    }

    /// Start animating `properties` of `target` toward the given end values.
    ///
    /// Returns `Ok(None)` without creating an animation when animations are
    /// globally disabled and the options don't force one; the target snaps
    /// to the end values and `on_complete` still fires exactly once.
    pub fn animate(
        &mut self,
        target: SharedTarget,
        properties: HashMap<String, PropertyValue>,
        duration: Duration,
        mut options: AnimationOptions,
    ) -> Result<Option<AnimationId>, EngineError> {
        let op_started = Instant::now();

        if properties.is_empty() {
            return Err(EngineError::InvalidParameters(
                "animate() requires at least one property".to_string(),
            ));
        }
        if duration.is_zero() {
            return Err(EngineError::InvalidParameters(
                "animate() requires a duration greater than zero".to_string(),
            ));
        }

        let props = capture_keyframes(&target, &properties)?;
        let id = self.ids.allocate();

        if !self.animations_enabled && !options.force {
            // Reduced-motion path: jump straight to the end state
            {
                let mut guard = match target.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for (name, keyframe) in &props {
                    guard.set(name, keyframe.end.clone());
                }
            }
            if let Some(callback) = options.callbacks.on_complete.as_mut() {
                if let Err(err) = callback() {
                    (self.error_sink)(&EngineError::UpdateCallbackFailure {
                        id,
                        phase: CallbackPhase::Complete,
                        source: err,
                    });
                }
            }
            debug!("Animations disabled, snapped {} properties to end values", props.len());
            return Ok(None);
        }

        info!(
            "🎬 Starting animation {} ({} properties, {:?})",
            id,
            props.len(),
            duration
        );

        let tween = Tween::new(id, target, props, duration, options, self.clock.now());
        self.scheduler.insert(ActiveItem::Tween(tween));
        self.monitor.created();
        self.monitor.record_op("animate", op_started.elapsed());
        self.wake.notify_one();
        Ok(Some(id))
    }

    /// Fluent timeline construction; hand the result to
    /// [`play_timeline`](Self::play_timeline).
    pub fn timeline(&self) -> TimelineBuilder {
        TimelineBuilder::new()
    }

    /// Validate and register a composite timeline.
    pub fn play_timeline(&mut self, builder: TimelineBuilder) -> Result<AnimationId, EngineError> {
        let op_started = Instant::now();

        if builder.is_empty() {
            return Err(EngineError::InvalidParameters(
                "timeline requires at least one child animation".to_string(),
            ));
        }

        let children = builder.into_children();
        let mut duration = Some(Duration::ZERO);
        let mut tweens = Vec::with_capacity(children.len());
        let timeline_id = self.ids.allocate();
        let now = self.clock.now();

        for spec in children {
            if spec.duration.is_zero() {
                return Err(EngineError::InvalidParameters(
                    "timeline child requires a duration greater than zero".to_string(),
                ));
            }
            if spec.properties.is_empty() {
                return Err(EngineError::InvalidParameters(
                    "timeline child requires at least one property".to_string(),
                ));
            }

            duration = match (duration, child_span(&spec)) {
                (Some(total), Some(span)) => Some(total.max(span)),
                _ => None,
            };

            let props = capture_keyframes(&spec.target, &spec.properties)?;
            let child_id = self.ids.allocate();
            let mut options = spec.options;
            options.delay = spec.offset;
            tweens.push(Tween::new(
                child_id,
                spec.target,
                props,
                spec.duration,
                options,
                now,
            ));
        }

        for _ in &tweens {
            self.monitor.created();
        }

        info!(
            "🎬 Starting timeline {} ({} children, {:?})",
            timeline_id,
            tweens.len(),
            duration
        );

        self.scheduler.insert(ActiveItem::Timeline(Timeline::new(
            timeline_id,
            tweens,
            duration,
        )));
        self.monitor.record_op("timeline", op_started.elapsed());
        self.wake.notify_one();
        Ok(timeline_id)
    }

    /// Stop one animation or timeline. Synchronous and idempotent: once this
    /// returns the item is out of the active set and no queued tick can
    /// advance it. No completion callbacks fire.
    pub fn stop(&mut self, id: AnimationId) {
        if let Some(mut item) = self.scheduler.remove(id) {
            item.cancel();
            info!("⏹️  Stopped animation {}", id);
            self.monitor.retire(item.into_retired(self.clock.now()));
        }
    }

    /// Stop everything that is active.
    pub fn stop_all(&mut self) {
        let items = self.scheduler.drain();
        if items.is_empty() {
            return;
        }
        info!("⏹️  Stopped all animations ({})", items.len());
        let now = self.clock.now();
        for mut item in items {
            item.cancel();
            self.monitor.retire(item.into_retired(now));
        }
    }

    /// Pause every active item. Paused items are skipped during ticks: no
    /// property mutation, no time advance.
    pub fn pause_all(&mut self) {
        for item in self.scheduler.items_mut() {
            item.pause();
        }
        info!("⏸️  Paused all animations");
    }

    /// Resume every paused item, rebasing each so progress continues exactly
    /// where it left off rather than jumping over the paused interval.
    pub fn resume_all(&mut self) {
        let now = self.clock.now();
        for item in self.scheduler.items_mut() {
            item.resume(now);
        }
        info!("▶️  Resumed all animations");
        self.wake.notify_one();
    }

    /// Advance all active items one frame. Returns whether another tick is
    /// wanted (`Running`), i.e. the active set is still non-empty.
    ///
    /// Nothing escapes this method: per-item failures are isolated inside
    /// the scheduler walk, and a panic in the walk's own bookkeeping is
    /// caught here, reported as a scheduler overrun, and the loop carries on
    /// next frame.
    pub fn tick(&mut self) -> bool {
        let tick_started = Instant::now();
        let now = self.clock.now();
        let sink = self.error_sink.clone();
        let mut errors = 0u64;

        let walk = panic::catch_unwind(AssertUnwindSafe(|| {
            self.scheduler
                .advance_all(now, tick_started, &self.config, &sink, &mut errors)
        }));

        match walk {
            Ok(retired) => {
                for entry in retired {
                    if entry.state == PlaybackState::Completed {
                        info!("✅ Animation {} completed", entry.id);
                    }
                    self.monitor.retire(entry);
                }
            }
            Err(_) => {
                errors += 1;
                let err = EngineError::SchedulerOverrun(
                    "tick bookkeeping panicked; continuing next frame".to_string(),
                );
                warn!("{err}");
                (sink)(&err);
            }
        }

        self.monitor.add_errors(errors);
        let frame_time = tick_started.elapsed();
        self.monitor.record_frame(frame_time);
        self.monitor.record_op("tick", frame_time);
        self.monitor.maybe_sweep(now);

        !self.scheduler.is_empty()
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.scheduler.is_empty() {
            SchedulerPhase::Idle
        } else {
            SchedulerPhase::Running
        }
    }

    /// Lifecycle state of an active or recently retired item.
    pub fn state(&self, id: AnimationId) -> Option<PlaybackState> {
        self.scheduler
            .get(id)
            .map(|item| item.state())
            .or_else(|| self.monitor.retired_state(id))
    }

    /// Clamped progress of an active item; `None` for unknown ids and for
    /// unbounded timelines.
    pub fn progress(&self, id: AnimationId) -> Option<f32> {
        self.scheduler.get(id).and_then(|item| item.progress())
    }

    /// Current value of one of an active animation's properties.
    pub fn value(&self, id: AnimationId, property: &str) -> Option<PropertyValue> {
        match self.scheduler.get(id) {
            Some(ActiveItem::Tween(tween)) => tween.read_property(property),
            _ => None,
        }
    }

    /// Watch an item's lifecycle state; resolves for active and retired
    /// items until the retired history is swept.
    pub fn subscribe(&self, id: AnimationId) -> Option<watch::Receiver<PlaybackState>> {
        self.scheduler
            .get(id)
            .map(|item| item.subscribe())
            .or_else(|| self.monitor.retired_subscribe(id))
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.monitor.snapshot(self.scheduler.len())
    }

    pub fn active_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn active_ids(&self) -> Vec<AnimationId> {
        self.scheduler.ids()
    }

    pub fn set_animations_enabled(&mut self, enabled: bool) {
        self.animations_enabled = enabled;
        info!(
            "{} animations globally",
            if enabled { "Enabled" } else { "Disabled" }
        );
    }

    pub fn animations_enabled(&self) -> bool {
        self.animations_enabled
    }

    /// Inject the host's error sink; receives callback failures with no
    /// `on_error` hook and force-stop notices.
    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.error_sink = sink;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Wake handle for the driver loop; notified whenever new work arrives.
    pub fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }
}

fn capture_keyframes(
    target: &SharedTarget,
    properties: &HashMap<String, PropertyValue>,
) -> Result<HashMap<String, PropertyKeyframe>, EngineError> {
    let guard = match target.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut props = HashMap::with_capacity(properties.len());
    for (name, end) in properties {
        let start = guard.get(name).ok_or_else(|| {
            EngineError::InvalidParameters(format!("target has no property '{name}'"))
        })?;
        props.insert(
            name.clone(),
            PropertyKeyframe {
                start,
                end: end.clone(),
            },
        );
    }
    Ok(props)
}

/// Drive an engine at its configured frame rate. Parks when the active set
/// empties and wakes on the next `animate()`/`play_timeline()` call; runs
/// until the hosting task is dropped.
pub async fn run(engine: Arc<Mutex<AnimationEngine>>) {
    let frame = engine.lock().await.config().frame_duration();
    run_with(engine, IntervalTicker::new(frame)).await
}

/// Same as [`run`] with a caller-supplied tick source.
pub async fn run_with(engine: Arc<Mutex<AnimationEngine>>, mut ticks: impl TickSource) {
    loop {
        let (keep_ticking, waker) = {
            let mut guard = engine.lock().await;
            (guard.tick(), guard.waker())
        };
        if keep_ticking {
            ticks.wait_frame().await;
        } else {
            waker.notified().await;
        }
    }
}
