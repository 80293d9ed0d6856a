use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::easing::Easing;
use crate::error::{CallbackPhase, EngineError};
use crate::properties::PropertyKeyframe;
use crate::scheduler::TickCtx;
use crate::target::SharedTarget;

/// Opaque animation identity, unique for the engine's lifetime.
///
/// Ids are allocated from a monotonic counter, so id order doubles as
/// registration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AnimationId(pub(crate) u64);

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim-{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn allocate(&mut self) -> AnimationId {
        self.next += 1;
        AnimationId(self.next)
    }
}

/// Animation lifecycle state. `paused` is a flag orthogonal to this, so a
/// resumed animation can continue exactly where it left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Completed | PlaybackState::Cancelled)
    }
}

/// Repeat policy. Wire format: `-1` infinite, `0` none, `n` extra cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Repeat {
    #[default]
    None,
    Count(u32),
    Infinite,
}

impl Repeat {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            n if n < 0 => Repeat::Infinite,
            0 => Repeat::None,
            n => Repeat::Count(n as u32),
        }
    }
}

pub type StartCallback = Box<dyn FnMut() -> Result<()> + Send>;
pub type UpdateCallback = Box<dyn FnMut(f32) -> Result<()> + Send>;
pub type CompleteCallback = Box<dyn FnMut() -> Result<()> + Send>;
pub type RepeatCallback = Box<dyn FnMut(u32) -> Result<()> + Send>;
pub type ErrorCallback = Box<dyn FnMut(&EngineError) + Send>;

/// Optional lifecycle callbacks. All are fallible and isolated: a failure is
/// routed to `on_error` (or the engine sink), counted, and never aborts the
/// tick or the animation directly.
#[derive(Default)]
pub struct Callbacks {
    pub on_start: Option<StartCallback>,
    pub on_update: Option<UpdateCallback>,
    pub on_complete: Option<CompleteCallback>,
    pub on_repeat: Option<RepeatCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// Per-animation options for `animate()`.
#[derive(Default)]
pub struct AnimationOptions {
    pub easing: Easing,
    pub delay: Duration,
    pub repeat: Repeat,
    pub yoyo: bool,
    /// Run even when animations are globally disabled.
    pub force: bool,
    pub callbacks: Callbacks,
}

impl AnimationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_easing_name(mut self, name: &str) -> Self {
        self.easing = Easing::from_name(name);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn on_start(mut self, f: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.callbacks.on_start = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl FnMut(f32) -> Result<()> + Send + 'static) -> Self {
        self.callbacks.on_update = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.callbacks.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_repeat(mut self, f: impl FnMut(u32) -> Result<()> + Send + 'static) -> Self {
        self.callbacks.on_repeat = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&EngineError) + Send + 'static) -> Self {
        self.callbacks.on_error = Some(Box::new(f));
        self
    }
}

/// What a single advance step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Still waiting out the delay (or paused).
    Waiting,
    /// Advanced and still running.
    Running,
    /// Reached a terminal state this step.
    Finished,
}

/// A single timed mutation of a target's named properties.
pub struct Tween {
    id: AnimationId,
    target: SharedTarget,
    props: HashMap<String, PropertyKeyframe>,
    duration: Duration,
    delay: Duration,
    easing: Easing,
    repeat: Repeat,
    yoyo: bool,

    state: PlaybackState,
    paused: bool,
    created_at: Instant,
    last_tick: Option<Instant>,
    elapsed: Duration,
    repeat_count: u32,
    pub(crate) warnings: u32,

    callbacks: Callbacks,
    state_tx: watch::Sender<PlaybackState>,
}

impl Tween {
    pub(crate) fn new(
        id: AnimationId,
        target: SharedTarget,
        props: HashMap<String, PropertyKeyframe>,
        duration: Duration,
        options: AnimationOptions,
        created_at: Instant,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Pending);
        Self {
            id,
            target,
            props,
            duration,
            delay: options.delay,
            easing: options.easing,
            repeat: options.repeat,
            yoyo: options.yoyo,
            state: PlaybackState::Pending,
            paused: false,
            created_at,
            last_tick: None,
            elapsed: Duration::ZERO,
            repeat_count: 0,
            warnings: 0,
            callbacks: options.callbacks,
            state_tx,
        }
    }

    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn paused(&self) -> bool {
        self.paused
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn progress(&self) -> f32 {
        match self.state {
            PlaybackState::Pending => 0.0,
            PlaybackState::Completed => 1.0,
            _ => {
                (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Read the current value of one animated property off the target.
    pub(crate) fn read_property(&self, name: &str) -> Option<crate::properties::PropertyValue> {
        crate::target::read_property(&self.target, name)
    }

    /// Advance to `ctx.now`. The time delta applied in a single step is
    /// clamped to `max_delta` so a stalled host cannot produce a huge
    /// instantaneous progress jump.
    pub(crate) fn advance(&mut self, ctx: &mut TickCtx) -> StepOutcome {
        if self.state.is_terminal() {
            return StepOutcome::Finished;
        }
        if self.paused {
            return StepOutcome::Waiting;
        }

        if self.state == PlaybackState::Pending {
            if ctx.now.saturating_duration_since(self.created_at) < self.delay {
                return StepOutcome::Waiting;
            }
            self.set_state(PlaybackState::Active);
            self.last_tick = Some(ctx.now);
            self.elapsed = Duration::ZERO;
            self.fire_start(ctx);
        }

        let delta = match self.last_tick {
            Some(prev) => ctx
                .now
                .saturating_duration_since(prev)
                .min(ctx.cfg.max_delta()),
            None => Duration::ZERO,
        };
        self.last_tick = Some(ctx.now);
        self.elapsed += delta;

        let raw = (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        let finished = raw >= 1.0;
        let eased = self.easing.apply(raw);

        self.write_properties(eased, finished);
        self.fire_update(raw, ctx);

        if !finished {
            return StepOutcome::Running;
        }

        if self.wants_repeat() {
            self.repeat_count += 1;
            if self.yoyo {
                for keyframe in self.props.values_mut() {
                    keyframe.swap();
                }
            }
            self.elapsed = Duration::ZERO;
            let cycle = self.repeat_count;
            self.fire_repeat(cycle, ctx);
            StepOutcome::Running
        } else {
            self.set_state(PlaybackState::Completed);
            self.fire_complete(ctx);
            StepOutcome::Finished
        }
    }

    fn wants_repeat(&self) -> bool {
        match self.repeat {
            Repeat::Infinite => true,
            Repeat::Count(n) => self.repeat_count < n,
            Repeat::None => false,
        }
    }

    fn write_properties(&mut self, eased: f32, finished: bool) {
        let mut guard = match self.target.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (name, keyframe) in &self.props {
            let value = keyframe.start.interpolate(&keyframe.end, eased, finished);
            guard.set(name, value);
        }
    }

    pub(crate) fn pause(&mut self) {
        self.paused = true;
    }

    /// Clear the paused flag and rebase the tick bookkeeping so the next
    /// advance continues from the elapsed time at pause, not from wall time.
    pub(crate) fn resume(&mut self, now: Instant) {
        self.paused = false;
        if self.last_tick.is_some() {
            self.last_tick = Some(now);
        }
    }

    /// Cancel without firing completion callbacks. Idempotent.
    pub(crate) fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.set_state(PlaybackState::Cancelled);
        }
    }

    /// Rebase creation time; used by timelines so child delays are keyed to
    /// the timeline clock.
    pub(crate) fn rebase(&mut self, now: Instant) {
        self.created_at = now;
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn fire_start(&mut self, ctx: &mut TickCtx) {
        if let Some(callback) = self.callbacks.on_start.as_mut() {
            if let Err(err) = callback() {
                self.report(CallbackPhase::Start, err, ctx);
            }
        }
    }

    fn fire_update(&mut self, progress: f32, ctx: &mut TickCtx) {
        if let Some(callback) = self.callbacks.on_update.as_mut() {
            if let Err(err) = callback(progress) {
                self.report(CallbackPhase::Update, err, ctx);
            }
        }
    }

    fn fire_complete(&mut self, ctx: &mut TickCtx) {
        if let Some(callback) = self.callbacks.on_complete.as_mut() {
            if let Err(err) = callback() {
                self.report(CallbackPhase::Complete, err, ctx);
            }
        }
    }

    fn fire_repeat(&mut self, cycle: u32, ctx: &mut TickCtx) {
        if let Some(callback) = self.callbacks.on_repeat.as_mut() {
            if let Err(err) = callback(cycle) {
                self.report(CallbackPhase::Repeat, err, ctx);
            }
        }
    }

    fn report(&mut self, phase: CallbackPhase, err: anyhow::Error, ctx: &mut TickCtx) {
        self.warnings += 1;
        *ctx.errors += 1;
        let engine_err = EngineError::UpdateCallbackFailure {
            id: self.id,
            phase,
            source: err,
        };
        match self.callbacks.on_error.as_mut() {
            Some(on_error) => on_error(&engine_err),
            None => (ctx.sink)(&engine_err),
        }
    }

    pub(crate) fn into_state_tx(self) -> watch::Sender<PlaybackState> {
        self.state_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::EngineConfig;
    use crate::error::default_error_sink;
    use crate::properties::PropertyValue;
    use crate::target::{read_property, PropertyBag};

    fn keyframes(pairs: &[(&str, f64, f64)]) -> HashMap<String, PropertyKeyframe> {
        pairs
            .iter()
            .map(|(name, start, end)| {
                (
                    name.to_string(),
                    PropertyKeyframe {
                        start: PropertyValue::Number(*start),
                        end: PropertyValue::Number(*end),
                    },
                )
            })
            .collect()
    }

    fn step(tween: &mut Tween, clock: &ManualClock, cfg: &EngineConfig) -> StepOutcome {
        let sink = default_error_sink();
        let mut errors = 0;
        let mut ctx = TickCtx {
            now: clock.now(),
            cfg,
            sink: &sink,
            errors: &mut errors,
        };
        tween.advance(&mut ctx)
    }

    #[test]
    fn test_linear_midpoint_and_completion() {
        let clock = ManualClock::new();
        let cfg = EngineConfig::default();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let mut tween = Tween::new(
            AnimationId(1),
            target.clone(),
            keyframes(&[("x", 0.0, 10.0)]),
            Duration::from_millis(1000),
            AnimationOptions::new().with_easing(Easing::Linear),
            clock.now(),
        );

        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Running);
        clock.advance_ms(500);
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Running);
        assert_eq!(
            read_property(&target, "x"),
            Some(PropertyValue::Number(5.0))
        );

        clock.advance_ms(500);
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Finished);
        assert_eq!(tween.state(), PlaybackState::Completed);
        assert_eq!(
            read_property(&target, "x"),
            Some(PropertyValue::Number(10.0))
        );
    }

    #[test]
    fn test_delay_keeps_tween_pending() {
        let clock = ManualClock::new();
        let cfg = EngineConfig::default();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let mut tween = Tween::new(
            AnimationId(1),
            target,
            keyframes(&[("x", 0.0, 1.0)]),
            Duration::from_millis(100),
            AnimationOptions::new().with_delay(Duration::from_millis(50)),
            clock.now(),
        );

        clock.advance_ms(20);
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Waiting);
        assert_eq!(tween.state(), PlaybackState::Pending);

        clock.advance_ms(40);
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Running);
        assert_eq!(tween.state(), PlaybackState::Active);
        // Activation resets the start time; no progress credited for the delay
        assert_eq!(tween.progress(), 0.0);
    }

    #[test]
    fn test_delta_clamp() {
        let clock = ManualClock::new();
        let cfg = EngineConfig::default();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let mut tween = Tween::new(
            AnimationId(1),
            target,
            keyframes(&[("x", 0.0, 1.0)]),
            Duration::from_millis(1000),
            AnimationOptions::new().with_easing(Easing::Linear),
            clock.now(),
        );

        step(&mut tween, &clock, &cfg);
        // Simulated stall far beyond max_delta (250ms default)
        clock.advance_ms(5000);
        step(&mut tween, &clock, &cfg);
        assert!((tween.progress() - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_repeat_yoyo_swaps_endpoints() {
        let clock = ManualClock::new();
        let cfg = EngineConfig::default();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let mut tween = Tween::new(
            AnimationId(1),
            target.clone(),
            keyframes(&[("x", 0.0, 10.0)]),
            Duration::from_millis(100),
            AnimationOptions::new()
                .with_easing(Easing::Linear)
                .with_repeat(Repeat::Count(1))
                .with_yoyo(),
            clock.now(),
        );

        step(&mut tween, &clock, &cfg);
        clock.advance_ms(100);
        // Cycle 1 ends at x=10, then flips for the return trip
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Running);
        assert_eq!(tween.repeat_count(), 1);
        assert_eq!(
            read_property(&target, "x"),
            Some(PropertyValue::Number(10.0))
        );

        clock.advance_ms(100);
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Finished);
        assert_eq!(
            read_property(&target, "x"),
            Some(PropertyValue::Number(0.0))
        );
    }

    #[test]
    fn test_pause_preserves_elapsed() {
        let clock = ManualClock::new();
        let cfg = EngineConfig::default();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let mut tween = Tween::new(
            AnimationId(1),
            target,
            keyframes(&[("x", 0.0, 1.0)]),
            Duration::from_millis(1000),
            AnimationOptions::new().with_easing(Easing::Linear),
            clock.now(),
        );

        step(&mut tween, &clock, &cfg);
        clock.advance_ms(300);
        step(&mut tween, &clock, &cfg);
        assert!((tween.progress() - 0.3).abs() < 1e-4);

        tween.pause();
        clock.advance_ms(10_000);
        assert_eq!(step(&mut tween, &clock, &cfg), StepOutcome::Waiting);

        tween.resume(clock.now());
        step(&mut tween, &clock, &cfg);
        assert!((tween.progress() - 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_callback_failure_routes_to_on_error() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let clock = ManualClock::new();
        let cfg = EngineConfig::default();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_callback = Arc::clone(&seen);

        let mut tween = Tween::new(
            AnimationId(1),
            target,
            keyframes(&[("x", 0.0, 1.0)]),
            Duration::from_millis(100),
            AnimationOptions::new()
                .on_update(|_| anyhow::bail!("update exploded"))
                .on_error(move |err| {
                    assert!(matches!(
                        err,
                        EngineError::UpdateCallbackFailure { .. }
                    ));
                    seen_in_callback.fetch_add(1, Ordering::SeqCst);
                }),
            clock.now(),
        );

        let outcome = step(&mut tween, &clock, &cfg);
        // A failing on_update does not abort the tween
        assert_eq!(outcome, StepOutcome::Running);
        assert_eq!(tween.warnings, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let clock = ManualClock::new();
        let target = PropertyBag::new().with("x", 0.0).into_shared();
        let mut tween = Tween::new(
            AnimationId(1),
            target,
            keyframes(&[("x", 0.0, 1.0)]),
            Duration::from_millis(100),
            AnimationOptions::new(),
            clock.now(),
        );

        tween.cancel();
        assert_eq!(tween.state(), PlaybackState::Cancelled);
        tween.cancel();
        assert_eq!(tween.state(), PlaybackState::Cancelled);
    }

    #[test]
    fn test_repeat_from_raw() {
        assert_eq!(Repeat::from_raw(-1), Repeat::Infinite);
        assert_eq!(Repeat::from_raw(0), Repeat::None);
        assert_eq!(Repeat::from_raw(3), Repeat::Count(3));
    }
}
