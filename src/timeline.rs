use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::EngineError;
use crate::properties::PropertyValue;
use crate::scheduler::TickCtx;
use crate::target::SharedTarget;
use crate::tween::{AnimationId, AnimationOptions, PlaybackState, Repeat, StepOutcome, Tween};

/// Ordered composite of animations with per-child start offsets.
///
/// The timeline is a coordinator, not a separate interpolation mechanism: it
/// forwards ticks to child tweens whose window has opened, keyed to the
/// timeline's own clock, and completes once its span has elapsed and every
/// child reached a terminal state.
pub struct Timeline {
    id: AnimationId,
    children: Vec<Tween>,
    /// `None` when a child repeats forever; such a timeline never completes
    /// on its own and has to be stopped.
    duration: Option<Duration>,

    state: PlaybackState,
    paused: bool,
    last_tick: Option<Instant>,
    elapsed: Duration,

    state_tx: watch::Sender<PlaybackState>,
}

impl Timeline {
    pub(crate) fn new(id: AnimationId, children: Vec<Tween>, duration: Option<Duration>) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Pending);
        Self {
            id,
            children,
            duration,
            state: PlaybackState::Pending,
            paused: false,
            last_tick: None,
            elapsed: Duration::ZERO,
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

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn progress(&self) -> Option<f32> {
        if self.state == PlaybackState::Completed {
            return Some(1.0);
        }
        self.duration
            .map(|d| (self.elapsed.as_secs_f32() / d.as_secs_f32()).clamp(0.0, 1.0))
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Highest warning count among still-running children. Children already
    /// force-stopped for their failures are excluded so one bad child cannot
    /// take the whole timeline down.
    pub(crate) fn max_child_warnings(&self) -> u32 {
        self.children
            .iter()
            .filter(|c| !c.state().is_terminal())
            .map(|c| c.warnings)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn advance(&mut self, ctx: &mut TickCtx) -> StepOutcome {
        if self.state.is_terminal() {
            return StepOutcome::Finished;
        }
        if self.paused {
            return StepOutcome::Waiting;
        }

        if self.state == PlaybackState::Pending {
            self.set_state(PlaybackState::Active);
            self.last_tick = Some(ctx.now);
            self.elapsed = Duration::ZERO;
            // Child delays are offsets from the timeline start, not from
            // child creation
            for child in &mut self.children {
                child.rebase(ctx.now);
            }
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

        for child in &mut self.children {
            if child.state().is_terminal() {
                continue;
            }
            child.advance(ctx);
            if child.warnings > ctx.cfg.max_callback_warnings {
                child.cancel();
                (ctx.sink)(&EngineError::ForcedStop {
                    id: child.id(),
                    warnings: child.warnings,
                });
            }
        }

        let children_done = self.children.iter().all(|c| c.state().is_terminal());
        let span_done = match self.duration {
            Some(duration) => self.elapsed >= duration,
            None => false,
        };

        if children_done && span_done {
            self.set_state(PlaybackState::Completed);
            StepOutcome::Finished
        } else {
            StepOutcome::Running
        }
    }

    pub(crate) fn pause(&mut self) {
        self.paused = true;
    }

    pub(crate) fn resume(&mut self, now: Instant) {
        self.paused = false;
        if self.last_tick.is_some() {
            self.last_tick = Some(now);
        }
        for child in &mut self.children {
            if !child.state().is_terminal() {
                child.resume(now);
            }
        }
    }

    /// Cancel the timeline and every non-terminal child. Idempotent.
    pub(crate) fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        for child in &mut self.children {
            child.cancel();
        }
        self.set_state(PlaybackState::Cancelled);
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    pub(crate) fn into_state_tx(self) -> watch::Sender<PlaybackState> {
        self.state_tx
    }
}

/// Spec for one timeline child, resolved into a tween at play time.
pub struct ChildSpec {
    pub(crate) target: SharedTarget,
    pub(crate) properties: HashMap<String, PropertyValue>,
    pub(crate) duration: Duration,
    pub(crate) offset: Duration,
    pub(crate) options: AnimationOptions,
}

/// Fluent timeline construction; handed to
/// [`AnimationEngine::play_timeline`](crate::engine::AnimationEngine::play_timeline).
#[derive(Default)]
pub struct TimelineBuilder {
    children: Vec<ChildSpec>,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(
        self,
        target: SharedTarget,
        properties: HashMap<String, PropertyValue>,
        duration: Duration,
        offset: Duration,
    ) -> Self {
        self.child_with(target, properties, duration, offset, AnimationOptions::new())
    }

    pub fn child_with(
        mut self,
        target: SharedTarget,
        properties: HashMap<String, PropertyValue>,
        duration: Duration,
        offset: Duration,
        options: AnimationOptions,
    ) -> Self {
        self.children.push(ChildSpec {
            target,
            properties,
            duration,
            offset,
            options,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn into_children(self) -> Vec<ChildSpec> {
        self.children
    }
}

/// Total span one child contributes: offset plus its duration across every
/// repeat cycle; `None` for an infinitely repeating child.
pub(crate) fn child_span(spec: &ChildSpec) -> Option<Duration> {
    let cycles = match spec.options.repeat {
        Repeat::None => 1,
        Repeat::Count(n) => n as u64 + 1,
        Repeat::Infinite => return None,
    };
    Some(spec.offset + spec.duration * cycles as u32)
}
