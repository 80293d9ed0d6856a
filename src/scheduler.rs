use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tokio::sync::watch;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorSink};
use crate::timeline::Timeline;
use crate::tween::{AnimationId, PlaybackState, StepOutcome, Tween};

/// Per-tick context threaded through every advance call.
pub(crate) struct TickCtx<'a> {
    pub now: Instant,
    pub cfg: &'a EngineConfig,
    pub sink: &'a ErrorSink,
    /// Callback failures observed this tick, for the metrics counter.
    pub errors: &'a mut u64,
}

/// A registry entry: either a single tween or a composite timeline.
pub(crate) enum ActiveItem {
    Tween(Tween),
    Timeline(Timeline),
}

impl ActiveItem {
    pub(crate) fn id(&self) -> AnimationId {
        match self {
            ActiveItem::Tween(t) => t.id(),
            ActiveItem::Timeline(t) => t.id(),
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        match self {
            ActiveItem::Tween(t) => t.state(),
            ActiveItem::Timeline(t) => t.state(),
        }
    }

    pub(crate) fn paused(&self) -> bool {
        match self {
            ActiveItem::Tween(t) => t.paused(),
            ActiveItem::Timeline(t) => t.paused(),
        }
    }

    pub(crate) fn progress(&self) -> Option<f32> {
        match self {
            ActiveItem::Tween(t) => Some(t.progress()),
            ActiveItem::Timeline(t) => t.progress(),
        }
    }

    pub(crate) fn warnings(&self) -> u32 {
        match self {
            ActiveItem::Tween(t) => t.warnings,
            ActiveItem::Timeline(t) => t.max_child_warnings(),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        match self {
            ActiveItem::Tween(t) => t.subscribe(),
            ActiveItem::Timeline(t) => t.subscribe(),
        }
    }

    fn advance(&mut self, ctx: &mut TickCtx) -> StepOutcome {
        match self {
            ActiveItem::Tween(t) => t.advance(ctx),
            ActiveItem::Timeline(t) => t.advance(ctx),
        }
    }

    pub(crate) fn pause(&mut self) {
        match self {
            ActiveItem::Tween(t) => t.pause(),
            ActiveItem::Timeline(t) => t.pause(),
        }
    }

    pub(crate) fn resume(&mut self, now: Instant) {
        match self {
            ActiveItem::Tween(t) => t.resume(now),
            ActiveItem::Timeline(t) => t.resume(now),
        }
    }

    pub(crate) fn cancel(&mut self) {
        match self {
            ActiveItem::Tween(t) => t.cancel(),
            ActiveItem::Timeline(t) => t.cancel(),
        }
    }

    pub(crate) fn into_retired(self, now: Instant) -> Retired {
        let id = self.id();
        let state = self.state();
        let tx = match self {
            ActiveItem::Tween(t) => t.into_state_tx(),
            ActiveItem::Timeline(t) => t.into_state_tx(),
        };
        Retired {
            id,
            state,
            at: now,
            state_tx: tx,
        }
    }
}

/// Terminal item swept out of the registry, kept in the monitor's history so
/// late state queries and subscriptions still resolve.
pub(crate) struct Retired {
    pub id: AnimationId,
    pub state: PlaybackState,
    pub at: Instant,
    pub state_tx: watch::Sender<PlaybackState>,
}

/// Exclusive owner of the active registry. Items are advanced in
/// registration order, bounded per tick by an item-count and a wall-time
/// budget; a rotating cursor guarantees deferred items are serviced on
/// subsequent ticks.
#[derive(Default)]
pub(crate) struct Scheduler {
    order: Vec<AnimationId>,
    items: HashMap<AnimationId, ActiveItem>,
    cursor: usize,
}

impl Scheduler {
    pub(crate) fn insert(&mut self, item: ActiveItem) {
        let id = item.id();
        self.order.push(id);
        self.items.insert(id, item);
    }

    pub(crate) fn remove(&mut self, id: AnimationId) -> Option<ActiveItem> {
        let item = self.items.remove(&id)?;
        self.order.retain(|other| *other != id);
        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }
        Some(item)
    }

    pub(crate) fn get(&self, id: AnimationId) -> Option<&ActiveItem> {
        self.items.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn ids(&self) -> Vec<AnimationId> {
        self.order.clone()
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut ActiveItem> {
        self.items.values_mut()
    }

    pub(crate) fn drain(&mut self) -> Vec<ActiveItem> {
        self.cursor = 0;
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| self.items.remove(&id))
            .collect()
    }

    /// Advance the active set for one tick and sweep out items that became
    /// terminal. A panic while advancing one item cancels that item only;
    /// the rest of the set still ticks.
    pub(crate) fn advance_all(
        &mut self,
        now: Instant,
        tick_started: Instant,
        cfg: &EngineConfig,
        sink: &ErrorSink,
        errors: &mut u64,
    ) -> Vec<Retired> {
        let count = self.order.len();
        if count > 0 {
            let start = self.cursor % count;
            let mut advanced = 0usize;

            for step in 0..count {
                if advanced >= cfg.max_items_per_frame {
                    self.cursor = (start + step) % count;
                    debug!(
                        "Frame budget reached after {} items, deferring {}",
                        advanced,
                        count - step
                    );
                    break;
                }
                if tick_started.elapsed() > cfg.frame_time_limit() {
                    self.cursor = (start + step) % count;
                    debug!("Frame time limit exceeded, deferring {} items", count - step);
                    break;
                }

                let id = self.order[(start + step) % count];
                let Some(item) = self.items.get_mut(&id) else {
                    continue;
                };
                if item.state().is_terminal() || item.paused() {
                    continue;
                }

                let mut ctx = TickCtx {
                    now,
                    cfg,
                    sink,
                    errors: &mut *errors,
                };
                let step_result =
                    panic::catch_unwind(AssertUnwindSafe(|| item.advance(&mut ctx)));
                advanced += 1;

                match step_result {
                    Ok(_) => {
                        if item.warnings() > cfg.max_callback_warnings
                            && !item.state().is_terminal()
                        {
                            let warnings = item.warnings();
                            item.cancel();
                            (sink)(&EngineError::ForcedStop { id, warnings });
                        }
                    }
                    Err(_) => {
                        // The item may be mid-mutation; drop it rather than
                        // keep ticking inconsistent state
                        item.cancel();
                        *errors += 1;
                        (sink)(&EngineError::UpdateCallbackFailure {
                            id,
                            phase: crate::error::CallbackPhase::Update,
                            source: anyhow::anyhow!("callback panicked"),
                        });
                    }
                }
            }
        }

        self.sweep(now)
    }

    fn sweep(&mut self, now: Instant) -> Vec<Retired> {
        let mut retired = Vec::new();
        let items = &mut self.items;
        self.order.retain(|id| {
            let terminal = items.get(id).map(|item| item.state().is_terminal());
            match terminal {
                Some(true) => {
                    if let Some(item) = items.remove(id) {
                        retired.push(item.into_retired(now));
                    }
                    false
                }
                Some(false) => true,
                None => false,
            }
        });
        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }
        retired
    }
}
