#![allow(dead_code)]

//! Tweenline - a unified animation manager
//!
//! This crate provides a clock-driven tween and timeline scheduling engine:
//! many concurrent property interpolations advanced against a single frame
//! clock, with pause/resume that doesn't drift, repeat/yoyo looping,
//! composite timelines, per-animation failure isolation, and bounded
//! per-frame work.

pub mod clock;
pub mod config;
pub mod easing;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod properties;
mod scheduler;
pub mod target;
pub mod timeline;
pub mod tween;

// Re-export commonly used types
pub use clock::{Clock, IntervalTicker, ManualClock, SystemClock, TickSource};
pub use config::EngineConfig;
pub use easing::Easing;
pub use engine::{run, run_with, AnimationEngine, SchedulerPhase};
pub use error::{CallbackPhase, EngineError, ErrorSink};
pub use monitor::{EngineMetrics, OpStats};
pub use properties::{Color, PropertyKeyframe, PropertyKind, PropertyValue};
pub use target::{AnimTarget, PropertyBag, SharedTarget};
pub use timeline::{Timeline, TimelineBuilder};
pub use tween::{AnimationId, AnimationOptions, Callbacks, PlaybackState, Repeat};
