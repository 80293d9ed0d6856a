use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::tween::AnimationId;

/// Which lifecycle callback a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    Start,
    Update,
    Complete,
    Repeat,
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackPhase::Start => "on_start",
            CallbackPhase::Update => "on_update",
            CallbackPhase::Complete => "on_complete",
            CallbackPhase::Repeat => "on_repeat",
        };
        write!(f, "{name}")
    }
}

/// Engine error taxonomy.
///
/// Only `InvalidParameters` is ever returned to the direct caller of a facade
/// method. Everything else is produced at tick time and routed through the
/// item's `on_error` callback or the engine's error sink, never unwound
/// across the tick loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{phase} callback failed for animation {id}: {source}")]
    UpdateCallbackFailure {
        id: AnimationId,
        phase: CallbackPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("scheduler overrun: {0}")]
    SchedulerOverrun(String),

    #[error("animation {id} force-stopped after {warnings} callback failures")]
    ForcedStop { id: AnimationId, warnings: u32 },
}

/// Injectable sink for errors that have no caller to return to.
pub type ErrorSink = Arc<dyn Fn(&EngineError) + Send + Sync>;

pub(crate) fn default_error_sink() -> ErrorSink {
    Arc::new(|err| warn!("⚠️  {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters_display() {
        let err = EngineError::InvalidParameters("no properties".to_string());
        assert_eq!(err.to_string(), "invalid parameters: no properties");
    }

    #[test]
    fn test_callback_failure_display_names_phase() {
        let err = EngineError::UpdateCallbackFailure {
            id: AnimationId(7),
            phase: CallbackPhase::Update,
            source: anyhow::anyhow!("boom"),
        };
        let text = err.to_string();
        assert!(text.contains("on_update"));
        assert!(text.contains("anim-7"));
    }
}
