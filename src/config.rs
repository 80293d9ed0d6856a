use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Engine tuning knobs.
///
/// Everything is optional in the serialized form; missing fields take the
/// defaults below, so an empty TOML table is a valid configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Target frame rate for the production tick driver.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Maximum animations/timelines advanced in a single tick.
    #[serde(default = "default_max_items_per_frame")]
    pub max_items_per_frame: usize,

    /// Wall-time budget for a single tick (ms); the remainder of the active
    /// set is deferred to the next tick once this is exceeded.
    #[serde(default = "default_frame_time_limit_ms")]
    pub frame_time_limit_ms: u64,

    /// Clamp on the time delta applied to any single item in one tick (ms).
    /// Bounds the catch-up jump after a stalled host.
    #[serde(default = "default_max_delta_ms")]
    pub max_delta_ms: u64,

    /// Callback failures tolerated before an animation is force-stopped.
    #[serde(default = "default_max_callback_warnings")]
    pub max_callback_warnings: u32,

    /// Minimum interval between retired-history sweeps (seconds).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Age past which retired entries are dropped by a sweep (seconds).
    #[serde(default = "default_retired_max_age_secs")]
    pub retired_max_age_secs: u64,

    /// Fraction of the target frame time above which a monitored operation
    /// logs a warning.
    #[serde(default = "default_frame_warn_fraction")]
    pub frame_warn_fraction: f32,

    /// Global kill switch; `animate()` returns `None` when false unless the
    /// caller forces the animation.
    #[serde(default = "default_true")]
    pub animations_enabled: bool,
}

impl EngineConfig {
    /// Parse a `[tweenline]`-style TOML table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse engine config: {}", e))?;
        debug!(
            "📋 Engine config loaded: {} fps, {} items/frame",
            config.target_fps, config.max_items_per_frame
        );
        Ok(config)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    pub fn frame_time_limit(&self) -> Duration {
        Duration::from_millis(self.frame_time_limit_ms)
    }

    pub fn max_delta(&self) -> Duration {
        Duration::from_millis(self.max_delta_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retired_max_age(&self) -> Duration {
        Duration::from_secs(self.retired_max_age_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            max_items_per_frame: default_max_items_per_frame(),
            frame_time_limit_ms: default_frame_time_limit_ms(),
            max_delta_ms: default_max_delta_ms(),
            max_callback_warnings: default_max_callback_warnings(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retired_max_age_secs: default_retired_max_age_secs(),
            frame_warn_fraction: default_frame_warn_fraction(),
            animations_enabled: default_true(),
        }
    }
}

// Default values for configuration
fn default_target_fps() -> u32 {
    60
}
fn default_max_items_per_frame() -> usize {
    30
}
fn default_frame_time_limit_ms() -> u64 {
    8
}
fn default_max_delta_ms() -> u64 {
    250
}
fn default_max_callback_warnings() -> u32 {
    10
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_retired_max_age_secs() -> u64 {
    300
}
fn default_frame_warn_fraction() -> f32 {
    0.8
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.target_fps, 60);
        assert_eq!(config.max_items_per_frame, 30);
        assert_eq!(config.max_delta(), Duration::from_millis(250));
        assert!(config.animations_enabled);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = EngineConfig::from_toml_str(
            r#"
            max_items_per_frame = 4
            max_delta_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.max_items_per_frame, 4);
        assert_eq!(config.max_delta_ms, 100);
        // Untouched fields keep defaults
        assert_eq!(config.target_fps, 60);
    }

    #[test]
    fn test_from_toml_empty() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_callback_warnings, 10);
    }

    #[test]
    fn test_frame_duration() {
        let mut config = EngineConfig::default();
        config.target_fps = 50;
        assert_eq!(config.frame_duration(), Duration::from_millis(20));
    }
}
