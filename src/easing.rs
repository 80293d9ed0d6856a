use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Easing functions reshaping linear progress into perceptual curves.
///
/// All functions are pure and pinned at `apply(0) == 0`, `apply(1) == 1`.
/// `Bounce` and `Elastic` may transiently leave `[0, 1]` in the interior;
/// interpolation callers must tolerate overshoot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    Bounce,
    BounceIn,
    Elastic,
}

impl Easing {
    /// Look up an easing by name. Matching is case-insensitive and ignores
    /// hyphens; unknown names fall back to `Linear`.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.to_lowercase().replace('-', "");
        match normalized.as_str() {
            "linear" => Easing::Linear,
            "easein" | "easeinquad" => Easing::EaseIn,
            "easeout" | "easeoutquad" => Easing::EaseOut,
            "easeinout" | "ease" => Easing::EaseInOut,
            "easeincubic" => Easing::EaseInCubic,
            "easeoutcubic" => Easing::EaseOutCubic,
            "easeinoutcubic" => Easing::EaseInOutCubic,
            "bounce" | "easeoutbounce" => Easing::Bounce,
            "bouncein" | "easeinbounce" => Easing::BounceIn,
            "elastic" | "easeoutelastic" => Easing::Elastic,
            _ => {
                debug!("Unknown easing '{}', falling back to linear", name);
                Easing::Linear
            }
        }
    }

    /// Apply the easing to a progress value. Input is clamped to `[0, 1]`.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Easing::Linear => t,

            // Quadratic
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }

            // Cubic
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }

            // Bounce
            Easing::Bounce => bounce_out(t),
            Easing::BounceIn => 1.0 - bounce_out(1.0 - t),

            // Elastic
            Easing::Elastic => {
                if t == 0.0 {
                    0.0
                } else if t == 1.0 {
                    1.0
                } else {
                    2.0_f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * 2.0 * PI / 3.0).sin() + 1.0
                }
            }
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Easing::EaseInOut
    }
}

/// Standard four-segment piecewise quadratic bounce.
fn bounce_out(t: f32) -> f32 {
    let n1 = 7.5625;
    let d1 = 2.75;

    if t < 1.0 / d1 {
        n1 * t * t
    } else if t < 2.0 / d1 {
        n1 * (t - 1.5 / d1) * (t - 1.5 / d1) + 0.75
    } else if t < 2.5 / d1 {
        n1 * (t - 2.25 / d1) * (t - 2.25 / d1) + 0.9375
    } else {
        n1 * (t - 2.625 / d1) * (t - 2.625 / d1) + 0.984375
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 10] = [
        Easing::Linear,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
        Easing::EaseInCubic,
        Easing::EaseOutCubic,
        Easing::EaseInOutCubic,
        Easing::Bounce,
        Easing::BounceIn,
        Easing::Elastic,
    ];

    #[test]
    fn test_fixed_points() {
        for easing in ALL {
            assert!(
                easing.apply(0.0).abs() < 1e-5,
                "{easing:?} not pinned at 0"
            );
            assert!(
                (easing.apply(1.0) - 1.0).abs() < 1e-5,
                "{easing:?} not pinned at 1"
            );
        }
    }

    #[test]
    fn test_linear_easing() {
        assert_eq!(Easing::Linear.apply(0.5), 0.5);
        assert_eq!(Easing::Linear.apply(0.25), 0.25);
    }

    #[test]
    fn test_ease_in_out_halves() {
        // 2t^2 below the midpoint, cubic above; both meet at 0.5
        assert_eq!(Easing::EaseInOut.apply(0.5), 0.5);
        assert!(Easing::EaseInOut.apply(0.25) < 0.25);
        assert!(Easing::EaseInOut.apply(0.75) > 0.75);
    }

    #[test]
    fn test_bounce_overshoots_linear_near_end() {
        let result = Easing::Bounce.apply(0.8);
        assert!(result > 0.8 && result <= 1.0);
    }

    #[test]
    fn test_elastic_overshoots_one_in_interior() {
        let overshoot = (1..100)
            .map(|i| Easing::Elastic.apply(i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(overshoot > 1.0);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Easing::from_name("ease-in-out"), Easing::EaseInOut);
        assert_eq!(Easing::from_name("easeOutCubic"), Easing::EaseOutCubic);
        assert_eq!(Easing::from_name("bounce"), Easing::Bounce);
        assert_eq!(Easing::from_name("elastic"), Easing::Elastic);
    }

    #[test]
    fn test_unknown_name_falls_back_to_linear() {
        assert_eq!(Easing::from_name("wobble"), Easing::Linear);
        assert_eq!(Easing::from_name(""), Easing::Linear);
    }

    #[test]
    fn test_input_clamped() {
        for easing in ALL {
            assert_eq!(easing.apply(-2.0), easing.apply(0.0));
            assert_eq!(easing.apply(3.0), easing.apply(1.0));
        }
    }
}
