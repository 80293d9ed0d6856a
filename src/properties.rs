use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Animatable property values with interpolation support.
///
/// `Raw` carries any opaque JSON value a host wants to flip at the end of an
/// animation; no meaningful interpolation exists for it, so it holds the
/// start value until the animation completes and then snaps to the end.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Color(Color),
    Raw(serde_json::Value),
}

/// Interpolation kind tag, derived from the value variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Numeric,
    Color,
    Generic,
}

/// Start/end pair for one named property, captured once at creation.
#[derive(Debug, Clone)]
pub struct PropertyKeyframe {
    pub start: PropertyValue,
    pub end: PropertyValue,
}

impl PropertyKeyframe {
    /// Reverse direction for a yoyo cycle.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Number(_) => PropertyKind::Numeric,
            PropertyValue::Color(_) => PropertyKind::Color,
            PropertyValue::Raw(_) => PropertyKind::Generic,
        }
    }

    /// Compute the value at `eased` progress between `self` and `end`.
    ///
    /// `completed` is the raw (un-eased) end-of-cycle signal; it drives the
    /// generic snap so that easing overshoot past 1.0 cannot flip an opaque
    /// value early. Mismatched kinds hold the start value.
    pub fn interpolate(&self, end: &PropertyValue, eased: f32, completed: bool) -> PropertyValue {
        match (self, end) {
            (PropertyValue::Number(from), PropertyValue::Number(to)) => {
                PropertyValue::Number(from + (to - from) * eased as f64)
            }
            (PropertyValue::Color(from), PropertyValue::Color(to)) => {
                PropertyValue::Color(from.interpolate(to, eased))
            }
            (PropertyValue::Raw(_), PropertyValue::Raw(to)) => {
                if completed {
                    PropertyValue::Raw(to.clone())
                } else {
                    self.clone()
                }
            }
            // Kind mismatch - hold the start value
            _ => self.clone(),
        }
    }

    /// Get the value as a float, when it has a numeric reading.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(val) => Some(*val),
            PropertyValue::Raw(serde_json::Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// Parse a value from its string form: numbers, `#RRGGBB[AA]`,
    /// `rgb(...)`, `rgba(...)`. Anything else becomes an opaque `Raw` string,
    /// except malformed color syntax, which is rejected.
    pub fn parse(value: &str) -> Result<PropertyValue, EngineError> {
        let value = value.trim();

        if let Ok(number) = value.parse::<f64>() {
            return Ok(PropertyValue::Number(number));
        }

        if value.starts_with('#') {
            return Color::from_hex_str(value).map(PropertyValue::Color);
        }

        if value.starts_with("rgba(") && value.ends_with(')') {
            return Color::from_rgba_str(value).map(PropertyValue::Color);
        }

        if value.starts_with("rgb(") && value.ends_with(')') {
            return Color::from_rgb_str(value).map(PropertyValue::Color);
        }

        Ok(PropertyValue::Raw(serde_json::Value::String(
            value.to_string(),
        )))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<Color> for PropertyValue {
    fn from(value: Color) -> Self {
        PropertyValue::Color(value)
    }
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Channel-wise linear interpolation in RGB space.
    pub fn interpolate(&self, target: &Color, progress: f32) -> Color {
        Color {
            r: self.r + (target.r - self.r) * progress,
            g: self.g + (target.g - self.g) * progress,
            b: self.b + (target.b - self.b) * progress,
            a: self.a + (target.a - self.a) * progress,
        }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex_str(hex_str: &str) -> Result<Color, EngineError> {
        let hex = hex_str.trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(EngineError::InvalidParameters(format!(
                "invalid hex color '{hex_str}'"
            )));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| EngineError::InvalidParameters(format!("invalid hex color '{hex_str}'")))
        };

        match hex.len() {
            6 => Ok(Color::new(
                channel(0..2)? as f32 / 255.0,
                channel(2..4)? as f32 / 255.0,
                channel(4..6)? as f32 / 255.0,
                1.0,
            )),
            8 => Ok(Color::new(
                channel(0..2)? as f32 / 255.0,
                channel(2..4)? as f32 / 255.0,
                channel(4..6)? as f32 / 255.0,
                channel(6..8)? as f32 / 255.0,
            )),
            _ => Err(EngineError::InvalidParameters(format!(
                "hex color '{hex_str}' must have 6 or 8 digits"
            ))),
        }
    }

    /// Parse `rgb(255, 128, 0)`.
    pub fn from_rgb_str(rgb_str: &str) -> Result<Color, EngineError> {
        let inner = rgb_str.trim_start_matches("rgb(").trim_end_matches(')');
        let parts: Vec<&str> = inner.split(',').map(|s| s.trim()).collect();

        if parts.len() != 3 {
            return Err(EngineError::InvalidParameters(format!(
                "rgb color '{rgb_str}' must have 3 components"
            )));
        }

        let channel = |s: &str| {
            s.parse::<u8>().map_err(|_| {
                EngineError::InvalidParameters(format!("invalid rgb component '{s}'"))
            })
        };

        Ok(Color::new(
            channel(parts[0])? as f32 / 255.0,
            channel(parts[1])? as f32 / 255.0,
            channel(parts[2])? as f32 / 255.0,
            1.0,
        ))
    }

    /// Parse `rgba(255, 128, 0, 0.5)`.
    pub fn from_rgba_str(rgba_str: &str) -> Result<Color, EngineError> {
        let inner = rgba_str.trim_start_matches("rgba(").trim_end_matches(')');
        let parts: Vec<&str> = inner.split(',').map(|s| s.trim()).collect();

        if parts.len() != 4 {
            return Err(EngineError::InvalidParameters(format!(
                "rgba color '{rgba_str}' must have 4 components"
            )));
        }

        let channel = |s: &str| {
            s.parse::<u8>().map_err(|_| {
                EngineError::InvalidParameters(format!("invalid rgba component '{s}'"))
            })
        };
        let alpha = parts[3].parse::<f32>().map_err(|_| {
            EngineError::InvalidParameters(format!("invalid alpha component '{}'", parts[3]))
        })?;

        Ok(Color::new(
            channel(parts[0])? as f32 / 255.0,
            channel(parts[1])? as f32 / 255.0,
            channel(parts[2])? as f32 / 255.0,
            alpha,
        ))
    }

    pub fn to_hex_string(&self) -> String {
        format!(
            "#{:02X}{:02X}{:02X}{:02X}",
            (self.r * 255.0) as u8,
            (self.g * 255.0) as u8,
            (self.b * 255.0) as u8,
            (self.a * 255.0) as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_interpolation() {
        let from = PropertyValue::Number(100.0);
        let to = PropertyValue::Number(200.0);

        assert_eq!(
            from.interpolate(&to, 0.5, false),
            PropertyValue::Number(150.0)
        );
        assert_eq!(
            from.interpolate(&to, 1.0, true),
            PropertyValue::Number(200.0)
        );
    }

    #[test]
    fn test_color_interpolation_blends_channels() {
        // Mid-transition colors blend instead of snapping to the end color.
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        let blue = Color::new(0.0, 0.0, 1.0, 1.0);

        let purple = red.interpolate(&blue, 0.5);
        assert_eq!(purple.r, 0.5);
        assert_eq!(purple.g, 0.0);
        assert_eq!(purple.b, 0.5);
        assert_eq!(purple.a, 1.0);
    }

    #[test]
    fn test_generic_holds_until_completion() {
        let from = PropertyValue::Raw(serde_json::json!("visible"));
        let to = PropertyValue::Raw(serde_json::json!("hidden"));

        assert_eq!(from.interpolate(&to, 0.99, false), from);
        // Elastic overshoot past 1.0 must not flip the value early
        assert_eq!(from.interpolate(&to, 1.02, false), from);
        assert_eq!(from.interpolate(&to, 1.0, true), to);
    }

    #[test]
    fn test_kind_mismatch_holds_start() {
        let from = PropertyValue::Number(1.0);
        let to = PropertyValue::Color(Color::new(0.0, 0.0, 0.0, 1.0));

        assert_eq!(from.interpolate(&to, 0.5, false), from);
    }

    #[test]
    fn test_keyframe_swap() {
        let mut keyframe = PropertyKeyframe {
            start: PropertyValue::Number(0.0),
            end: PropertyValue::Number(10.0),
        };
        keyframe.swap();
        assert_eq!(keyframe.start, PropertyValue::Number(10.0));
        assert_eq!(keyframe.end, PropertyValue::Number(0.0));
    }

    #[test]
    fn test_color_parsing() {
        let color = Color::from_rgb_str("rgb(255, 128, 0)").unwrap();
        assert_eq!(color.r, 1.0);
        assert_eq!(color.g, 128.0 / 255.0);
        assert_eq!(color.b, 0.0);
        assert_eq!(color.a, 1.0);

        let color = Color::from_hex_str("#FF8000").unwrap();
        assert_eq!(color.g, 128.0 / 255.0);

        let color = Color::from_rgba_str("rgba(0, 0, 255, 0.5)").unwrap();
        assert_eq!(color.b, 1.0);
        assert_eq!(color.a, 0.5);
    }

    #[test]
    fn test_color_parse_rejects_malformed() {
        assert!(Color::from_hex_str("#F80").is_err());
        assert!(Color::from_rgb_str("rgb(1, 2)").is_err());
        assert!(Color::from_rgba_str("rgba(1, 2, 3, x)").is_err());
    }

    #[test]
    fn test_value_parsing() {
        assert_eq!(
            PropertyValue::parse("1.5").unwrap(),
            PropertyValue::Number(1.5)
        );
        assert!(matches!(
            PropertyValue::parse("#FF0000").unwrap(),
            PropertyValue::Color(_)
        ));
        assert!(matches!(
            PropertyValue::parse("block").unwrap(),
            PropertyValue::Raw(_)
        ));
        assert!(PropertyValue::parse("#GGGGGG").is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let color = Color::from_hex_str("#FF8000AA").unwrap();
        assert_eq!(color.to_hex_string(), "#FF8000AA");
    }
}
