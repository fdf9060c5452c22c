//! Colour ramp definitions.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::gradient::Color;

/// A colour at a normalized position along a ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// Position in `[0, 1]`
    pub position: f64,
    /// Hex colour, `#rrggbb` or `#rrggbbaa`
    pub color: String,
}

/// Named or custom ramp used to colour single-band rasters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRamp {
    #[default]
    Grayscale,
    Viridis,
    Terrain,
    Custom(Vec<ColorStop>),
}

impl ColorRamp {
    /// Stable name used in cache keys.
    pub fn cache_key(&self) -> String {
        match self {
            ColorRamp::Grayscale => "grayscale".to_string(),
            ColorRamp::Viridis => "viridis".to_string(),
            ColorRamp::Terrain => "terrain".to_string(),
            ColorRamp::Custom(stops) => {
                let parts: Vec<String> = stops
                    .iter()
                    .map(|s| format!("{:.6}:{}", s.position, s.color.to_lowercase()))
                    .collect();
                format!("custom[{}]", parts.join(","))
            }
        }
    }

    /// Resolve to sorted `(position, colour)` stops.
    pub fn stops(&self) -> Result<Vec<(f64, Color)>> {
        let builtin = |stops: &[(f64, (u8, u8, u8))]| {
            stops
                .iter()
                .map(|(p, (r, g, b))| (*p, Color::new(*r, *g, *b, 255)))
                .collect::<Vec<_>>()
        };

        match self {
            ColorRamp::Grayscale => Ok(builtin(&[(0.0, (0, 0, 0)), (1.0, (255, 255, 255))])),
            ColorRamp::Viridis => Ok(builtin(&[
                (0.0, (68, 1, 84)),
                (0.25, (59, 82, 139)),
                (0.5, (33, 145, 140)),
                (0.75, (94, 201, 98)),
                (1.0, (253, 231, 37)),
            ])),
            ColorRamp::Terrain => Ok(builtin(&[
                (0.0, (0, 97, 71)),
                (0.3, (94, 172, 84)),
                (0.55, (232, 214, 125)),
                (0.8, (161, 67, 0)),
                (1.0, (255, 255, 255)),
            ])),
            ColorRamp::Custom(stops) => {
                if stops.len() < 2 {
                    return Err(RenderError::InvalidRamp(
                        "a custom ramp needs at least two stops".to_string(),
                    ));
                }
                let mut resolved = Vec::with_capacity(stops.len());
                for stop in stops {
                    if !(0.0..=1.0).contains(&stop.position) {
                        return Err(RenderError::InvalidRamp(format!(
                            "stop position {} is outside [0, 1]",
                            stop.position
                        )));
                    }
                    let color = hex_to_color(&stop.color).ok_or_else(|| {
                        RenderError::InvalidRamp(format!("invalid colour '{}'", stop.color))
                    })?;
                    resolved.push((stop.position, color));
                }
                resolved.sort_by(|a, b| a.0.total_cmp(&b.0));
                Ok(resolved)
            }
        }
    }
}

/// Parse hex color string (`#rrggbb` or `#rrggbbaa`).
pub fn hex_to_color(hex: &str) -> Option<Color> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };

    Some(Color::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_color() {
        assert_eq!(hex_to_color("#ff8000"), Some(Color::new(255, 128, 0, 255)));
        assert_eq!(hex_to_color("00000080"), Some(Color::new(0, 0, 0, 128)));
        assert_eq!(hex_to_color("#fff"), None);
        assert_eq!(hex_to_color("#gg0000"), None);
    }

    #[test]
    fn test_custom_ramp_sorted_and_validated() {
        let ramp = ColorRamp::Custom(vec![
            ColorStop {
                position: 1.0,
                color: "#ffffff".into(),
            },
            ColorStop {
                position: 0.0,
                color: "#000000".into(),
            },
        ]);
        let stops = ramp.stops().unwrap();
        assert_eq!(stops[0].0, 0.0);

        let bad = ColorRamp::Custom(vec![ColorStop {
            position: 0.5,
            color: "#000000".into(),
        }]);
        assert!(bad.stops().is_err());
    }

    #[test]
    fn test_serde_forms() {
        let ramp: ColorRamp = serde_json::from_str("\"viridis\"").unwrap();
        assert_eq!(ramp, ColorRamp::Viridis);
        let custom: ColorRamp =
            serde_json::from_str(r##"{"custom":[{"position":0.0,"color":"#000000"}]}"##).unwrap();
        assert!(matches!(custom, ColorRamp::Custom(ref s) if s.len() == 1));
    }
}
