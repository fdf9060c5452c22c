//! Gradient rendering of single-band rasters to RGBA pixels.

use grid_processor::RasterWindow;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::style::ColorRamp;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }
}

/// How a raster is mapped to colours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterStyle {
    #[serde(default)]
    pub ramp: ColorRamp,
    /// Value range mapped onto the ramp; the data range when absent.
    #[serde(default)]
    pub range: Option<(f64, f64)>,
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 * (1.0 - t) + b as f64 * t).round() as u8;

    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// Colour at normalized position `t` along sorted stops.
pub fn color_at(stops: &[(f64, Color)], t: f64) -> Color {
    let Some(first) = stops.first() else {
        return Color::transparent();
    };
    if t <= first.0 {
        return first.1;
    }
    for pair in stops.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if t <= p1 {
            let span = p1 - p0;
            let local = if span > 0.0 { (t - p0) / span } else { 1.0 };
            return interpolate_color(c0, c1, local);
        }
    }
    stops[stops.len() - 1].1
}

/// Render grid data as a gradient.
///
/// NaN samples become fully transparent pixels.
///
/// # Returns
/// RGBA pixel data (4 bytes per pixel)
pub fn render_grid(
    data: &[f64],
    width: usize,
    height: usize,
    min_val: f64,
    max_val: f64,
    ramp: &ColorRamp,
) -> Result<Vec<u8>> {
    if data.len() != width * height {
        return Err(RenderError::SizeMismatch {
            expected: width * height,
            actual: data.len(),
        });
    }

    let stops = ramp.stops()?;
    let range = max_val - min_val;
    let range = if range.abs() < f64::EPSILON { 1.0 } else { range };

    let mut pixels = Vec::with_capacity(data.len() * 4);
    for &value in data {
        let color = if value.is_nan() {
            Color::transparent()
        } else {
            color_at(&stops, (value - min_val) / range)
        };
        pixels.extend_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    Ok(pixels)
}

/// Render a raster window with a style, treating its nodata as transparent.
pub fn render_raster(window: &RasterWindow, style: &RasterStyle) -> Result<Vec<u8>> {
    let (min_val, max_val) = style
        .range
        .or_else(|| window.value_range())
        .unwrap_or((0.0, 1.0));

    let data: Vec<f64> = window
        .data
        .iter()
        .map(|&v| if window.is_nodata(v) { f64::NAN } else { v })
        .collect();

    render_grid(&data, window.width, window.height, min_val, max_val, &style.ramp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_color_midpoint() {
        let c = interpolate_color(Color::new(0, 0, 0, 255), Color::new(255, 255, 255, 255), 0.5);
        assert_eq!(c, Color::new(128, 128, 128, 255));
    }

    #[test]
    fn test_color_at_clamps() {
        let stops = ColorRamp::Grayscale.stops().unwrap();
        assert_eq!(color_at(&stops, -1.0), Color::new(0, 0, 0, 255));
        assert_eq!(color_at(&stops, 2.0), Color::new(255, 255, 255, 255));
    }
}
