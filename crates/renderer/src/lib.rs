//! Encoders turning processed rasters into artifacts.
//!
//! - Gradient/colour ramp rendering to RGBA
//! - PNG (indexed or RGBA)
//! - GeoTIFF (32-bit float, georeferenced)

pub mod error;
pub mod geotiff;
pub mod gradient;
pub mod png;
pub mod style;

pub use error::{RenderError, Result};
pub use geotiff::encode_geotiff;
pub use gradient::{render_raster, Color, RasterStyle};
pub use png::create_png_auto;
pub use style::{ColorRamp, ColorStop};

use grid_processor::RasterWindow;

/// Render a raster with `style` and encode it as PNG.
pub fn encode_png(window: &RasterWindow, style: &RasterStyle) -> Result<Vec<u8>> {
    let pixels = render_raster(window, style)?;
    create_png_auto(&pixels, window.width, window.height)
}
