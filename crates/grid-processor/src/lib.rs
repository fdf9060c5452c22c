//! Spatial transform engine for the processing pipeline.
//!
//! Holds raster windows as `f64` samples, resamples them with nearest,
//! bilinear or Catmull-Rom cubic kernels and warps them between the
//! supported spatial reference systems.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!      │
//!      ▼
//! TransformEngine::reproject_raster(window, source_srs, target_grid)
//!      │
//!      ├─► Reuse cached Transformer (target SRS → source SRS)
//!      │
//!      ├─► For each output pixel center (rows in parallel)
//!      │         │
//!      │         ├─► Map into the source window
//!      │         │
//!      │         └─► Sample with the resampling kernel (nodata aware)
//!      │
//!      └─► RasterWindow on the target grid (NaN = nodata)
//! ```

pub mod engine;
pub mod error;
pub mod projection;
pub mod types;

pub use engine::TransformEngine;
pub use error::{GridProcessorError, Result};
pub use projection::{reproject_raster, sample};
pub use types::{GeoTransform, PixelWindow, RasterWindow, ResamplingMethod, TargetGrid};
