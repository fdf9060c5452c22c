//! Resampling and reprojection of raster windows.

pub mod interpolation;
pub mod reproject;

pub use interpolation::{bilinear_interpolate, cubic_interpolate, nearest_interpolate, sample};
pub use reproject::reproject_raster;
