//! Shared test utilities for the geo processing workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Approximate float assertions
//! - Raster grid generators
//! - Extents and GeoJSON documents used across suites
//! - Temporary fixture files
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of two bounding boxes given as
/// `(min_x, min_y, max_x, max_y)` expressions with field access.
///
/// ```ignore
/// assert_bbox_approx_eq!(bbox, (-10.0, -10.0, 10.0, 10.0), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_bbox_approx_eq {
    ($bbox:expr, ($x0:expr, $y0:expr, $x1:expr, $y1:expr), $epsilon:expr) => {{
        let b = $bbox;
        $crate::assert_approx_eq!(b.min_x, $x0, $epsilon);
        $crate::assert_approx_eq!(b.min_y, $y0, $epsilon);
        $crate::assert_approx_eq!(b.max_x, $x1, $epsilon);
        $crate::assert_approx_eq!(b.max_y, $y1, $epsilon);
    }};
}
