//! Interpolation methods for raster resampling.
//!
//! Sample positions are continuous pixel coordinates as produced by
//! [`GeoTransform::geo_to_pixel`](crate::types::GeoTransform::geo_to_pixel):
//! pixel `(c, r)` covers `[c, c + 1) x [r, r + 1)` and its center sits at
//! `(c + 0.5, r + 0.5)`. `None` means nodata.

use crate::types::{RasterWindow, ResamplingMethod};

/// Sample a raster at a continuous pixel position with the given method.
pub fn sample(raster: &RasterWindow, x: f64, y: f64, method: ResamplingMethod) -> Option<f64> {
    match method {
        ResamplingMethod::Nearest => nearest_interpolate(raster, x, y),
        ResamplingMethod::Bilinear => bilinear_interpolate(raster, x, y),
        ResamplingMethod::Cubic => cubic_interpolate(raster, x, y),
    }
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the pixel containing the position.
pub fn nearest_interpolate(raster: &RasterWindow, x: f64, y: f64) -> Option<f64> {
    if !(x >= 0.0 && y >= 0.0) {
        return None;
    }
    raster.get(x.floor() as usize, y.floor() as usize)
}

/// Bilinear interpolation.
///
/// Smoothly interpolates between the four nearest pixel centers. When any
/// of them is nodata the nearest pixel is used instead.
pub fn bilinear_interpolate(raster: &RasterWindow, x: f64, y: f64) -> Option<f64> {
    let nearest = nearest_interpolate(raster, x, y)?;

    let sx = x - 0.5;
    let sy = y - 0.5;
    let x0 = sx.floor();
    let y0 = sy.floor();
    let xf = sx - x0;
    let yf = sy - y0;

    let clamp_col = |c: f64| c.clamp(0.0, (raster.width - 1) as f64) as usize;
    let clamp_row = |r: f64| r.clamp(0.0, (raster.height - 1) as f64) as usize;
    let (c0, c1) = (clamp_col(x0), clamp_col(x0 + 1.0));
    let (r0, r1) = (clamp_row(y0), clamp_row(y0 + 1.0));

    let corners = (
        raster.get(c0, r0),
        raster.get(c1, r0),
        raster.get(c0, r1),
        raster.get(c1, r1),
    );
    let (Some(v00), Some(v10), Some(v01), Some(v11)) = corners else {
        return Some(nearest);
    };

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    Some(top * (1.0 - yf) + bottom * yf)
}

/// Bicubic interpolation.
///
/// Uses the 16 surrounding pixels with a Catmull-Rom kernel; falls back to
/// the nearest pixel when any of them is nodata.
pub fn cubic_interpolate(raster: &RasterWindow, x: f64, y: f64) -> Option<f64> {
    let nearest = nearest_interpolate(raster, x, y)?;

    let sx = x - 0.5;
    let sy = y - 0.5;
    let xi = sx.floor() as i64;
    let yi = sy.floor() as i64;
    let xf = sx - xi as f64;
    let yf = sy - yi as f64;

    let mut values = [[0.0f64; 4]; 4];
    for (j, row) in values.iter_mut().enumerate() {
        for (i, value) in row.iter_mut().enumerate() {
            let px = (xi + i as i64 - 1).clamp(0, raster.width as i64 - 1) as usize;
            let py = (yi + j as i64 - 1).clamp(0, raster.height as i64 - 1) as usize;
            match raster.get(px, py) {
                Some(v) => *value = v,
                None => return Some(nearest),
            }
        }
    }

    let mut row_values = [0.0f64; 4];
    for (j, row) in values.iter().enumerate() {
        row_values[j] = cubic_1d(row[0], row[1], row[2], row[3], xf);
    }

    Some(cubic_1d(
        row_values[0],
        row_values[1],
        row_values[2],
        row_values[3],
        yf,
    ))
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}
