//! Warping rasters onto a target grid.

use projection::Transformer;
use rayon::prelude::*;

use super::interpolation::sample;
use crate::error::Result;
use crate::types::{RasterWindow, ResamplingMethod, TargetGrid};

/// Warp `source` onto `target`.
///
/// `to_source` maps target-SRS coordinates into the source SRS. Each output
/// pixel center is mapped back into the source window and sampled there;
/// pixels whose mapping fails or that land outside the source are left as
/// NaN. Output rows are computed in parallel, each pixel independently, so
/// the result does not depend on thread scheduling.
pub fn reproject_raster(
    source: &RasterWindow,
    target: &TargetGrid,
    to_source: &Transformer,
    method: ResamplingMethod,
) -> Result<RasterWindow> {
    let width = target.width;
    let mut output = vec![f64::NAN; width * target.height];

    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, out) in out_row.iter_mut().enumerate() {
                let (x, y) = target.pixel_center(col, row);
                let Ok((sx, sy)) = to_source.transform_point(x, y) else {
                    continue;
                };
                let (px, py) = source.transform.geo_to_pixel(sx, sy);
                if let Some(value) = sample(source, px, py, method) {
                    *out = value;
                }
            }
        });

    RasterWindow::new(output, width, target.height, target.transform(), None)
}
