//! Core types for grid processing.

use geo_common::{BoundingBox, ProcessError, Srs};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{GridProcessorError, Result};

/// Resampling method for warping rasters.
///
/// Bilinear is the default; it decides output bytes, so changing it changes
/// every cached artifact fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    /// Nearest neighbor (preserves exact values).
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    #[default]
    Bilinear,
    /// Catmull-Rom bicubic interpolation (smoothest, more compute).
    Cubic,
}

impl ResamplingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
        }
    }
}

impl FromStr for ResamplingMethod {
    type Err = ProcessError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(ProcessError::InvalidRequest(format!(
                "unknown resampling method '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Affine mapping of a north-up grid.
///
/// Pixel `(col, row)` covers `[origin_x + col * pixel_width, +pixel_width)` in
/// x and `[origin_y - row * pixel_height, -pixel_height)` in y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X of the top-left corner
    pub origin_x: f64,
    /// Y of the top-left corner
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Positive; rows grow southwards
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Transform that spreads `width` x `height` pixels over `bbox`.
    pub fn from_extent(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self {
            origin_x: bbox.min_x,
            origin_y: bbox.max_y,
            pixel_width: bbox.width() / width.max(1) as f64,
            pixel_height: bbox.height() / height.max(1) as f64,
        }
    }

    /// Coordinate of the top-left corner of a pixel.
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y - row * self.pixel_height,
        )
    }

    /// Continuous pixel coordinates of a point (pixel centers at `i + 0.5`).
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (self.origin_y - y) / self.pixel_height,
        )
    }

    /// Extent covered by a `width` x `height` grid.
    pub fn extent(&self, width: usize, height: usize) -> BoundingBox {
        let (max_x, min_y) = self.pixel_to_geo(width as f64, height as f64);
        BoundingBox::new(self.origin_x, min_y, max_x, self.origin_y)
    }

    /// Transform of a sub-window starting at `(col_off, row_off)`.
    pub fn offset(&self, col_off: usize, row_off: usize) -> Self {
        let (origin_x, origin_y) = self.pixel_to_geo(col_off as f64, row_off as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// Pixels of a `raster_width` x `raster_height` grid touched by `bbox`,
    /// grown by `margin` pixels and clipped to the grid. `None` when the
    /// clipped window is empty.
    pub fn window_for_bbox(
        &self,
        bbox: &BoundingBox,
        raster_width: usize,
        raster_height: usize,
        margin: usize,
    ) -> Option<PixelWindow> {
        let (c0, r0) = self.geo_to_pixel(bbox.min_x, bbox.max_y);
        let (c1, r1) = self.geo_to_pixel(bbox.max_x, bbox.min_y);
        if ![c0, r0, c1, r1].iter().all(|v| v.is_finite()) {
            return None;
        }

        let margin = margin as f64;
        let col_start = (c0.min(c1).floor() - margin).max(0.0);
        let row_start = (r0.min(r1).floor() - margin).max(0.0);
        let col_end = (c0.max(c1).ceil() + margin).min(raster_width as f64);
        let row_end = (r0.max(r1).ceil() + margin).min(raster_height as f64);

        if col_end <= col_start || row_end <= row_start {
            return None;
        }

        Some(PixelWindow {
            col_off: col_start as usize,
            row_off: row_start as usize,
            width: (col_end - col_start) as usize,
            height: (row_end - row_start) as usize,
        })
    }
}

/// A rectangular block of pixels within a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    /// Window covering a whole raster.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            col_off: 0,
            row_off: 0,
            width,
            height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// True when the window lies inside a raster of the given size.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.col_off + self.width <= width && self.row_off + self.height <= height
    }
}

/// Sample data for one band of a raster region, in row-major order from the
/// top-left pixel. Values stay `f64` until the final encode step.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterWindow {
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
    /// Georeferencing of the window's top-left pixel.
    pub transform: GeoTransform,
    /// Sentinel marking missing data. NaN is always treated as missing.
    pub nodata: Option<f64>,
}

impl RasterWindow {
    pub fn new(
        data: Vec<f64>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self> {
        let expected = width * height;
        if data.len() != expected {
            return Err(GridProcessorError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            transform,
            nodata,
        })
    }

    /// Copy a sub-window out of this raster.
    pub fn extract(&self, window: &PixelWindow) -> Result<Self> {
        if !window.fits_within(self.width, self.height) {
            return Err(GridProcessorError::InvalidGrid(format!(
                "window {:?} exceeds {}x{} raster",
                window, self.width, self.height
            )));
        }

        let mut data = Vec::with_capacity(window.pixel_count());
        for row in window.row_off..window.row_off + window.height {
            let start = row * self.width + window.col_off;
            data.extend_from_slice(&self.data[start..start + window.width]);
        }

        Self::new(
            data,
            window.width,
            window.height,
            self.transform.offset(window.col_off, window.row_off),
            self.nodata,
        )
    }

    /// Whether a sample counts as missing.
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Get the value at a pixel, `None` outside the window or for nodata.
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let value = self.data[row * self.width + col];
        (!self.is_nodata(value)).then_some(value)
    }

    pub fn extent(&self) -> BoundingBox {
        self.transform.extent(self.width, self.height)
    }

    /// Minimum and maximum of the valid samples.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !self.is_nodata(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The output grid of a warp: extent, size and SRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGrid {
    pub srs: Srs,
    pub bbox: BoundingBox,
    pub width: usize,
    pub height: usize,
}

impl TargetGrid {
    pub fn new(srs: Srs, bbox: BoundingBox, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GridProcessorError::InvalidGrid(format!(
                "output size {}x{} has no pixels",
                width, height
            )));
        }
        if !bbox.is_valid() {
            return Err(GridProcessorError::InvalidGrid(format!(
                "extent {} has no area",
                bbox.cache_key()
            )));
        }
        Ok(Self {
            srs,
            bbox,
            width,
            height,
        })
    }

    pub fn transform(&self) -> GeoTransform {
        GeoTransform::from_extent(&self.bbox, self.width, self.height)
    }

    /// Center of the pixel at `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform()
            .pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_window() -> RasterWindow {
        let transform = GeoTransform::from_extent(&BoundingBox::new(0.0, 0.0, 4.0, 4.0), 4, 4);
        RasterWindow::new((0..16).map(f64::from).collect(), 4, 4, transform, Some(-9999.0))
            .unwrap()
    }

    #[test]
    fn test_resampling_from_str() {
        assert_eq!("nearest".parse::<ResamplingMethod>().unwrap(), ResamplingMethod::Nearest);
        assert_eq!("BILINEAR".parse::<ResamplingMethod>().unwrap(), ResamplingMethod::Bilinear);
        assert_eq!("bicubic".parse::<ResamplingMethod>().unwrap(), ResamplingMethod::Cubic);
        assert!("lanczos".parse::<ResamplingMethod>().is_err());
        assert_eq!(ResamplingMethod::default(), ResamplingMethod::Bilinear);
    }

    #[test]
    fn test_geo_transform_roundtrip() {
        let gt = GeoTransform::from_extent(&BoundingBox::new(-10.0, -10.0, 10.0, 10.0), 20, 20);
        assert_eq!(gt.pixel_to_geo(0.0, 0.0), (-10.0, 10.0));
        assert_eq!(gt.geo_to_pixel(0.0, 0.0), (10.0, 10.0));
        assert_eq!(gt.extent(20, 20), BoundingBox::new(-10.0, -10.0, 10.0, 10.0));
    }

    #[test]
    fn test_window_for_bbox_clips_and_pads() {
        let gt = GeoTransform::from_extent(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), 10, 10);
        let window = gt
            .window_for_bbox(&BoundingBox::new(2.5, 2.5, 4.5, 4.5), 10, 10, 1)
            .unwrap();
        assert_eq!(
            window,
            PixelWindow {
                col_off: 1,
                row_off: 4,
                width: 5,
                height: 5
            }
        );

        let edge = gt
            .window_for_bbox(&BoundingBox::new(-5.0, -5.0, 1.0, 1.0), 10, 10, 2)
            .unwrap();
        assert_eq!(edge.col_off, 0);
        assert_eq!(edge.row_off + edge.height, 10);

        assert!(gt
            .window_for_bbox(&BoundingBox::new(20.0, 20.0, 30.0, 30.0), 10, 10, 2)
            .is_none());
    }

    #[test]
    fn test_extract_and_nodata() {
        let mut raster = sample_window();
        raster.data[5] = -9999.0;
        assert_eq!(raster.get(1, 1), None);
        assert_eq!(raster.get(2, 1), Some(6.0));

        let sub = raster
            .extract(&PixelWindow {
                col_off: 1,
                row_off: 1,
                width: 2,
                height: 2,
            })
            .unwrap();
        assert_eq!(sub.data, vec![-9999.0, 6.0, 9.0, 10.0]);
        assert_eq!(sub.transform.origin_x, 1.0);
        assert_eq!(sub.transform.origin_y, 3.0);
        assert_eq!(sub.value_range(), Some((6.0, 10.0)));
    }

    #[test]
    fn test_size_mismatch() {
        let gt = GeoTransform::from_extent(&BoundingBox::new(0.0, 0.0, 1.0, 1.0), 2, 2);
        assert!(RasterWindow::new(vec![0.0; 3], 2, 2, gt, None).is_err());
        assert!(TargetGrid::new(Srs::Wgs84, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0, 5).is_err());
    }
}
