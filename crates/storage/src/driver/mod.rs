//! Dataset drivers.
//!
//! A driver probes a source once at registration and opens handles on
//! demand. Handles are owned by the [`HandlePool`](crate::HandlePool) and
//! used by one operation at a time, so they may keep per-handle state.

mod geojson;
mod geotiff;
mod memory;

#[cfg(feature = "gdal")]
mod gdal;

pub use self::geojson::GeoJsonDriver;
pub use self::geotiff::GeoTiffDriver;
pub use self::memory::MemoryDriver;

#[cfg(feature = "gdal")]
pub use self::gdal::GdalDriver;

use geo_common::{ProcessError, ProcessResult};
use grid_processor::{PixelWindow, RasterWindow};
use std::sync::Arc;
use vector::FeatureCollection;

use crate::dataset::{DatasetFormat, DatasetInfo, DatasetSpec};
use crate::error::{DriverError, Result};

/// Reads one source format.
pub trait DatasetDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read metadata without keeping anything open.
    fn probe(&self, spec: &DatasetSpec) -> Result<DatasetInfo>;

    /// Open a reader for a probed dataset.
    fn open(&self, spec: &DatasetSpec, info: &DatasetInfo) -> Result<Box<dyn DatasetHandle>>;
}

/// An open reader.
pub trait DatasetHandle: Send {
    /// Cheap liveness check run before a pooled handle is reused.
    fn is_alive(&self) -> bool {
        true
    }

    /// Read a pixel window of a 1-based band.
    fn read_window(&mut self, _band: usize, _window: PixelWindow) -> Result<RasterWindow> {
        Err(DriverError::Unsupported("raster read"))
    }

    fn read_features(&mut self) -> Result<FeatureCollection> {
        Err(DriverError::Unsupported("feature read"))
    }
}

/// Driver for a format.
pub fn for_format(format: DatasetFormat) -> ProcessResult<Arc<dyn DatasetDriver>> {
    match format {
        DatasetFormat::GeoTiff => Ok(Arc::new(GeoTiffDriver::default())),
        DatasetFormat::GeoJson => Ok(Arc::new(GeoJsonDriver)),
        DatasetFormat::Memory => Ok(Arc::new(MemoryDriver)),
        #[cfg(feature = "gdal")]
        DatasetFormat::Gdal | DatasetFormat::Shapefile => Ok(Arc::new(GdalDriver)),
        #[cfg(not(feature = "gdal"))]
        DatasetFormat::Gdal | DatasetFormat::Shapefile => Err(ProcessError::UnsupportedFormat(
            format!("{} (built without GDAL support)", format),
        )),
    }
}

pub(crate) fn check_band(band: usize, count: usize) -> Result<()> {
    if band == 0 || band > count {
        return Err(DriverError::BandOutOfRange { band, count });
    }
    Ok(())
}

/// Copy a band window out of a band-interleaved sample buffer.
pub(crate) fn extract_band(
    samples: &[f64],
    width: usize,
    bands: usize,
    band: usize,
    window: &PixelWindow,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(window.pixel_count());
    for row in window.row_off..window.row_off + window.height {
        for col in window.col_off..window.col_off + window.width {
            out.push(samples[(row * width + col) * bands + (band - 1)]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_band_interleaved() {
        // 2x2 pixels, 2 bands: band 1 = 1..4, band 2 = 10..40
        let samples = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0];
        let window = PixelWindow {
            col_off: 1,
            row_off: 0,
            width: 1,
            height: 2,
        };
        assert_eq!(extract_band(&samples, 2, 2, 2, &window), vec![20.0, 40.0]);
        assert_eq!(extract_band(&samples, 2, 2, 1, &window), vec![2.0, 4.0]);
    }

    #[test]
    fn test_check_band() {
        assert!(check_band(1, 1).is_ok());
        assert!(matches!(
            check_band(0, 1),
            Err(DriverError::BandOutOfRange { band: 0, count: 1 })
        ));
        assert!(check_band(3, 2).is_err());
    }

    #[test]
    fn test_for_format() {
        assert_eq!(for_format(DatasetFormat::GeoTiff).unwrap().name(), "geotiff");
        assert_eq!(for_format(DatasetFormat::Memory).unwrap().name(), "memory");
        #[cfg(not(feature = "gdal"))]
        assert!(matches!(
            for_format(DatasetFormat::Shapefile),
            Err(ProcessError::UnsupportedFormat(f)) if f.starts_with("shapefile")
        ));
    }
}
