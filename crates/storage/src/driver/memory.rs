use grid_processor::{PixelWindow, RasterWindow};
use std::sync::Arc;
use vector::FeatureCollection;

use super::{check_band, DatasetDriver, DatasetHandle};
use crate::dataset::{DatasetInfo, DatasetSource, DatasetSpec, DEFAULT_INPUT_SRS};
use crate::error::{DriverError, Result};

/// Serves rasters and feature collections held in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryDriver;

impl DatasetDriver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn probe(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
        let srs = spec.srs.unwrap_or(DEFAULT_INPUT_SRS);
        match &spec.source {
            DatasetSource::Raster(raster) => Ok(DatasetInfo::raster(
                srs,
                spec.extent.unwrap_or_else(|| raster.extent()),
                raster.width,
                raster.height,
                1,
                spec.nodata.or(raster.nodata),
            )),
            DatasetSource::Features(features) => Ok(DatasetInfo::vector(
                srs,
                spec.extent
                    .or_else(|| features.bounding_box())
                    .unwrap_or_else(|| srs.valid_bounds()),
                features.len(),
            )),
            DatasetSource::Path(_) => Err(DriverError::Format(
                "memory datasets need in-memory data".to_string(),
            )),
        }
    }

    fn open(&self, spec: &DatasetSpec, info: &DatasetInfo) -> Result<Box<dyn DatasetHandle>> {
        let handle = match &spec.source {
            DatasetSource::Raster(raster) => MemoryHandle::Raster {
                raster: Arc::clone(raster),
                nodata: info.nodata,
            },
            DatasetSource::Features(features) => MemoryHandle::Features(Arc::clone(features)),
            DatasetSource::Path(_) => {
                return Err(DriverError::Format(
                    "memory datasets need in-memory data".to_string(),
                ))
            }
        };
        Ok(Box::new(handle))
    }
}

enum MemoryHandle {
    Raster {
        raster: Arc<RasterWindow>,
        nodata: Option<f64>,
    },
    Features(Arc<FeatureCollection>),
}

impl DatasetHandle for MemoryHandle {
    fn read_window(&mut self, band: usize, window: PixelWindow) -> Result<RasterWindow> {
        let MemoryHandle::Raster { raster, nodata } = self else {
            return Err(DriverError::Unsupported("raster read"));
        };
        check_band(band, 1)?;
        let mut out = raster.extract(&window)?;
        out.nodata = *nodata;
        Ok(out)
    }

    fn read_features(&mut self) -> Result<FeatureCollection> {
        match self {
            MemoryHandle::Features(features) => Ok(features.as_ref().clone()),
            MemoryHandle::Raster { .. } => Err(DriverError::Unsupported("feature read")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::{BoundingBox, Srs};
    use grid_processor::GeoTransform;
    use vector::{Feature, Geometry};

    fn raster() -> RasterWindow {
        let bbox = BoundingBox::new(0.0, 0.0, 4.0, 2.0);
        let data = (0..8).map(f64::from).collect();
        RasterWindow::new(data, 4, 2, GeoTransform::from_extent(&bbox, 4, 2), None).unwrap()
    }

    #[test]
    fn test_raster_metadata_and_read() {
        let spec = DatasetSpec::memory_raster("m", raster(), Srs::WebMercator).with_nodata(-1.0);
        let info = MemoryDriver.probe(&spec).unwrap();
        assert_eq!(info.srs, Srs::WebMercator);
        assert_eq!((info.width, info.height), (4, 2));
        assert_eq!(info.extent, BoundingBox::new(0.0, 0.0, 4.0, 2.0));
        assert_eq!(info.nodata, Some(-1.0));

        let mut handle = MemoryDriver.open(&spec, &info).unwrap();
        let window = PixelWindow {
            col_off: 2,
            row_off: 1,
            width: 2,
            height: 1,
        };
        let w = handle.read_window(1, window).unwrap();
        assert_eq!(w.data, vec![6.0, 7.0]);
        assert_eq!(w.nodata, Some(-1.0));

        assert!(handle.read_window(2, window).is_err());
        assert!(matches!(
            handle.read_features(),
            Err(DriverError::Unsupported(_))
        ));
    }

    #[test]
    fn test_vector_metadata() {
        let fc = FeatureCollection::new(vec![
            Feature::new(Geometry::point(1.0, 2.0)),
            Feature::new(Geometry::point(3.0, 5.0)),
        ]);
        let spec = DatasetSpec::memory_features("v", fc, Srs::Wgs84);
        let info = MemoryDriver.probe(&spec).unwrap();
        assert_eq!(info.feature_count, 2);
        assert_eq!(info.extent, BoundingBox::new(1.0, 2.0, 3.0, 5.0));

        let mut handle = MemoryDriver.open(&spec, &info).unwrap();
        assert_eq!(handle.read_features().unwrap().len(), 2);
    }
}
