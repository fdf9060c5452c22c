//! Dataset descriptions and probed metadata.

use geo_common::{BoundingBox, ProcessError, Srs};
use grid_processor::{GeoTransform, RasterWindow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vector::FeatureCollection;

use crate::driver::DatasetDriver;

/// SRS assumed for sources that carry no usable EPSG code.
pub const DEFAULT_INPUT_SRS: Srs = Srs::Wgs84;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Raster,
    Vector,
}

/// Source format, which selects the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    GeoTiff,
    GeoJson,
    /// ESRI shapefile, bare or zipped. Read through GDAL/OGR.
    Shapefile,
    Memory,
    Gdal,
}

impl DatasetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFormat::GeoTiff => "geotiff",
            DatasetFormat::GeoJson => "geojson",
            DatasetFormat::Shapefile => "shapefile",
            DatasetFormat::Memory => "memory",
            DatasetFormat::Gdal => "gdal",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "tif" | "tiff" => Some(DatasetFormat::GeoTiff),
            "json" | "geojson" => Some(DatasetFormat::GeoJson),
            "shp" | "zip" => Some(DatasetFormat::Shapefile),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetFormat {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "geotiff" | "tiff" | "tif" => Ok(DatasetFormat::GeoTiff),
            "geojson" | "json" => Ok(DatasetFormat::GeoJson),
            "shapefile" | "shp" | "zip" => Ok(DatasetFormat::Shapefile),
            "memory" => Ok(DatasetFormat::Memory),
            "gdal" => Ok(DatasetFormat::Gdal),
            _ => Err(ProcessError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Where a dataset's data lives.
#[derive(Clone)]
pub enum DatasetSource {
    Path(PathBuf),
    Raster(Arc<RasterWindow>),
    Features(Arc<FeatureCollection>),
}

impl fmt::Debug for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            DatasetSource::Raster(r) => write!(f, "Raster({}x{})", r.width, r.height),
            DatasetSource::Features(fc) => write!(f, "Features({})", fc.len()),
        }
    }
}

/// Registration request for a dataset.
///
/// `srs`, `extent` and `nodata` override or complete what the driver finds
/// in the source. For vector files `srs` is the input CRS: it applies only
/// where the source has no EPSG CRS of its own.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub id: String,
    pub source: DatasetSource,
    pub format: DatasetFormat,
    pub srs: Option<Srs>,
    pub extent: Option<BoundingBox>,
    pub nodata: Option<f64>,
}

impl DatasetSpec {
    pub fn file(id: impl Into<String>, path: impl Into<PathBuf>, format: DatasetFormat) -> Self {
        Self::new(id, DatasetSource::Path(path.into()), format)
    }

    pub fn memory_raster(id: impl Into<String>, raster: RasterWindow, srs: Srs) -> Self {
        Self::new(id, DatasetSource::Raster(Arc::new(raster)), DatasetFormat::Memory)
            .with_srs(srs)
    }

    pub fn memory_features(id: impl Into<String>, features: FeatureCollection, srs: Srs) -> Self {
        Self::new(
            id,
            DatasetSource::Features(Arc::new(features)),
            DatasetFormat::Memory,
        )
        .with_srs(srs)
    }

    fn new(id: impl Into<String>, source: DatasetSource, format: DatasetFormat) -> Self {
        Self {
            id: id.into(),
            source,
            format,
            srs: None,
            extent: None,
            nodata: None,
        }
    }

    pub fn with_srs(mut self, srs: Srs) -> Self {
        self.srs = Some(srs);
        self
    }

    pub fn with_extent(mut self, extent: BoundingBox) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// File path of a file-backed source.
    pub fn path(&self) -> Option<&std::path::Path> {
        match &self.source {
            DatasetSource::Path(p) => Some(p),
            _ => None,
        }
    }
}

/// Metadata probed once at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub kind: DatasetKind,
    pub srs: Srs,
    pub extent: BoundingBox,
    /// Raster size in pixels; zero for vector datasets.
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub nodata: Option<f64>,
    pub feature_count: usize,
    /// CRS as written in the source, when it names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_crs: Option<String>,
}

impl DatasetInfo {
    pub fn raster(
        srs: Srs,
        extent: BoundingBox,
        width: usize,
        height: usize,
        band_count: usize,
        nodata: Option<f64>,
    ) -> Self {
        Self {
            kind: DatasetKind::Raster,
            srs,
            extent,
            width,
            height,
            band_count,
            nodata,
            feature_count: 0,
            original_crs: None,
        }
    }

    pub fn vector(srs: Srs, extent: BoundingBox, feature_count: usize) -> Self {
        Self {
            kind: DatasetKind::Vector,
            srs,
            extent,
            width: 0,
            height: 0,
            band_count: 0,
            nodata: None,
            feature_count,
            original_crs: None,
        }
    }

    pub fn with_original_crs(mut self, crs: Option<String>) -> Self {
        self.original_crs = crs;
        self
    }

    /// Pixel grid of a raster dataset.
    pub fn geo_transform(&self) -> GeoTransform {
        GeoTransform::from_extent(&self.extent, self.width, self.height)
    }
}

/// A registered dataset: immutable description plus a version counter.
pub struct Dataset {
    spec: DatasetSpec,
    info: DatasetInfo,
    driver: Arc<dyn DatasetDriver>,
    version: AtomicU64,
}

impl Dataset {
    pub(crate) fn new(spec: DatasetSpec, info: DatasetInfo, driver: Arc<dyn DatasetDriver>) -> Self {
        Self {
            spec,
            info,
            driver,
            version: AtomicU64::new(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    pub fn driver(&self) -> &Arc<dyn DatasetDriver> {
        &self.driver
    }

    /// Current version. Starts at 1.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Advance the version, returning the new value.
    pub fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.spec.id)
            .field("driver", &self.driver.name())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_format_parsing() {
        assert_eq!("GeoTIFF".parse::<DatasetFormat>().unwrap(), DatasetFormat::GeoTiff);
        assert_eq!("json".parse::<DatasetFormat>().unwrap(), DatasetFormat::GeoJson);
        assert_eq!("SHP".parse::<DatasetFormat>().unwrap(), DatasetFormat::Shapefile);
        assert!(matches!(
            "kml".parse::<DatasetFormat>(),
            Err(ProcessError::UnsupportedFormat(_))
        ));
        assert_eq!(
            DatasetFormat::from_extension(Path::new("/data/dem.TIF")),
            Some(DatasetFormat::GeoTiff)
        );
        assert_eq!(
            DatasetFormat::from_extension(Path::new("plan.shp")),
            Some(DatasetFormat::Shapefile)
        );
        assert_eq!(
            DatasetFormat::from_extension(Path::new("upload.zip")),
            Some(DatasetFormat::Shapefile)
        );
        assert_eq!(DatasetFormat::from_extension(Path::new("plan.kml")), None);
    }

    #[test]
    fn test_info_geo_transform() {
        let info = DatasetInfo::raster(
            Srs::Wgs84,
            BoundingBox::new(-10.0, -10.0, 10.0, 10.0),
            20,
            10,
            1,
            None,
        );
        let gt = info.geo_transform();
        assert_eq!(gt.pixel_width, 1.0);
        assert_eq!(gt.pixel_height, 2.0);
        assert_eq!((gt.origin_x, gt.origin_y), (-10.0, 10.0));
    }
}
