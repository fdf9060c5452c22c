//! Pure-Rust GeoTIFF reader.
//!
//! Georeferencing comes from the ModelTiepoint / ModelPixelScale tags and
//! the SRS from the GeoKey directory. Sources without them need a declared
//! extent (and optionally SRS) in their [`DatasetSpec`].
//!
//! Handles of one file share a single decoded sample buffer for as long as
//! any of them is open and the file is unchanged.

use dashmap::DashMap;
use geo_common::{BoundingBox, Srs};
use grid_processor::{GeoTransform, PixelWindow, RasterWindow};
use renderer::geotiff::{
    epsg_from_geokeys, GDAL_NODATA, GEOTIFF_GEOKEYDIRECTORY, GEOTIFF_MODELPIXELSCALE,
    GEOTIFF_MODELTIEPOINT,
};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::SystemTime;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use super::{check_band, extract_band, DatasetDriver, DatasetHandle};
use crate::dataset::{DatasetInfo, DatasetSpec, DEFAULT_INPUT_SRS};
use crate::error::{DriverError, Result};

/// Decoder buffer limit.
const DEFAULT_MAX_DECODE_BYTES: usize = 1024 * 1024 * 1024;

/// Decoded samples of a file as of one modification time.
#[derive(Debug)]
struct DecodedImage {
    modified: Option<SystemTime>,
    samples: Weak<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct GeoTiffDriver {
    max_decode_bytes: usize,
    decoded: Arc<DashMap<PathBuf, DecodedImage>>,
}

impl GeoTiffDriver {
    pub fn new(max_decode_bytes: usize) -> Self {
        Self {
            max_decode_bytes,
            decoded: Arc::new(DashMap::new()),
        }
    }

    /// Samples of `path` decoded while a handle still holds them, if the
    /// file has not changed since.
    fn shared_samples(&self, path: &Path, modified: Option<SystemTime>) -> Option<Arc<Vec<f64>>> {
        let entry = self.decoded.get(path)?;
        if modified.is_none() || entry.modified != modified {
            return None;
        }
        entry.samples.upgrade()
    }

    fn decode(&self, path: &Path, info: &DatasetInfo) -> Result<Arc<Vec<f64>>> {
        let mut decoder = self.decoder(path)?;

        let (width, height) = decoder.dimensions()?;
        if (width as usize, height as usize) != (info.width, info.height) {
            return Err(DriverError::Format(format!(
                "size changed since registration: {}x{} is now {}x{}",
                info.width, info.height, width, height
            )));
        }

        let samples = decode_samples(&mut decoder)?;
        let expected = info.width * info.height * info.band_count;
        if samples.len() != expected {
            return Err(DriverError::Format(format!(
                "decoded {} samples, expected {}",
                samples.len(),
                expected
            )));
        }
        Ok(Arc::new(samples))
    }

    fn decoder(&self, path: &Path) -> Result<Decoder<BufReader<File>>> {
        let file = File::open(path)?;
        let mut limits = Limits::default();
        limits.decoding_buffer_size = self.max_decode_bytes;
        limits.intermediate_buffer_size = self.max_decode_bytes;
        limits.ifd_value_size = self.max_decode_bytes;
        Ok(Decoder::new(BufReader::new(file))?.with_limits(limits))
    }
}

impl Default for GeoTiffDriver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECODE_BYTES)
    }
}

impl DatasetDriver for GeoTiffDriver {
    fn name(&self) -> &'static str {
        "geotiff"
    }

    fn probe(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
        let path = source_path(spec)?;
        let mut decoder = self.decoder(path)?;

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let bands = band_count(decoder.colortype()?)?;

        let extent = match spec.extent {
            Some(extent) => extent,
            None => read_extent(&mut decoder, width, height)?.ok_or_else(|| {
                DriverError::Format("no georeferencing tags and no declared extent".to_string())
            })?,
        };
        if !extent.is_valid() {
            return Err(DriverError::Format(format!(
                "extent {} has no area",
                extent.cache_key()
            )));
        }

        let srs = match spec.srs {
            Some(srs) => srs,
            None => read_srs(&mut decoder)?,
        };
        let nodata = spec.nodata.or_else(|| read_nodata(&mut decoder));

        debug!(
            path = %path.display(),
            width,
            height,
            bands,
            srs = %srs,
            "Probed GeoTIFF"
        );

        Ok(DatasetInfo::raster(srs, extent, width, height, bands, nodata))
    }

    fn open(&self, spec: &DatasetSpec, info: &DatasetInfo) -> Result<Box<dyn DatasetHandle>> {
        let path = source_path(spec)?;
        let modified = modified_time(path);

        let samples = match self.shared_samples(path, modified) {
            Some(samples) => {
                debug!(path = %path.display(), "Sharing decoded GeoTIFF");
                samples
            }
            None => {
                let samples = self.decode(path, info)?;
                self.decoded.insert(
                    path.to_path_buf(),
                    DecodedImage {
                        modified,
                        samples: Arc::downgrade(&samples),
                    },
                );
                samples
            }
        };

        Ok(Box::new(GeoTiffHandle {
            path: path.to_path_buf(),
            modified,
            samples,
            width: info.width,
            height: info.height,
            bands: info.band_count,
            transform: info.geo_transform(),
            nodata: info.nodata,
        }))
    }
}

/// A fully decoded image.
struct GeoTiffHandle {
    path: PathBuf,
    modified: Option<SystemTime>,
    samples: Arc<Vec<f64>>,
    width: usize,
    height: usize,
    bands: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl DatasetHandle for GeoTiffHandle {
    /// Dead once the file is gone or has been rewritten.
    fn is_alive(&self) -> bool {
        self.path.exists() && modified_time(&self.path) == self.modified
    }

    fn read_window(&mut self, band: usize, window: PixelWindow) -> Result<RasterWindow> {
        check_band(band, self.bands)?;
        if !window.fits_within(self.width, self.height) {
            return Err(DriverError::Format(format!(
                "window {:?} exceeds {}x{} raster",
                window, self.width, self.height
            )));
        }
        let data = extract_band(&self.samples, self.width, self.bands, band, &window);
        Ok(RasterWindow::new(
            data,
            window.width,
            window.height,
            self.transform.offset(window.col_off, window.row_off),
            self.nodata,
        )?)
    }
}

fn source_path(spec: &DatasetSpec) -> Result<&Path> {
    spec.path()
        .ok_or_else(|| DriverError::Format("GeoTIFF datasets need a file path".to_string()))
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn band_count(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) | ColorType::Palette(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) | ColorType::YCbCr(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        #[allow(unreachable_patterns)]
        other => Err(DriverError::Format(format!("unsupported color type {:?}", other))),
    }
}

/// Extent from ModelTiepoint + ModelPixelScale, if both are present.
fn read_extent<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: usize,
    height: usize,
) -> Result<Option<BoundingBox>> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(GEOTIFF_MODELTIEPOINT));
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(GEOTIFF_MODELPIXELSCALE));

    let (Ok(tiepoint), Ok(scale)) = (tiepoint, scale) else {
        return Ok(None);
    };
    if tiepoint.len() < 6 || scale.len() < 2 {
        return Err(DriverError::Format("truncated georeferencing tags".to_string()));
    }

    // Tiepoint: [i, j, k, x, y, z] ties raster (i, j) to model (x, y)
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let (sx, sy) = (scale[0], scale[1]);
    let min_x = x - i * sx;
    let max_y = y + j * sy;
    Ok(Some(BoundingBox::new(
        min_x,
        max_y - height as f64 * sy,
        min_x + width as f64 * sx,
        max_y,
    )))
}

/// SRS from the GeoKey directory, defaulting when there is none.
fn read_srs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Srs> {
    let Ok(keys) = decoder.get_tag_u16_vec(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY)) else {
        return Ok(DEFAULT_INPUT_SRS);
    };
    match epsg_from_geokeys(&keys) {
        Some(code) => Srs::from_epsg(code).ok_or(DriverError::UnsupportedSrs(code)),
        None => Ok(DEFAULT_INPUT_SRS),
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
}

fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f64>> {
    Ok(match decoder.read_image()? {
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetFormat;

    fn write_geotiff(dir: &Path, srs: Srs) -> PathBuf {
        let bbox = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        let window =
            RasterWindow::new(data, 4, 4, GeoTransform::from_extent(&bbox, 4, 4), Some(-1.0))
                .unwrap();
        let bytes = renderer::encode_geotiff(&window, srs).unwrap();
        test_utils::write_fixture(dir, "d1.tif", bytes)
    }

    #[test]
    fn test_reads_georeferencing() {
        let dir = test_utils::temp_test_dir();
        let path = write_geotiff(dir.path(), Srs::Wgs84);
        let spec = DatasetSpec::file("d1", &path, DatasetFormat::GeoTiff);

        let info = GeoTiffDriver::default().probe(&spec).unwrap();
        assert_eq!(info.srs, Srs::Wgs84);
        assert_eq!(info.extent, BoundingBox::new(-10.0, -10.0, 10.0, 10.0));
        assert_eq!((info.width, info.height, info.band_count), (4, 4, 1));
        assert_eq!(info.nodata, Some(-1.0));
    }

    #[test]
    fn test_open_and_read_window() {
        let dir = test_utils::temp_test_dir();
        let path = write_geotiff(dir.path(), Srs::WebMercator);
        let spec = DatasetSpec::file("d1", &path, DatasetFormat::GeoTiff)
            .with_extent(BoundingBox::new(0.0, 0.0, 400.0, 400.0));
        let driver = GeoTiffDriver::default();
        let info = driver.probe(&spec).unwrap();
        assert_eq!(info.srs, Srs::WebMercator);
        assert_eq!(info.extent.max_x, 400.0);

        let mut handle = driver.open(&spec, &info).unwrap();
        assert!(handle.is_alive());
        let window = PixelWindow {
            col_off: 1,
            row_off: 2,
            width: 2,
            height: 2,
        };
        let w = handle.read_window(1, window).unwrap();
        assert_eq!(w.data, vec![9.0, 10.0, 13.0, 14.0]);
        assert_eq!(w.transform.origin_x, 100.0);
        assert_eq!(w.transform.origin_y, 200.0);

        std::fs::remove_file(&path).unwrap();
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_handles_share_decoded_samples() {
        let dir = test_utils::temp_test_dir();
        let path = write_geotiff(dir.path(), Srs::Wgs84);
        let spec = DatasetSpec::file("d1", &path, DatasetFormat::GeoTiff);
        let driver = GeoTiffDriver::default();
        let info = driver.probe(&spec).unwrap();

        let first = driver.open(&spec, &info).unwrap();
        let second = driver.open(&spec, &info).unwrap();
        let shared = driver.shared_samples(&path, modified_time(&path)).unwrap();
        // Two handles plus the upgraded reference
        assert_eq!(Arc::strong_count(&shared), 3);

        drop(shared);
        drop(first);
        drop(second);
        assert!(driver.shared_samples(&path, modified_time(&path)).is_none());

        // A changed file is decoded again
        let _third = driver.open(&spec, &info).unwrap();
        assert!(driver.shared_samples(&path, None).is_none());
        assert!(driver
            .shared_samples(&path, Some(SystemTime::UNIX_EPOCH))
            .is_none());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let spec = DatasetSpec::file("x", "/nonexistent/x.tif", DatasetFormat::GeoTiff);
        let err = GeoTiffDriver::default().probe(&spec).unwrap_err();
        assert!(!err.is_transient());
        let process = err.into_process_error("x");
        assert_eq!(process.error_code(), "DatasetOpenError");
        assert!(!process.to_string().contains("nonexistent"));
    }
}
