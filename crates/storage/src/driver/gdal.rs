//! Native GDAL reader, built with the `gdal` feature.
//!
//! Rasters are read band window by band window. Shapefiles, bare or
//! zipped, are read through OGR from their first layer.

use gdal::errors::GdalError;
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use geo_common::{BoundingBox, Srs};
use grid_processor::{GeoTransform, PixelWindow, RasterWindow};
use serde_json::Value;
use tracing::debug;
use vector::{Feature, FeatureCollection, Geometry, VectorError};

use super::{check_band, DatasetDriver, DatasetHandle};
use crate::dataset::{DatasetFormat, DatasetInfo, DatasetSpec, DEFAULT_INPUT_SRS};
use crate::error::{DriverError, Result};
use crate::upload::{ogr_path, resolve_source_srs};

#[derive(Debug, Default, Clone, Copy)]
pub struct GdalDriver;

fn gdal_err(err: GdalError) -> DriverError {
    DriverError::Format(err.to_string())
}

fn open_dataset(spec: &DatasetSpec) -> Result<Dataset> {
    let path = spec
        .path()
        .ok_or_else(|| DriverError::Format("GDAL datasets need a file path".to_string()))?;
    Dataset::open(path).map_err(gdal_err)
}

fn open_layers(spec: &DatasetSpec) -> Result<Dataset> {
    let path = spec
        .path()
        .ok_or_else(|| DriverError::Format("shapefile datasets need a file path".to_string()))?;
    Dataset::open(ogr_path(path)?).map_err(gdal_err)
}

fn field_json(value: Option<FieldValue>) -> Value {
    match value {
        None => Value::Null,
        Some(FieldValue::IntegerValue(v)) => Value::from(v),
        Some(FieldValue::Integer64Value(v)) => Value::from(v),
        Some(FieldValue::RealValue(v)) => Value::from(v),
        Some(FieldValue::StringValue(v)) => Value::from(v),
        Some(other) => other.into_string().map_or(Value::Null, Value::from),
    }
}

/// Features of the first layer and the layer's CRS as the source names it.
fn read_layer(ds: &Dataset) -> Result<(FeatureCollection, Option<String>)> {
    let mut layer = ds.layer(0).map_err(gdal_err)?;

    let original_crs = layer.spatial_ref().and_then(|mut srs| {
        // .prj files rarely carry an authority until one is looked up
        let _ = srs.auto_identify_epsg();
        srs.authority().or_else(|_| srs.to_proj4()).ok()
    });

    let mut features = Vec::new();
    for feature in layer.features() {
        let Some(geometry) = feature.geometry() else {
            continue;
        };
        let json = geometry.json().map_err(gdal_err)?;
        let geometry: Geometry = serde_json::from_str(&json).map_err(VectorError::from)?;
        let mut out = Feature::new(geometry);
        for (name, value) in feature.fields() {
            out.properties.insert(name, field_json(value));
        }
        features.push(out);
    }
    Ok((FeatureCollection::new(features), original_crs))
}

fn layer_info(spec: &DatasetSpec) -> Result<DatasetInfo> {
    let ds = open_layers(spec)?;
    let (features, original_crs) = read_layer(&ds)?;
    let srs = resolve_source_srs(
        original_crs.as_deref(),
        spec.srs.unwrap_or(DEFAULT_INPUT_SRS),
    )?;
    let extent = spec
        .extent
        .or_else(|| features.bounding_box())
        .unwrap_or_else(|| srs.valid_bounds());

    debug!(
        features = features.len(),
        srs = %srs,
        original_crs = ?original_crs,
        "Probed shapefile"
    );
    Ok(DatasetInfo::vector(srs, extent, features.len()).with_original_crs(original_crs))
}

impl DatasetDriver for GdalDriver {
    fn name(&self) -> &'static str {
        "gdal"
    }

    fn probe(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
        if spec.format == DatasetFormat::Shapefile {
            return layer_info(spec);
        }
        let ds = open_dataset(spec)?;
        let (width, height) = ds.raster_size();
        let bands = ds.raster_count() as usize;

        let extent = match spec.extent {
            Some(extent) => extent,
            None => {
                let gt = ds.geo_transform().map_err(gdal_err)?;
                if gt[2] != 0.0 || gt[4] != 0.0 {
                    return Err(DriverError::Format("rotated rasters are not supported".into()));
                }
                BoundingBox::new(
                    gt[0],
                    gt[3] + height as f64 * gt[5],
                    gt[0] + width as f64 * gt[1],
                    gt[3],
                )
            }
        };

        let srs = match spec.srs {
            Some(srs) => srs,
            None => match ds.spatial_ref().ok().and_then(|s| s.auth_code().ok()) {
                Some(code) => {
                    let code = code as u32;
                    Srs::from_epsg(code).ok_or(DriverError::UnsupportedSrs(code))?
                }
                None => DEFAULT_INPUT_SRS,
            },
        };

        let nodata = match spec.nodata {
            Some(nodata) => Some(nodata),
            None => ds.rasterband(1).map_err(gdal_err)?.no_data_value(),
        };

        debug!(width, height, bands, srs = %srs, "Probed GDAL dataset");
        Ok(DatasetInfo::raster(srs, extent, width, height, bands, nodata))
    }

    fn open(&self, spec: &DatasetSpec, info: &DatasetInfo) -> Result<Box<dyn DatasetHandle>> {
        if spec.format == DatasetFormat::Shapefile {
            return Ok(Box::new(GdalLayerHandle {
                dataset: open_layers(spec)?,
            }));
        }
        Ok(Box::new(GdalHandle {
            dataset: open_dataset(spec)?,
            bands: info.band_count,
            transform: info.geo_transform(),
            nodata: info.nodata,
        }))
    }
}

struct GdalHandle {
    dataset: Dataset,
    bands: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl DatasetHandle for GdalHandle {
    fn read_window(&mut self, band: usize, window: PixelWindow) -> Result<RasterWindow> {
        check_band(band, self.bands)?;
        let rasterband = self.dataset.rasterband(band as _).map_err(gdal_err)?;
        let size = (window.width, window.height);
        let buffer = rasterband
            .read_as::<f64>(
                (window.col_off as isize, window.row_off as isize),
                size,
                size,
                None,
            )
            .map_err(gdal_err)?;
        let (_, data) = buffer.into_shape_and_vec();
        Ok(RasterWindow::new(
            data,
            window.width,
            window.height,
            self.transform.offset(window.col_off, window.row_off),
            self.nodata,
        )?)
    }
}

struct GdalLayerHandle {
    dataset: Dataset,
}

impl DatasetHandle for GdalLayerHandle {
    fn read_features(&mut self) -> Result<FeatureCollection> {
        Ok(read_layer(&self.dataset)?.0)
    }
}
