//! GeoJSON feature collections.
//!
//! RFC 7946 GeoJSON is always EPSG:4326, but older exports name their CRS
//! in a top-level `crs` member. An EPSG name there is honored; otherwise
//! the dataset's declared SRS, or EPSG:4326, applies.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use vector::FeatureCollection;

use super::{DatasetDriver, DatasetHandle};
use crate::dataset::{DatasetInfo, DatasetSource, DatasetSpec, DEFAULT_INPUT_SRS};
use crate::error::{DriverError, Result};
use crate::upload::resolve_source_srs;

#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonDriver;

fn load(path: &Path) -> Result<FeatureCollection> {
    let bytes = std::fs::read(path)?;
    Ok(FeatureCollection::from_slice(&bytes)?)
}

/// Name from a legacy `{"crs": {"type": "name", "properties": {"name": ...}}}`
/// member.
fn named_crs(features: &FeatureCollection) -> Option<String> {
    let name = features.foreign_members.get("crs")?.get("properties")?.get("name")?;
    name.as_str().map(str::to_string)
}

fn source_path(spec: &DatasetSpec) -> Result<&Path> {
    match &spec.source {
        DatasetSource::Path(p) => Ok(p),
        _ => Err(DriverError::Format(
            "GeoJSON datasets need a file path".to_string(),
        )),
    }
}

impl DatasetDriver for GeoJsonDriver {
    fn name(&self) -> &'static str {
        "geojson"
    }

    fn probe(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
        let path = source_path(spec)?;
        let features = load(path)?;
        let original_crs = named_crs(&features);
        let srs = resolve_source_srs(
            original_crs.as_deref(),
            spec.srs.unwrap_or(DEFAULT_INPUT_SRS),
        )?;
        let extent = spec
            .extent
            .or_else(|| features.bounding_box())
            .unwrap_or_else(|| srs.valid_bounds());

        debug!(
            path = %path.display(),
            features = features.len(),
            srs = %srs,
            original_crs = ?original_crs,
            "Probed GeoJSON"
        );
        Ok(DatasetInfo::vector(srs, extent, features.len()).with_original_crs(original_crs))
    }

    fn open(&self, spec: &DatasetSpec, _info: &DatasetInfo) -> Result<Box<dyn DatasetHandle>> {
        let features = load(source_path(spec)?)?;
        Ok(Box::new(GeoJsonHandle {
            features: Arc::new(features),
        }))
    }
}

struct GeoJsonHandle {
    features: Arc<FeatureCollection>,
}

impl DatasetHandle for GeoJsonHandle {
    fn read_features(&mut self) -> Result<FeatureCollection> {
        Ok(self.features.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetFormat;
    use geo_common::{BoundingBox, Srs};

    #[test]
    fn test_metadata_and_read() {
        let dir = test_utils::temp_test_dir();
        let path = test_utils::write_fixture(dir.path(), "plan.geojson", test_utils::geojson::PLAN);
        let spec = DatasetSpec::file("plan", path, DatasetFormat::GeoJson);

        let info = GeoJsonDriver.probe(&spec).unwrap();
        assert_eq!(info.feature_count, 3);
        assert_eq!(info.srs, DEFAULT_INPUT_SRS);
        assert_eq!(info.extent, BoundingBox::new(0.0, 0.0, 2.0, 1.5));

        let mut handle = GeoJsonDriver.open(&spec, &info).unwrap();
        assert_eq!(handle.read_features().unwrap().len(), 3);
        assert!(handle
            .read_window(1, grid_processor::PixelWindow::full(1, 1))
            .is_err());
    }

    #[test]
    fn test_legacy_crs_member() {
        let dir = test_utils::temp_test_dir();
        let doc = |crs: &str| {
            format!(
                r#"{{"type": "FeatureCollection",
                    "crs": {{"type": "name", "properties": {{"name": "{}"}}}},
                    "features": [{{"type": "Feature", "properties": {{}},
                    "geometry": {{"type": "Point", "coordinates": [500000.0, 5000000.0]}}}}]}}"#,
                crs
            )
        };

        let path = test_utils::write_fixture(dir.path(), "utm.geojson", doc("EPSG:32632"));
        let spec = DatasetSpec::file("utm", path, DatasetFormat::GeoJson).with_srs(Srs::WebMercator);
        let info = GeoJsonDriver.probe(&spec).unwrap();
        assert_eq!(info.srs, Srs::from_epsg(32632).unwrap());
        assert_eq!(info.original_crs.as_deref(), Some("EPSG:32632"));

        // Not an EPSG code: the declared SRS applies
        let path = test_utils::write_fixture(
            dir.path(),
            "urn.geojson",
            doc("urn:ogc:def:crs:OGC:1.3:CRS84"),
        );
        let spec = DatasetSpec::file("urn", path, DatasetFormat::GeoJson).with_srs(Srs::WebMercator);
        let info = GeoJsonDriver.probe(&spec).unwrap();
        assert_eq!(info.srs, Srs::WebMercator);
        assert_eq!(info.original_crs.as_deref(), Some("urn:ogc:def:crs:OGC:1.3:CRS84"));
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let dir = test_utils::temp_test_dir();
        let path = test_utils::write_fixture(dir.path(), "bad.geojson", "{not json");
        let spec = DatasetSpec::file("bad", path, DatasetFormat::GeoJson);
        let err = GeoJsonDriver.probe(&spec).unwrap_err();
        assert!(matches!(err, DriverError::Vector(_)));
        assert!(!err.is_transient());
    }
}
