//! One-off conversion of an uploaded plan to normalized EPSG:4326 GeoJSON.
//!
//! The upload is read straight through its driver, without registering a
//! dataset, so nothing of it outlives the call.

use geo_common::{ProcessError, ProcessResult, Srs};
use projection::Transformer;
use serde::Serialize;
use std::path::PathBuf;
use storage::{driver, upload};
use tracing::info;
use vector::{FeatureCollection, ProjectFile};

/// Dataset name used in errors before the upload's own name is known.
const UPLOAD: &str = "upload";

/// A converted plan upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedPlan {
    /// Stem of the selected shape source.
    pub file_name: String,
    pub geojson: FeatureCollection,
    pub input_crs: Srs,
    /// CRS named by the source, if any.
    pub original_crs: Option<String>,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl ConvertedPlan {
    /// Project file with this plan and boundaries derived from it.
    pub fn into_project(self) -> ProcessResult<ProjectFile> {
        Ok(ProjectFile::from_plan(self.geojson).complete()?)
    }
}

/// Select the shape source among `files`, read it, normalize its rates and
/// reproject it to EPSG:4326. `input_crs` applies where the source has no
/// EPSG CRS of its own.
pub async fn convert_plan(files: Vec<PathBuf>, input_crs: Srs) -> ProcessResult<ConvertedPlan> {
    tokio::task::spawn_blocking(move || convert_blocking(&files, input_crs))
        .await
        .map_err(|e| ProcessError::internal(format!("conversion task failed: {}", e)))?
}

fn convert_blocking(files: &[PathBuf], input_crs: Srs) -> ProcessResult<ConvertedPlan> {
    let spec = upload::upload_spec(files, input_crs).map_err(|e| e.into_process_error(UPLOAD))?;
    let id = spec.id.clone();
    let reader = driver::for_format(spec.format)?;

    let info = reader
        .probe(&spec)
        .map_err(|e| e.into_process_error(&id))?;
    let mut features = reader
        .open(&spec, &info)
        .and_then(|mut handle| handle.read_features())
        .map_err(|e| e.into_process_error(&id))?;

    let summary = vector::normalize_rates(&mut features)?;
    let geojson = vector::reproject_collection(&features, &Transformer::new(info.srs, Srs::Wgs84))?;

    info!(
        file_name = %id,
        features = geojson.len(),
        source_srs = %info.srs,
        original_crs = ?info.original_crs,
        rate_key = %summary.rate_key,
        "Converted plan upload"
    );

    Ok(ConvertedPlan {
        file_name: id,
        geojson,
        input_crs,
        original_crs: info.original_crs,
        min_rate: summary.min_rate,
        max_rate: summary.max_rate,
    })
}
