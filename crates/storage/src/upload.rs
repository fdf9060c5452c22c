//! Picking the shape source out of a set of uploaded files.
//!
//! Exactly one file of an upload may be a shape source: a `.shp` with its
//! sidecars next to it, a zipped shapefile, or a GeoJSON document. Inside a
//! zip, exactly one `.shp` member may live outside the `__MACOSX/` and
//! `Rx/` folders.

use geo_common::Srs;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::dataset::{DatasetFormat, DatasetSpec};
use crate::error::{DriverError, Result};

/// Extensions accepted as shape sources.
pub const SHAPE_EXTENSIONS: [&str; 4] = ["shp", "zip", "json", "geojson"];

/// Archive folders that never hold the plan itself.
const IGNORED_ZIP_FOLDERS: [&str; 2] = ["__MACOSX/", "Rx/"];

fn extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_lowercase())
}

fn single<T>(mut candidates: impl Iterator<Item = T>) -> Result<T> {
    match (candidates.next(), candidates.next()) {
        (Some(only), None) => Ok(only),
        (None, _) => Err(DriverError::NoShapeData),
        (Some(_), Some(_)) => Err(DriverError::TooManyFiles),
    }
}

/// The one shape source among `files`.
pub fn select_shape_source(files: &[PathBuf]) -> Result<&Path> {
    single(
        files
            .iter()
            .filter(|f| extension(f).is_some_and(|e| SHAPE_EXTENSIONS.contains(&e.as_str())))
            .map(PathBuf::as_path),
    )
}

/// Name of the one shapefile inside a zip archive.
pub fn shapefile_in_zip(path: &Path) -> Result<String> {
    let archive = ZipArchive::new(File::open(path)?)?;
    let member = single(archive.file_names().filter(|name| {
        name.to_lowercase().ends_with(".shp")
            && !IGNORED_ZIP_FOLDERS.iter().any(|dir| name.starts_with(dir))
    }))?;
    Ok(member.to_string())
}

/// Path handed to OGR. Zipped shapefiles are read in place through
/// `/vsizip/`.
pub fn ogr_path(path: &Path) -> Result<PathBuf> {
    if extension(path).as_deref() != Some("zip") {
        return Ok(path.to_path_buf());
    }
    let member = shapefile_in_zip(path)?;
    Ok(PathBuf::from(format!("/vsizip/{}/{}", path.display(), member)))
}

/// EPSG code of an `EPSG:nnnn` string (4 or 5 digits, either case of the
/// prefix).
fn epsg_code(crs: &str) -> Option<u32> {
    let digits = crs
        .strip_prefix("EPSG:")
        .or_else(|| crs.strip_prefix("epsg:"))?;
    if !(4..=5).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// SRS of a vector source. A source CRS written as an EPSG code is used
/// as is; anything else, or no CRS at all, is replaced by `input`.
pub fn resolve_source_srs(original: Option<&str>, input: Srs) -> Result<Srs> {
    match original.and_then(epsg_code) {
        Some(code) => Srs::from_epsg(code).ok_or(DriverError::UnsupportedSrs(code)),
        None => Ok(input),
    }
}

/// Dataset spec for an upload, named after the shape source's file stem.
/// `input_crs` applies where the source has no EPSG CRS of its own.
pub fn upload_spec(files: &[PathBuf], input_crs: Srs) -> Result<DatasetSpec> {
    let source = select_shape_source(files)?;
    let format = DatasetFormat::from_extension(source).ok_or(DriverError::NoShapeData)?;
    let id = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .to_string();

    debug!(
        source = %source.display(),
        files = files.len(),
        format = %format,
        "Selected shape source"
    );
    Ok(DatasetSpec::file(id, source, format).with_srs(input_crs))
}
