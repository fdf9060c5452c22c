//! Boundary derivation by polygon union.

use geo::BooleanOps;

use crate::error::{Result, VectorError};
use crate::geojson::{Feature, FeatureCollection, Geometry};

/// Union all polygonal geometries of a collection into one geometry.
/// Non-polygonal features are ignored.
pub fn union_polygons(collection: &FeatureCollection) -> Result<Geometry> {
    let merged = collection
        .features
        .iter()
        .filter_map(|f| f.geometry.to_multi_polygon())
        .reduce(|acc, mp| acc.union(&mp))
        .ok_or(VectorError::NoPolygons)?;
    Ok(Geometry::from(&merged))
}

/// A single-feature collection holding the union of `collection`'s
/// polygons, with empty properties.
pub fn boundary_of(collection: &FeatureCollection) -> Result<FeatureCollection> {
    let geometry = union_polygons(collection)?;
    Ok(FeatureCollection::new(vec![Feature::new(geometry)]))
}
