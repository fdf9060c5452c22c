//! Geometry reprojection.

use projection::{ProjectionError, Transformer};

use crate::geojson::{FeatureCollection, Geometry, Position};

/// Reproject every position of a geometry. Any failing position fails the
/// whole geometry; vertices are never silently dropped.
pub fn reproject_geometry(
    geometry: &Geometry,
    transformer: &Transformer,
) -> Result<Geometry, ProjectionError> {
    if transformer.is_identity() {
        return Ok(geometry.clone());
    }
    geometry.try_map_positions(|p| {
        let (x, y) = transformer.transform_point(p.x, p.y)?;
        Ok(Position::new(x, y))
    })
}

/// Reproject all features of a collection. Properties and foreign members
/// are untouched, except a legacy `crs` member, which no longer applies.
pub fn reproject_collection(
    collection: &FeatureCollection,
    transformer: &Transformer,
) -> Result<FeatureCollection, ProjectionError> {
    let mut features = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let mut out = feature.clone();
        out.geometry = reproject_geometry(&feature.geometry, transformer)?;
        features.push(out);
    }
    let mut out = collection.with_features(features);
    out.foreign_members.remove("crs");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::Feature;
    use geo_common::srs::WEB_MERCATOR_EXTENT;
    use geo_common::Srs;

    #[test]
    fn test_reproject_polygon_to_web_mercator() {
        let t = Transformer::new(Srs::Wgs84, Srs::WebMercator);
        let g = Geometry::polygon(&[(0.0, 0.0), (180.0, 0.0), (180.0, 10.0)]);
        let out = reproject_geometry(&g, &t).unwrap();
        let positions = out.positions();
        assert_eq!(positions.len(), 4);
        assert!((positions[1].x - WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!(positions[0].y.abs() < 1e-9);
    }

    #[test]
    fn test_identity_is_clone() {
        let t = Transformer::new(Srs::Wgs84, Srs::Wgs84);
        let g = Geometry::point(12.5, -3.0);
        assert_eq!(reproject_geometry(&g, &t).unwrap(), g);
    }

    #[test]
    fn test_pole_fails_whole_collection() {
        let t = Transformer::new(Srs::Wgs84, Srs::WebMercator);
        let fc = FeatureCollection::new(vec![
            Feature::new(Geometry::point(0.0, 0.0)),
            Feature::new(Geometry::point(0.0, 90.0)),
        ]);
        assert!(matches!(
            reproject_collection(&fc, &t),
            Err(ProjectionError::PoleSingularity(_))
        ));
    }

    #[test]
    fn test_properties_preserved() {
        let t = Transformer::new(Srs::Wgs84, Srs::WebMercator);
        let fc = FeatureCollection::new(vec![
            Feature::new(Geometry::point(10.0, 10.0)).with_property("RATE", 120.0),
        ]);
        let mut fc = fc;
        fc.foreign_members.insert("max_rate".into(), 120.0.into());
        fc.foreign_members
            .insert("crs".into(), serde_json::json!({"type": "name"}));

        let out = reproject_collection(&fc, &t).unwrap();
        assert_eq!(out.features[0].properties["RATE"], 120.0);
        assert_eq!(out.foreign_members["max_rate"], 120.0);
        assert!(!out.foreign_members.contains_key("crs"));
    }
}
