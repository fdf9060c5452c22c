//! End-to-end tests for plan documents: parsing, rate normalization,
//! project completion and reprojection.

use geo_common::{BoundingBox, Srs};
use projection::Transformer;
use test_utils::{assert_approx_eq, assert_bbox_approx_eq, geojson};
use vector::plan::RELATIVE_RATE_KEY;
use vector::{
    normalize_rates, reproject_collection, FeatureCollection, ProjectFile, VectorError,
};

// ============================================================================
// Rate normalization
// ============================================================================

#[test]
fn test_plan_rates_normalized() {
    let mut plan = FeatureCollection::from_slice(geojson::PLAN.as_bytes()).unwrap();
    let summary = normalize_rates(&mut plan).unwrap();

    assert_eq!(summary.rate_key, "RATE");
    assert_eq!(summary.min_rate, 80.0);
    assert_eq!(summary.max_rate, 120.0);

    let relative: Vec<f64> = plan
        .features
        .iter()
        .map(|f| f.properties[RELATIVE_RATE_KEY].as_f64().unwrap())
        .collect();
    assert_approx_eq!(relative[0], 1.0, 1e-12);
    assert_approx_eq!(relative[1], 80.0 / 120.0, 1e-12);
    assert_approx_eq!(relative[2], 0.0, 1e-12);

    // Other properties survive untouched
    assert_eq!(plan.features[2].properties["zone"], "headland");
}

#[test]
fn test_ambiguous_rate_key_rejected() {
    let mut plan = FeatureCollection::from_slice(geojson::AMBIGUOUS_PLAN.as_bytes()).unwrap();
    let err = normalize_rates(&mut plan).unwrap_err();
    assert!(matches!(err, VectorError::NoUniqueRateKey));

    let process_err: geo_common::ProcessError = err.into();
    assert_eq!(process_err.error_code(), "InvalidRequest");
    assert!(process_err.to_string().contains("No unique rate key found"));
}

// ============================================================================
// Project files
// ============================================================================

#[test]
fn test_plan_to_project() {
    let plan = FeatureCollection::from_slice(geojson::PLAN.as_bytes()).unwrap();
    let project = ProjectFile::from_plan(plan).complete().unwrap();

    let boundaries = project.boundaries.as_ref().unwrap();
    assert_eq!(boundaries.len(), 1);
    assert!(boundaries.features[0].geometry.is_polygonal());
    assert_bbox_approx_eq!(
        boundaries.bounding_box().unwrap(),
        (0.0, 0.0, 2.0, 1.5),
        1e-12
    );

    // Serialized project keeps the default settings
    let json: serde_json::Value = serde_json::to_value(&project).unwrap();
    assert_eq!(json["settings"]["throwing_range"], 15.0);
    assert_eq!(json["settings"]["default_speed"], 2.2);
}

#[test]
fn test_project_roundtrip_is_stable() {
    let plan = FeatureCollection::from_slice(geojson::PLAN.as_bytes()).unwrap();
    let a = serde_json::to_vec(&ProjectFile::from_plan(plan.clone()).complete().unwrap()).unwrap();
    let b = serde_json::to_vec(&ProjectFile::from_plan(plan).complete().unwrap()).unwrap();
    assert_eq!(a, b);
}

// ============================================================================
// Reprojection and filtering
// ============================================================================

#[test]
fn test_filter_then_reproject() {
    let fc = FeatureCollection::from_slice(geojson::POINTS_AND_LINES.as_bytes()).unwrap();
    let west = fc.filter_bbox(&BoundingBox::new(-10.0, -10.0, 0.0, 10.0));
    assert_eq!(west.len(), 2);

    let t = Transformer::new(Srs::Wgs84, Srs::WebMercator);
    let projected = reproject_collection(&west, &t).unwrap();
    let bbox = projected.bounding_box().unwrap();
    assert!(bbox.min_x < -800_000.0 && bbox.max_x < 0.0);
    assert_eq!(projected.features[1].properties["name"], "nw-line");
}
