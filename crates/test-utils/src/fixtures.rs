//! Common test fixtures.

/// Extents as `(min_x, min_y, max_x, max_y)`.
pub mod bbox {
    /// The reference raster extent in EPSG:4326.
    pub const D1_EXTENT: (f64, f64, f64, f64) = (-10.0, -10.0, 10.0, 10.0);

    /// Global geographic extent.
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Well away from `D1_EXTENT`.
    pub const PACIFIC: (f64, f64, f64, f64) = (150.0, 30.0, 160.0, 40.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// GeoJSON documents.
pub mod geojson {
    /// A two-zone application plan with a `RATE` column.
    pub const PLAN: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]},
      "properties": {"RATE": 120.0, "zone": "north"}
    },
    {
      "type": "Feature",
      "geometry": {"type": "Polygon", "coordinates": [[[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 0.0]]]},
      "properties": {"RATE": 80.0, "zone": "south"}
    },
    {
      "type": "Feature",
      "geometry": {"type": "Polygon", "coordinates": [[[0.0, 1.0], [2.0, 1.0], [2.0, 1.5], [0.0, 1.5], [0.0, 1.0]]]},
      "properties": {"RATE": 0.0, "zone": "headland"}
    }
  ]
}"#;

    /// A plan carrying both `RATE` and `Menge`.
    pub const AMBIGUOUS_PLAN: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "geometry": {"type": "Point", "coordinates": [0.5, 0.5]},
      "properties": {"RATE": 1.0, "Menge": 2.0}
    }
  ]
}"#;

    /// Mixed geometry types spread over `bbox::D1_EXTENT`.
    pub const POINTS_AND_LINES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-5.0, -5.0]}, "properties": {"name": "sw"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.0, 5.0]}, "properties": {"name": "ne"}},
    {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[-8.0, 8.0], [-6.0, 6.0]]}, "properties": {"name": "nw-line"}}
  ]
}"#;
}
