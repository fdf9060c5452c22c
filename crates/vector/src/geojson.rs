//! GeoJSON vector model.
//!
//! Covers the six simple geometry types. Positions with a third (or
//! further) ordinate are accepted on input and reduced to `x, y`. Feature
//! properties are kept in a `serde_json::Map`, whose keys serialize in
//! sorted order, so encoding the same collection twice yields the same
//! bytes.

use geo::{Coord, LineString as GeoLineString, MultiPolygon as GeoMultiPolygon};
use geo::{Polygon as GeoPolygon};
use geo_common::BoundingBox;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, VectorError};

/// Feature properties.
pub type Properties = Map<String, Value>;

/// A 2D position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> std::result::Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y, ..] => Ok(Position::new(*x, *y)),
            _ => Err(format!(
                "position needs at least two coordinates, got {}",
                values.len()
            )),
        }
    }
}

impl From<Position> for Vec<f64> {
    fn from(p: Position) -> Self {
        vec![p.x, p.y]
    }
}

/// GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    /// Exterior ring first, then holes.
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point {
            coordinates: Position::new(x, y),
        }
    }

    /// Single-ring polygon from `(x, y)` pairs. The ring is closed if needed.
    pub fn polygon(ring: &[(f64, f64)]) -> Self {
        let mut ring: Vec<Position> = ring.iter().map(|&(x, y)| Position::new(x, y)).collect();
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        Geometry::Polygon {
            coordinates: vec![ring],
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(self, Geometry::Polygon { .. } | Geometry::MultiPolygon { .. })
    }

    /// Every position of the geometry, in document order.
    pub fn positions(&self) -> Vec<Position> {
        match self {
            Geometry::Point { coordinates } => vec![*coordinates],
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.clone()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().copied().collect()
            }
        }
    }

    /// Bounding box of all positions; `None` for an empty geometry.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        bounds_of(self.positions().into_iter())
    }

    /// Apply a fallible mapping to every position, keeping the structure.
    pub fn try_map_positions<E, F>(&self, mut f: F) -> std::result::Result<Geometry, E>
    where
        F: FnMut(Position) -> std::result::Result<Position, E>,
    {
        let mut map_line = |line: &[Position]| -> std::result::Result<Vec<Position>, E> {
            line.iter().map(|p| f(*p)).collect()
        };

        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: map_line(std::slice::from_ref(coordinates))?[0],
            },
            Geometry::MultiPoint { coordinates } => Geometry::MultiPoint {
                coordinates: map_line(coordinates)?,
            },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: map_line(coordinates)?,
            },
            Geometry::MultiLineString { coordinates } => Geometry::MultiLineString {
                coordinates: coordinates
                    .iter()
                    .map(|l| map_line(l))
                    .collect::<std::result::Result<_, _>>()?,
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates
                    .iter()
                    .map(|r| map_line(r))
                    .collect::<std::result::Result<_, _>>()?,
            },
            Geometry::MultiPolygon { coordinates } => {
                let mut polygons = Vec::with_capacity(coordinates.len());
                for polygon in coordinates {
                    polygons.push(
                        polygon
                            .iter()
                            .map(|r| map_line(r))
                            .collect::<std::result::Result<Vec<_>, _>>()?,
                    );
                }
                Geometry::MultiPolygon {
                    coordinates: polygons,
                }
            }
        })
    }

    /// Convert polygonal geometry into a `geo` multipolygon.
    pub fn to_multi_polygon(&self) -> Option<GeoMultiPolygon<f64>> {
        match self {
            Geometry::Polygon { coordinates } => {
                Some(GeoMultiPolygon::new(vec![rings_to_polygon(coordinates)]))
            }
            Geometry::MultiPolygon { coordinates } => Some(GeoMultiPolygon::new(
                coordinates.iter().map(|p| rings_to_polygon(p)).collect(),
            )),
            _ => None,
        }
    }
}

impl From<&GeoMultiPolygon<f64>> for Geometry {
    /// Single-member multipolygons collapse to `Polygon`.
    fn from(mp: &GeoMultiPolygon<f64>) -> Self {
        let polygons: Vec<Vec<Vec<Position>>> = mp.0.iter().map(polygon_to_rings).collect();
        if polygons.len() == 1 {
            let mut polygons = polygons;
            Geometry::Polygon {
                coordinates: polygons.remove(0),
            }
        } else {
            Geometry::MultiPolygon {
                coordinates: polygons,
            }
        }
    }
}

fn rings_to_polygon(rings: &[Vec<Position>]) -> GeoPolygon<f64> {
    let to_line = |ring: &Vec<Position>| {
        GeoLineString::new(ring.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
    };
    let mut iter = rings.iter();
    let exterior = iter.next().map(to_line).unwrap_or_else(|| GeoLineString::new(Vec::new()));
    GeoPolygon::new(exterior, iter.map(to_line).collect())
}

fn polygon_to_rings(polygon: &GeoPolygon<f64>) -> Vec<Vec<Position>> {
    let to_ring =
        |line: &GeoLineString<f64>| line.0.iter().map(|c| Position::new(c.x, c.y)).collect();
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(to_ring)
        .collect()
}

fn bounds_of(positions: impl Iterator<Item = Position>) -> Option<BoundingBox> {
    positions.fold(None, |acc, p| {
        Some(match acc {
            None => BoundingBox::new(p.x, p.y, p.x, p.y),
            Some(b) => BoundingBox::new(
                b.min_x.min(p.x),
                b.min_y.min(p.y),
                b.max_x.max(p.x),
                b.max_y.max(p.y),
            ),
        })
    })
}

/// Closed-interval overlap; degenerate boxes (points, axis-aligned lines)
/// still match.
fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min_x <= b.max_x && a.max_x >= b.min_x && a.min_y <= b.max_y && a.max_y >= b.min_y
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

/// A GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    pub geometry: Geometry,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<Feature>,

    /// Top-level members beyond `type` and `features`.
    #[serde(flatten)]
    pub foreign_members: Properties,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features,
            foreign_members: Properties::new(),
        }
    }

    /// Same top-level members, different features.
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self {
            type_: self.type_.clone(),
            features,
            foreign_members: self.foreign_members.clone(),
        }
    }

    /// Parse and check the top-level type.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_slice(bytes)?;
        if collection.type_ != "FeatureCollection" {
            return Err(VectorError::WrongType {
                expected: "FeatureCollection",
                found: collection.type_,
            });
        }
        Ok(collection)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Bounding box over all features.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        bounds_of(self.features.iter().flat_map(|f| f.geometry.positions()))
    }

    /// Keep features whose bounds touch `bbox`. Order is preserved.
    pub fn filter_bbox(&self, bbox: &BoundingBox) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .filter(|f| {
                f.geometry
                    .bounding_box()
                    .is_some_and(|b| overlaps(&b, bbox))
            })
            .cloned()
            .collect();
        self.with_features(features)
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0, 30.0]},
             "properties": {"name": "a"}},
            {"type": "Feature", "geometry": {"type": "LineString",
             "coordinates": [[5.0, 5.0], [6.0, 7.0]]}, "properties": null}
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let fc = FeatureCollection::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].geometry, Geometry::point(1.0, 2.0));
        assert!(fc.features[1].properties.is_empty());
        assert_eq!(fc.features[1].geometry.type_name(), "LineString");
    }

    #[test]
    fn test_wrong_top_level_type() {
        let err = FeatureCollection::from_slice(br#"{"type": "Feature", "features": []}"#);
        assert!(matches!(err, Err(VectorError::WrongType { .. })));
    }

    #[test]
    fn test_short_position_rejected() {
        let json = r#"{"type": "Point", "coordinates": [1.0]}"#;
        assert!(serde_json::from_str::<Geometry>(json).is_err());
    }

    #[test]
    fn test_bounding_box_and_filter() {
        let fc = FeatureCollection::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(fc.bounding_box(), Some(BoundingBox::new(1.0, 2.0, 6.0, 7.0)));

        let filtered = fc.filter_bbox(&BoundingBox::new(0.0, 0.0, 1.0, 2.0));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.features[0].properties["name"], "a");
    }

    #[test]
    fn test_foreign_members_survive_filtering() {
        let json = r#"{"type": "FeatureCollection", "name": "plan", "max_rate": 120.5,
            "features": [{"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 1]},
            "properties": {}}]}"#;
        let fc = FeatureCollection::from_slice(json.as_bytes()).unwrap();
        assert_eq!(fc.foreign_members["name"], "plan");
        assert!(!fc.foreign_members.contains_key("features"));

        let empty = fc.filter_bbox(&BoundingBox::new(5.0, 5.0, 6.0, 6.0));
        assert!(empty.is_empty());
        assert_eq!(empty.foreign_members["max_rate"], 120.5);

        let out: Value = serde_json::from_slice(&empty.to_vec().unwrap()).unwrap();
        assert_eq!(out["name"], "plan");
        assert_eq!(out["features"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_polygon_closes_ring() {
        let g = Geometry::polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let Geometry::Polygon { coordinates } = &g else {
            panic!("expected polygon");
        };
        assert_eq!(coordinates[0].len(), 4);
        assert_eq!(coordinates[0][0], coordinates[0][3]);
        assert!(g.is_polygonal());
    }

    #[test]
    fn test_multi_polygon_roundtrip_through_geo() {
        let g = Geometry::polygon(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        let mp = g.to_multi_polygon().unwrap();
        assert_eq!(Geometry::from(&mp), g);
        assert!(Geometry::point(0.0, 0.0).to_multi_polygon().is_none());
    }

    #[test]
    fn test_properties_serialize_sorted() {
        let f = Feature::new(Geometry::point(0.0, 0.0))
            .with_property("zeta", 1)
            .with_property("alpha", 2);
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
    }
}
