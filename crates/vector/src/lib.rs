//! Vector data support: a GeoJSON model, geometry reprojection, boundary
//! derivation, plan-rate normalization and project files.

pub mod boundary;
pub mod error;
pub mod geojson;
pub mod plan;
pub mod project;
pub mod reproject;

pub use boundary::{boundary_of, union_polygons};
pub use error::{Result, VectorError};
pub use geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
pub use plan::{normalize_rates, PlanSummary};
pub use project::{ProjectFile, Settings};
pub use reproject::{reproject_collection, reproject_geometry};
