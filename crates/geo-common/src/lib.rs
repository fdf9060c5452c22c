//! Common types and utilities shared across the geospatial processing crates.

pub mod artifact;
pub mod bbox;
pub mod error;
pub mod srs;
pub mod tile;

pub use artifact::{Artifact, ContentType};
pub use bbox::BoundingBox;
pub use error::{ProcessError, ProcessResult};
pub use srs::{Datum, Srs};
pub use tile::TileCoord;
