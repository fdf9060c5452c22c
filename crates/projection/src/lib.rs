//! Coordinate reference system transformations.
//!
//! Implements the supported map projections from scratch: geographic
//! lon/lat, spherical Web Mercator and ellipsoidal UTM.

pub mod ellipsoid;
pub mod error;
pub mod mercator;
pub mod transform;
pub mod utm;

pub use error::ProjectionError;
pub use transform::{Transformer, DEFAULT_DENSIFY};
pub use utm::UtmZone;
