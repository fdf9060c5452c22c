//! Projection error types.

use geo_common::ProcessError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("Non-finite coordinate ({0}, {1})")]
    NonFinite(f64, f64),

    #[error("Latitude {0} is singular in Mercator")]
    PoleSingularity(f64),

    #[error("Longitude {lon} is {offset:.1} degrees from the zone {zone} meridian")]
    OutsideZone { lon: f64, zone: u8, offset: f64 },

    #[error("Extent lies outside the area of use of {0}")]
    OutsideArea(String),

    #[error("Transform produced a non-finite result")]
    Diverged,
}

impl From<ProjectionError> for ProcessError {
    fn from(err: ProjectionError) -> Self {
        ProcessError::TransformError(err.to_string())
    }
}
