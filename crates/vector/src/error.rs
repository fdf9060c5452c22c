//! Error types for vector processing.

use geo_common::ProcessError;
use projection::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("invalid GeoJSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected a {expected}, found '{found}'")]
    WrongType { expected: &'static str, found: String },

    #[error("No unique rate key found")]
    NoUniqueRateKey,

    #[error("Rate '{0}' is not numeric in every feature")]
    InvalidRate(String),

    #[error("No positive rates in plan")]
    NoPositiveRates,

    #[error("No boundaries or plan provided")]
    MissingBoundariesAndPlan,

    #[error("No polygon features to merge")]
    NoPolygons,

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl From<VectorError> for ProcessError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Projection(e) => e.into(),
            other => ProcessError::InvalidRequest(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, VectorError>;
