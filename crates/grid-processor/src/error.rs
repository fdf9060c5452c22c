//! Error types for grid processing.

use geo_common::ProcessError;
use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Sample buffer does not match the declared dimensions.
    #[error("grid of {width}x{height} needs {expected} samples, got {actual}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    /// Target grid has no pixels or no area.
    #[error("invalid target grid: {0}")]
    InvalidGrid(String),

    /// Coordinate transform failure.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl From<GridProcessorError> for ProcessError {
    fn from(err: GridProcessorError) -> Self {
        match err {
            GridProcessorError::Projection(e) => e.into(),
            GridProcessorError::InvalidGrid(msg) => ProcessError::InvalidRequest(msg),
            other => ProcessError::internal(other.to_string()),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
