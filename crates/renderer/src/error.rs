//! Error types for encoding.

use geo_common::ProcessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("expected {expected} samples, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("invalid colour ramp: {0}")]
    InvalidRamp(String),

    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("TIFF encoding failed: {0}")]
    Tiff(#[from] tiff::TiffError),
}

impl From<RenderError> for ProcessError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidRamp(msg) => ProcessError::InvalidRequest(msg),
            other => ProcessError::internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
