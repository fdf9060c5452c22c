//! Driver error types.

use geo_common::ProcessError;
use std::io;
use thiserror::Error;

/// Failure inside a dataset driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No shape data provided.")]
    NoShapeData,

    #[error("Too many files.")]
    TooManyFiles,

    #[error("invalid dataset: {0}")]
    Format(String),

    /// The source exists but is temporarily unavailable.
    #[error("dataset busy: {0}")]
    Busy(String),

    #[error("unsupported source SRS EPSG:{0}")]
    UnsupportedSrs(u32),

    #[error("band {band} out of range (dataset has {count})")]
    BandOutOfRange { band: usize, count: usize },

    #[error("unsupported operation for this dataset: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Vector(#[from] vector::VectorError),

    #[error(transparent)]
    Grid(#[from] grid_processor::GridProcessorError),
}

impl DriverError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DriverError::Busy(_) => true,
            DriverError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Map to the public taxonomy. The message stays in `detail`, so paths
    /// and driver output are logged but never shown to callers.
    pub fn into_process_error(self, dataset: &str) -> ProcessError {
        match self {
            DriverError::BandOutOfRange { band, count } => ProcessError::InvalidRequest(format!(
                "band {} out of range (dataset has {})",
                band, count
            )),
            DriverError::UnsupportedSrs(code) => {
                ProcessError::UnsupportedProjection(format!("EPSG:{}", code))
            }
            DriverError::Unsupported(what) => ProcessError::UnsupportedFormat(what.to_string()),
            DriverError::NoShapeData | DriverError::TooManyFiles => {
                ProcessError::InvalidRequest(self.to_string())
            }
            other => ProcessError::DatasetOpen {
                dataset: dataset.to_string(),
                transient: other.is_transient(),
                detail: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
