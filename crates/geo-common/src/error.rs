//! Error taxonomy for the processing core.

use thiserror::Error;

/// Result type alias using ProcessError.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Primary error type for processing operations.
///
/// The type is `Clone` so that every waiter coalesced onto a single
/// computation can receive the same failure. Display strings carry only
/// identifiers supplied by the caller; driver messages and file paths go in
/// `detail` fields, which are logged but never displayed.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    // === Request Errors ===
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Request for dataset '{0}' lies outside its extent")]
    RequestOutOfBounds(String),

    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Resource Errors ===
    #[error("Failed to open dataset '{dataset}'")]
    DatasetOpen {
        dataset: String,
        detail: String,
        transient: bool,
    },

    #[error("Handle pool exhausted for dataset '{0}'")]
    PoolExhausted(String),

    // === Processing Errors ===
    #[error("Coordinate transform failed: {0}")]
    TransformError(String),

    #[error("Cache entry corrupted: {0}")]
    CacheCorruption(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error")]
    Internal { detail: String },
}

impl ProcessError {
    /// Shorthand for an internal error carrying a loggable detail.
    pub fn internal(detail: impl Into<String>) -> Self {
        ProcessError::Internal {
            detail: detail.into(),
        }
    }

    /// Errors caused by the request itself rather than the server.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ProcessError::DatasetNotFound(_)
                | ProcessError::RequestOutOfBounds(_)
                | ProcessError::UnsupportedProjection(_)
                | ProcessError::UnsupportedFormat(_)
                | ProcessError::InvalidRequest(_)
        )
    }

    /// Resource errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::PoolExhausted(_) => true,
            ProcessError::DatasetOpen { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ProcessError::RequestOutOfBounds(_)
            | ProcessError::UnsupportedProjection(_)
            | ProcessError::UnsupportedFormat(_)
            | ProcessError::InvalidRequest(_) => 400,

            ProcessError::DatasetNotFound(_) => 404,

            ProcessError::PoolExhausted(_) => 503,
            ProcessError::DatasetOpen { transient: true, .. } => 503,
            ProcessError::Timeout => 504,

            _ => 500,
        }
    }

    /// Stable machine-readable code for the gateway.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProcessError::DatasetNotFound(_) => "DatasetNotFound",
            ProcessError::RequestOutOfBounds(_) => "RequestOutOfBounds",
            ProcessError::UnsupportedProjection(_) => "UnsupportedProjection",
            ProcessError::UnsupportedFormat(_) => "UnsupportedFormat",
            ProcessError::InvalidRequest(_) => "InvalidRequest",
            ProcessError::DatasetOpen { .. } => "DatasetOpenError",
            ProcessError::PoolExhausted(_) => "PoolExhausted",
            ProcessError::TransformError(_) => "TransformError",
            ProcessError::CacheCorruption(_) => "CacheCorruption",
            ProcessError::Timeout => "Timeout",
            ProcessError::Internal { .. } => "InternalError",
        }
    }
}

impl From<crate::bbox::BboxParseError> for ProcessError {
    fn from(err: crate::bbox::BboxParseError) -> Self {
        ProcessError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ProcessError::RequestOutOfBounds("d".into()).is_client_fault());
        assert!(!ProcessError::TransformError("pole".into()).is_retryable());
        assert!(ProcessError::PoolExhausted("d".into()).is_retryable());

        let transient = ProcessError::DatasetOpen {
            dataset: "d".into(),
            detail: "locked".into(),
            transient: true,
        };
        assert!(transient.is_retryable());
        assert!(!transient.is_client_fault());
        assert_eq!(transient.http_status_code(), 503);
    }

    #[test]
    fn test_display_hides_detail() {
        let err = ProcessError::DatasetOpen {
            dataset: "elevation".into(),
            detail: "/srv/data/secret/elevation.tif: permission denied".into(),
            transient: false,
        };
        let msg = err.to_string();
        assert!(msg.contains("elevation"));
        assert!(!msg.contains("/srv"));
        assert_eq!(err.http_status_code(), 500);

        let internal = ProcessError::internal("worker panicked at src/lib.rs");
        assert_eq!(internal.to_string(), "Internal error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ProcessError::DatasetNotFound("ghost".into()).http_status_code(), 404);
        assert_eq!(ProcessError::UnsupportedFormat("bmp".into()).http_status_code(), 400);
        assert_eq!(ProcessError::Timeout.http_status_code(), 504);
        assert_eq!(ProcessError::PoolExhausted("d".into()).error_code(), "PoolExhausted");
    }
}
