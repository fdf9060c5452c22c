//! Geospatial processing service.
//!
//! Turns [`ProcessingRequest`]s into encoded [`Artifact`](geo_common::Artifact)s:
//! tiles and bounding-box renders of raster datasets, and reprojected
//! features or boundaries of vector datasets. Results are cached by a
//! fingerprint of the request and the dataset version. Plan uploads are
//! converted to normalized GeoJSON by [`convert_plan`].

pub mod config;
pub mod convert;
pub mod fingerprint;
pub mod pipeline;
pub mod request;
pub mod service;
pub mod worker;

pub use config::{BoundsPolicy, ConfigError, DatasetConfig, ServiceConfig};
pub use convert::{convert_plan, ConvertedPlan};
pub use fingerprint::{canonical_request, fingerprint};
pub use pipeline::Pipeline;
pub use request::{FeatureFilter, ProcessingRequest, RenderOptions, RequestKind};
pub use service::{GeoService, ServiceError};
pub use worker::WorkerPool;
