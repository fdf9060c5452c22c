//! Dataset storage for the processing core.
//!
//! Provides:
//! - A registry of datasets with version counters
//! - Drivers that probe and open GeoTIFF, GeoJSON and in-memory sources
//! - Shape source selection for uploaded files
//! - A bounded per-dataset pool of open handles
//! - An in-memory artifact cache with single-flight computation

pub mod artifact_cache;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod handle_pool;
pub mod registry;
pub mod upload;

pub use artifact_cache::{ArtifactCache, CacheConfig, CacheStatsSnapshot};
pub use dataset::{
    Dataset, DatasetFormat, DatasetInfo, DatasetKind, DatasetSource, DatasetSpec,
    DEFAULT_INPUT_SRS,
};
pub use driver::{DatasetDriver, DatasetHandle};
pub use error::DriverError;
pub use handle_pool::{HandlePool, PoolConfig, PoolStatsSnapshot, PooledHandle};
pub use registry::DatasetRegistry;
