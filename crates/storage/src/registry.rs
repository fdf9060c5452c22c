//! Process-wide dataset registry.

use dashmap::DashMap;
use geo_common::{ProcessError, ProcessResult};
use std::sync::Arc;
use tracing::{info, warn};

use crate::dataset::{Dataset, DatasetInfo, DatasetSpec};
use crate::driver::{self, DatasetDriver};

/// Registered datasets by id.
///
/// Metadata is probed once at registration and read-only afterwards; the
/// per-dataset version counter is the only mutable state.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    datasets: DashMap<String, Arc<Dataset>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset using the driver for its format. Probing does
    /// blocking I/O.
    pub fn register(&self, spec: DatasetSpec) -> ProcessResult<Arc<Dataset>> {
        let driver = driver::for_format(spec.format)?;
        self.register_with_driver(spec, driver)
    }

    /// Register a dataset read by a caller-supplied driver.
    pub fn register_with_driver(
        &self,
        spec: DatasetSpec,
        driver: Arc<dyn DatasetDriver>,
    ) -> ProcessResult<Arc<Dataset>> {
        if spec.id.trim().is_empty() {
            return Err(ProcessError::InvalidRequest("dataset id is empty".to_string()));
        }
        if self.datasets.contains_key(&spec.id) {
            return Err(ProcessError::InvalidRequest(format!(
                "dataset '{}' is already registered",
                spec.id
            )));
        }

        let info = driver.probe(&spec).map_err(|e| {
            warn!(dataset = %spec.id, driver = driver.name(), error = %e, "Dataset probe failed");
            e.into_process_error(&spec.id)
        })?;

        info!(
            dataset = %spec.id,
            driver = driver.name(),
            kind = ?info.kind,
            srs = %info.srs,
            extent = %info.extent.cache_key(),
            "Registered dataset"
        );

        let id = spec.id.clone();
        let dataset = Arc::new(Dataset::new(spec, info, driver));
        match self.datasets.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(ProcessError::InvalidRequest(
                format!("dataset '{}' is already registered", e.key()),
            )),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(Arc::clone(&dataset));
                Ok(dataset)
            }
        }
    }

    pub fn get(&self, id: &str) -> ProcessResult<Arc<Dataset>> {
        self.datasets
            .get(id)
            .map(|d| Arc::clone(&d))
            .ok_or_else(|| ProcessError::DatasetNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.datasets.contains_key(id)
    }

    /// Current version of a dataset.
    pub fn version(&self, id: &str) -> ProcessResult<u64> {
        Ok(self.get(id)?.version())
    }

    /// Sorted dataset ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.datasets.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Metadata of all datasets, sorted by id.
    pub fn list(&self) -> Vec<(String, DatasetInfo)> {
        let mut all: Vec<(String, DatasetInfo)> = self
            .datasets
            .iter()
            .map(|e| (e.key().clone(), e.value().info().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
