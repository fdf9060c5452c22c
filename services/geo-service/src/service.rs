//! Service facade: registry, handle pool, artifact cache and pipeline
//! wired together behind one `process` call.

use geo_common::{Artifact, ProcessError, ProcessResult};
use grid_processor::{ResamplingMethod, TransformEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{
    ArtifactCache, CacheStatsSnapshot, DatasetDriver, DatasetInfo, DatasetRegistry, DatasetSpec,
    HandlePool, PoolStatsSnapshot,
};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ServiceConfig};
use crate::fingerprint::fingerprint;
use crate::pipeline::Pipeline;
use crate::request::ProcessingRequest;
use crate::worker::WorkerPool;

pub struct GeoService {
    registry: Arc<DatasetRegistry>,
    pool: Arc<HandlePool>,
    cache: Arc<ArtifactCache>,
    workers: Arc<WorkerPool>,
    pipeline: Arc<Pipeline>,
    default_resampling: ResamplingMethod,
    request_timeout: Duration,
}

impl GeoService {
    /// Build a service with no datasets registered.
    pub fn new(config: &ServiceConfig) -> Self {
        let registry = Arc::new(DatasetRegistry::new());
        let pool = Arc::new(HandlePool::new(Arc::clone(&registry), config.pool_config()));
        let cache = Arc::new(ArtifactCache::new(config.cache_config()));
        let workers = Arc::new(WorkerPool::new(config.workers.threads));
        let engine = Arc::new(TransformEngine::new(config.default_resampling));
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            engine,
            Arc::clone(&workers),
            config,
        ));

        info!(
            max_handles = config.pool.max_handles_per_dataset,
            cache_entries = config.cache.max_entries,
            cache_mb = config.cache.max_size_mb,
            workers = workers.capacity(),
            bounds_policy = ?config.bounds_policy,
            "Geo service initialized"
        );

        Self {
            registry,
            pool,
            cache,
            workers,
            pipeline,
            default_resampling: config.default_resampling,
            request_timeout: config.request_timeout(),
        }
    }

    /// Build a service and register every configured dataset.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let service = Self::new(config);
        for dataset in &config.datasets {
            service.register(dataset.to_spec()?)?;
        }
        Ok(service)
    }

    pub fn register(&self, spec: DatasetSpec) -> ProcessResult<DatasetInfo> {
        Ok(self.registry.register(spec)?.info().clone())
    }

    pub fn register_with_driver(
        &self,
        spec: DatasetSpec,
        driver: Arc<dyn DatasetDriver>,
    ) -> ProcessResult<DatasetInfo> {
        Ok(self.registry.register_with_driver(spec, driver)?.info().clone())
    }

    /// Produce the artifact for a request, from cache when possible.
    pub async fn process(&self, request: &ProcessingRequest) -> ProcessResult<Artifact> {
        let start = Instant::now();
        let kind = request.kind.name();

        let result = match tokio::time::timeout(self.request_timeout, self.process_cached(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProcessError::Timeout),
        };

        let elapsed = start.elapsed();
        metrics::histogram!("geo_process_duration_seconds").record(elapsed.as_secs_f64());
        match &result {
            Ok(artifact) => {
                metrics::counter!("geo_requests_total", "status" => "ok").increment(1);
                debug!(
                    dataset = %request.dataset,
                    kind,
                    format = %artifact.content_type,
                    bytes = artifact.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request processed"
                );
            }
            Err(e) => {
                metrics::counter!("geo_requests_total", "status" => e.error_code()).increment(1);
                if e.is_client_fault() {
                    debug!(dataset = %request.dataset, kind, error = %e, "Request rejected");
                } else {
                    warn!(dataset = %request.dataset, kind, error = %e, "Request failed");
                }
            }
        }
        result
    }

    async fn process_cached(&self, request: &ProcessingRequest) -> ProcessResult<Artifact> {
        let version = self.registry.version(&request.dataset)?;
        let key = fingerprint(request, version, self.default_resampling);

        let pipeline = Arc::clone(&self.pipeline);
        let owned = request.clone();
        self.cache
            .get_or_compute(&request.dataset, &key, version, move || async move {
                pipeline.process(&owned).await
            })
            .await
    }

    /// Mark a dataset as changed. Cached artifacts of older versions are
    /// dropped and idle handles closed. Returns the new version.
    pub async fn bump_version(&self, dataset_id: &str) -> ProcessResult<u64> {
        let dataset = self.registry.get(dataset_id)?;
        let version = dataset.bump_version();
        let evicted = self.cache.invalidate_dataset(dataset_id, version).await;
        let closed = self.pool.drain_dataset(dataset_id);
        info!(
            dataset = dataset_id,
            version,
            evicted,
            closed,
            "Dataset version bumped"
        );
        Ok(version)
    }

    pub fn list_datasets(&self) -> Vec<(String, DatasetInfo)> {
        self.registry.list()
    }

    pub fn dataset_version(&self, dataset_id: &str) -> ProcessResult<u64> {
        self.registry.version(dataset_id)
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn pool(&self) -> &Arc<HandlePool> {
        &self.pool
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    pub fn pool_stats(&self) -> PoolStatsSnapshot {
        self.pool.stats()
    }

    /// Stop accepting work and close idle handles.
    pub fn shutdown(&self) {
        self.workers.close();
        self.pool.shutdown();
        let cache = self.cache.stats();
        let pool = self.pool.stats();
        info!(
            cache_hit_rate = cache.hit_rate(),
            computations = cache.computations,
            coalesced = cache.coalesced,
            handles_opened = pool.opened,
            pool_exhausted = pool.exhausted,
            "Geo service shut down"
        );
    }
}

/// Failure to build a service from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] ProcessError),
}
