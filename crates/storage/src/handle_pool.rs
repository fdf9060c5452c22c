//! Bounded pool of open dataset handles.
//!
//! Each dataset gets a semaphore with `max_handles_per_dataset` permits.
//! A checked-out handle holds one permit; idle handles hold none but are
//! only created by permit holders, so open handles (idle + checked out +
//! being opened) never exceed the bound.
//!
//! Handles are opened lazily, checked for liveness before reuse and closed
//! instead of returned when their dataset's version moved on.

use dashmap::DashMap;
use geo_common::{ProcessError, ProcessResult};
use grid_processor::{PixelWindow, RasterWindow};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use vector::FeatureCollection;

use crate::dataset::Dataset;
use crate::driver::DatasetHandle;
use crate::registry::DatasetRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_handles_per_dataset: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_handles_per_dataset: 4,
            acquire_timeout: Duration::from_millis(5000),
        }
    }
}

/// Pool-wide counters.
#[derive(Debug, Default)]
pub struct PoolStats {
    pub opened: AtomicU64,
    pub closed: AtomicU64,
    pub reused: AtomicU64,
    pub dead: AtomicU64,
    pub exhausted: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub opened: u64,
    pub closed: u64,
    pub reused: u64,
    pub dead: u64,
    pub exhausted: u64,
}

struct IdleHandle {
    handle: Box<dyn DatasetHandle>,
    version: u64,
}

struct DatasetSlot {
    dataset: Arc<Dataset>,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<IdleHandle>>,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

impl DatasetSlot {
    fn new(dataset: Arc<Dataset>, capacity: usize) -> Self {
        Self {
            dataset,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::new()),
            open: AtomicUsize::new(0),
            peak_open: AtomicUsize::new(0),
        }
    }

    fn take_idle(&self) -> Option<IdleHandle> {
        self.idle.lock().ok()?.pop()
    }

    fn push_idle(&self, idle: IdleHandle) -> Result<(), IdleHandle> {
        match self.idle.lock() {
            Ok(mut list) => {
                list.push(idle);
                Ok(())
            }
            Err(_) => Err(idle),
        }
    }

    fn drain_idle(&self) -> Vec<IdleHandle> {
        self.idle
            .lock()
            .map(|mut list| std::mem::take(&mut *list))
            .unwrap_or_default()
    }

    fn opened(&self) {
        let current = self.open.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_open.fetch_max(current, Ordering::AcqRel);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded, per-dataset pool of open handles.
pub struct HandlePool {
    registry: Arc<DatasetRegistry>,
    config: PoolConfig,
    slots: DashMap<String, Arc<DatasetSlot>>,
    shut_down: AtomicBool,
    stats: Arc<PoolStats>,
}

impl HandlePool {
    pub fn new(registry: Arc<DatasetRegistry>, config: PoolConfig) -> Self {
        Self {
            registry,
            config,
            slots: DashMap::new(),
            shut_down: AtomicBool::new(false),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    fn slot(&self, dataset: Arc<Dataset>) -> Arc<DatasetSlot> {
        let capacity = self.config.max_handles_per_dataset;
        let entry = self
            .slots
            .entry(dataset.id().to_string())
            .or_insert_with(|| Arc::new(DatasetSlot::new(dataset, capacity)));
        Arc::clone(&entry)
    }

    /// Check out a handle for `dataset_id`, waiting at most the configured
    /// acquire timeout for a free slot.
    pub async fn acquire(&self, dataset_id: &str) -> ProcessResult<PooledHandle> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ProcessError::internal("handle pool is shut down"));
        }
        let dataset = self.registry.get(dataset_id)?;
        let slot = self.slot(dataset);

        let permit = match tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&slot.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ProcessError::internal("handle pool is shut down")),
            Err(_) => {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("geo_pool_exhausted_total").increment(1);
                warn!(
                    dataset = dataset_id,
                    timeout_ms = self.config.acquire_timeout.as_millis() as u64,
                    "Handle pool exhausted"
                );
                return Err(ProcessError::PoolExhausted(dataset_id.to_string()));
            }
        };

        let version = slot.dataset.version();

        while let Some(idle) = slot.take_idle() {
            if idle.version == version && idle.handle.is_alive() {
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                return Ok(PooledHandle {
                    handle: Some(idle.handle),
                    version,
                    slot,
                    stats: Arc::clone(&self.stats),
                    _permit: permit,
                });
            }
            if idle.version == version {
                self.stats.dead.fetch_add(1, Ordering::Relaxed);
                debug!(dataset = dataset_id, "Replacing dead handle");
            }
            self.close(&slot, idle.handle);
        }

        let handle = self.open(&slot).await?;
        Ok(PooledHandle {
            handle: Some(handle),
            version,
            slot,
            stats: Arc::clone(&self.stats),
            _permit: permit,
        })
    }

    async fn open(&self, slot: &Arc<DatasetSlot>) -> ProcessResult<Box<dyn DatasetHandle>> {
        slot.opened();
        let dataset = Arc::clone(&slot.dataset);
        let result = tokio::task::spawn_blocking(move || {
            dataset.driver().open(dataset.spec(), dataset.info())
        })
        .await;

        let id = slot.dataset.id();
        match result {
            Ok(Ok(handle)) => {
                self.stats.opened.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("geo_pool_handles_opened_total").increment(1);
                debug!(
                    dataset = id,
                    open = slot.open.load(Ordering::Acquire),
                    "Opened dataset handle"
                );
                Ok(handle)
            }
            Ok(Err(e)) => {
                slot.closed();
                warn!(dataset = id, transient = e.is_transient(), error = %e, "Failed to open dataset");
                Err(e.into_process_error(id))
            }
            Err(join) => {
                slot.closed();
                Err(ProcessError::internal(format!("open task failed: {}", join)))
            }
        }
    }

    fn close(&self, slot: &DatasetSlot, handle: Box<dyn DatasetHandle>) {
        drop(handle);
        slot.closed();
        self.stats.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Close the idle handles of one dataset. Returns how many were closed.
    pub fn drain_dataset(&self, dataset_id: &str) -> usize {
        let Some(slot) = self.slots.get(dataset_id).map(|s| Arc::clone(&s)) else {
            return 0;
        };
        let drained = slot.drain_idle();
        let count = drained.len();
        for idle in drained {
            self.close(&slot, idle.handle);
        }
        if count > 0 {
            debug!(dataset = dataset_id, closed = count, "Drained idle handles");
        }
        count
    }

    /// Close every idle handle and refuse further acquires. Handles still
    /// checked out are closed when their guards drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let slots: Vec<Arc<DatasetSlot>> = self.slots.iter().map(|s| Arc::clone(&s)).collect();
        let mut closed = 0;
        for slot in slots {
            slot.permits.close();
            for idle in slot.drain_idle() {
                self.close(&slot, idle.handle);
                closed += 1;
            }
        }
        info!(closed, "Handle pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Handles of a dataset currently open (idle or checked out).
    pub fn open_handles(&self, dataset_id: &str) -> usize {
        self.slots
            .get(dataset_id)
            .map_or(0, |s| s.open.load(Ordering::Acquire))
    }

    /// Highest number of simultaneously open handles seen for a dataset.
    pub fn peak_open(&self, dataset_id: &str) -> usize {
        self.slots
            .get(dataset_id)
            .map_or(0, |s| s.peak_open.load(Ordering::Acquire))
    }

    pub fn idle_handles(&self, dataset_id: &str) -> usize {
        self.slots
            .get(dataset_id)
            .and_then(|s| s.idle.lock().ok().map(|l| l.len()))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            opened: self.stats.opened.load(Ordering::Relaxed),
            closed: self.stats.closed.load(Ordering::Relaxed),
            reused: self.stats.reused.load(Ordering::Relaxed),
            dead: self.stats.dead.load(Ordering::Relaxed),
            exhausted: self.stats.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// A checked-out handle. Dropping it returns the handle to the pool, or
/// closes it when the dataset version changed or the pool shut down.
pub struct PooledHandle {
    handle: Option<Box<dyn DatasetHandle>>,
    version: u64,
    slot: Arc<DatasetSlot>,
    stats: Arc<PoolStats>,
    // Released after the handle is back in the idle list.
    _permit: OwnedSemaphorePermit,
}

impl PooledHandle {
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.slot.dataset
    }

    /// Dataset version current when the handle was checked out.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn handle_mut(&mut self) -> ProcessResult<&mut Box<dyn DatasetHandle>> {
        self.handle
            .as_mut()
            .ok_or_else(|| ProcessError::internal("dataset handle already released"))
    }

    /// Read a pixel window of a 1-based band.
    pub fn read_window(&mut self, band: usize, window: PixelWindow) -> ProcessResult<RasterWindow> {
        let result = self.handle_mut()?.read_window(band, window);
        result.map_err(|e| e.into_process_error(self.slot.dataset.id()))
    }

    pub fn read_features(&mut self) -> ProcessResult<FeatureCollection> {
        let result = self.handle_mut()?.read_features();
        result.map_err(|e| e.into_process_error(self.slot.dataset.id()))
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let reusable = !self.slot.permits.is_closed()
            && self.slot.dataset.version() == self.version
            && handle.is_alive();

        let rejected = if reusable {
            self.slot
                .push_idle(IdleHandle {
                    handle,
                    version: self.version,
                })
                .err()
                .map(|idle| idle.handle)
        } else {
            Some(handle)
        };

        if let Some(handle) = rejected {
            drop(handle);
            self.slot.closed();
            self.stats.closed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for PooledHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandle")
            .field("dataset", &self.slot.dataset.id())
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetSpec;
    use geo_common::{BoundingBox, Srs};
    use grid_processor::GeoTransform;

    fn pool(max: usize, timeout_ms: u64) -> HandlePool {
        let registry = Arc::new(DatasetRegistry::new());
        let bbox = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
        let raster = RasterWindow::new(
            (0..16).map(f64::from).collect(),
            4,
            4,
            GeoTransform::from_extent(&bbox, 4, 4),
            None,
        )
        .unwrap();
        registry
            .register(DatasetSpec::memory_raster("d1", raster, Srs::Wgs84))
            .unwrap();
        HandlePool::new(
            registry,
            PoolConfig {
                max_handles_per_dataset: max,
                acquire_timeout: Duration::from_millis(timeout_ms),
            },
        )
    }

    #[tokio::test]
    async fn test_handle_reused_after_release() {
        let pool = pool(2, 100);
        {
            let mut h = pool.acquire("d1").await.unwrap();
            let w = h.read_window(1, PixelWindow::full(4, 4)).unwrap();
            assert_eq!(w.len(), 16);
        }
        assert_eq!(pool.idle_handles("d1"), 1);

        let _h = pool.acquire("d1").await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(pool.open_handles("d1"), 1);
    }

    #[tokio::test]
    async fn test_unknown_dataset() {
        let pool = pool(1, 100);
        assert!(matches!(
            pool.acquire("ghost").await,
            Err(ProcessError::DatasetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_times_out() {
        let pool = pool(1, 20);
        let _held = pool.acquire("d1").await.unwrap();
        let err = pool.acquire("d1").await.unwrap_err();
        assert!(matches!(err, ProcessError::PoolExhausted(ref id) if id == "d1"));
        assert_eq!(pool.stats().exhausted, 1);
    }

    #[tokio::test]
    async fn test_version_bump_closes_returned_handle() {
        let pool = pool(2, 100);
        let h = pool.acquire("d1").await.unwrap();
        h.dataset().bump_version();
        drop(h);
        assert_eq!(pool.idle_handles("d1"), 0);
        assert_eq!(pool.open_handles("d1"), 0);
        assert_eq!(pool.stats().closed, 1);
    }

    #[tokio::test]
    async fn test_drain_and_shutdown() {
        let pool = pool(2, 100);
        drop(pool.acquire("d1").await.unwrap());
        assert_eq!(pool.drain_dataset("d1"), 1);
        assert_eq!(pool.open_handles("d1"), 0);

        drop(pool.acquire("d1").await.unwrap());
        pool.shutdown();
        assert_eq!(pool.open_handles("d1"), 0);
        assert!(pool.is_shut_down());
        assert!(pool.acquire("d1").await.is_err());
    }
}
