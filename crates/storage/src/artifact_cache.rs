//! In-memory LRU cache of produced artifacts with single-flight compute.
//!
//! ## Validity
//!
//! Entries are stamped with the dataset version they were produced from
//! and are only served while that version is current. Reads also drop
//! entries past their TTL and entries whose checksum no longer matches
//! their bytes; all three count as misses.
//!
//! ## Single-flight
//!
//! [`ArtifactCache::get_or_compute`] runs at most one computation per
//! fingerprint. Concurrent callers subscribe to a broadcast channel and all
//! receive the same result. The computation runs in its own task, so a
//! caller that stops waiting never cancels it and its result still lands in
//! the cache.
//!
//! Lock order is `in_flight` then `state`.

use geo_common::{Artifact, ProcessError, ProcessResult};
use lru::LruCache;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: u64,
    /// Entries older than this are dropped on read.
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn new(max_entries: usize, max_size_mb: u64, ttl_secs: u64) -> Self {
        Self {
            max_entries,
            max_bytes: max_size_mb * 1024 * 1024,
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(10_000, 256, 0)
    }
}

/// Cache counters, readable without taking the cache lock.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub expired: AtomicU64,
    pub stale: AtomicU64,
    pub corrupted: AtomicU64,
    /// Callers that joined an in-flight computation.
    pub coalesced: AtomicU64,
    /// Computations started.
    pub computations: AtomicU64,
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub stale: u64,
    pub corrupted: u64,
    pub coalesced: u64,
    pub computations: u64,
    pub size_bytes: u64,
    pub entry_count: u64,
}

impl CacheStatsSnapshot {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CacheEntry {
    artifact: Artifact,
    dataset_id: String,
    inserted_at: Instant,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    size_bytes: u64,
    /// Lowest version still accepted per dataset, raised by invalidation.
    min_versions: HashMap<String, u64>,
}

type Shared = ProcessResult<Artifact>;

pub struct ArtifactCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<Shared>>>,
    stats: CacheStats,
}

impl ArtifactCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                size_bytes: 0,
                min_versions: HashMap::new(),
            }),
            in_flight: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Look up a fingerprint, accepting only artifacts of `current_version`.
    pub async fn get(&self, fingerprint: &str, current_version: u64) -> Option<Artifact> {
        let mut state = self.state.lock().await;
        self.get_locked(&mut state, fingerprint, current_version)
    }

    fn get_locked(
        &self,
        state: &mut CacheState,
        fingerprint: &str,
        current_version: u64,
    ) -> Option<Artifact> {
        let Some(entry) = state.entries.get(fingerprint) else {
            self.miss();
            return None;
        };

        let reason = if self
            .config
            .ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() > ttl)
        {
            Some(&self.stats.expired)
        } else if entry.artifact.dataset_version != current_version {
            Some(&self.stats.stale)
        } else if !entry.artifact.verify() {
            let err = ProcessError::CacheCorruption(fingerprint.to_string());
            error!(
                dataset = %entry.dataset_id,
                fingerprint,
                error = %err,
                "Dropping corrupted cache entry"
            );
            metrics::counter!("geo_cache_corrupted_total").increment(1);
            Some(&self.stats.corrupted)
        } else {
            None
        };

        match reason {
            None => {
                let artifact = entry.artifact.clone();
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("geo_cache_hits_total").increment(1);
                Some(artifact)
            }
            Some(counter) => {
                counter.fetch_add(1, Ordering::Relaxed);
                self.remove_locked(state, fingerprint);
                self.miss();
                None
            }
        }
    }

    fn miss(&self) {
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geo_cache_misses_total").increment(1);
    }

    /// Store an artifact. Returns false when it was rejected: produced
    /// from a version older than the dataset's last invalidation, or
    /// larger than the whole cache.
    pub async fn put(&self, dataset_id: &str, fingerprint: String, artifact: Artifact) -> bool {
        let mut state = self.state.lock().await;
        self.put_locked(&mut state, dataset_id, fingerprint, artifact)
    }

    fn put_locked(
        &self,
        state: &mut CacheState,
        dataset_id: &str,
        fingerprint: String,
        artifact: Artifact,
    ) -> bool {
        let floor = state.min_versions.get(dataset_id).copied().unwrap_or(0);
        if artifact.dataset_version < floor {
            debug!(
                dataset = dataset_id,
                version = artifact.dataset_version,
                floor,
                "Ignoring artifact from a superseded version"
            );
            return false;
        }

        let size = artifact.len() as u64;
        if size > self.config.max_bytes || self.config.max_entries == 0 {
            return false;
        }

        self.remove_locked(state, &fingerprint);
        while state.entries.len() >= self.config.max_entries
            || state.size_bytes + size > self.config.max_bytes
        {
            let Some((_, evicted)) = state.entries.pop_lru() else {
                break;
            };
            state.size_bytes -= evicted.artifact.len() as u64;
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("geo_cache_evictions_total").increment(1);
        }

        state.entries.put(
            fingerprint,
            CacheEntry {
                artifact,
                dataset_id: dataset_id.to_string(),
                inserted_at: Instant::now(),
            },
        );
        state.size_bytes += size;
        self.sync_gauges(state);
        true
    }

    fn remove_locked(&self, state: &mut CacheState, fingerprint: &str) {
        if let Some(entry) = state.entries.pop(fingerprint) {
            state.size_bytes -= entry.artifact.len() as u64;
            self.sync_gauges(state);
        }
    }

    fn sync_gauges(&self, state: &CacheState) {
        self.stats
            .size_bytes
            .store(state.size_bytes, Ordering::Relaxed);
        self.stats
            .entry_count
            .store(state.entries.len() as u64, Ordering::Relaxed);
    }

    /// Drop every entry of a dataset and refuse later stores of artifacts
    /// older than `new_version`. Returns the number of entries removed.
    pub async fn invalidate_dataset(&self, dataset_id: &str, new_version: u64) -> usize {
        let mut state = self.state.lock().await;
        let floor = state.min_versions.entry(dataset_id.to_string()).or_insert(0);
        *floor = (*floor).max(new_version);

        let doomed: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.dataset_id == dataset_id)
            .map(|(k, _)| k.clone())
            .collect();
        for fingerprint in &doomed {
            self.remove_locked(&mut state, fingerprint);
        }

        info!(
            dataset = dataset_id,
            version = new_version,
            removed = doomed.len(),
            "Invalidated cached artifacts"
        );
        doomed.len()
    }

    /// Return the cached artifact or compute it, with at most one
    /// computation per fingerprint in flight.
    pub async fn get_or_compute<F, Fut>(
        self: &Arc<Self>,
        dataset_id: &str,
        fingerprint: &str,
        version: u64,
        compute: F,
    ) -> ProcessResult<Artifact>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ProcessResult<Artifact>> + Send + 'static,
    {
        let mut rx = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(tx) = in_flight.get(fingerprint) {
                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("geo_cache_coalesced_total").increment(1);
                debug!(
                    dataset = dataset_id,
                    fingerprint,
                    "Joining in-flight computation"
                );
                tx.subscribe()
            } else {
                {
                    let mut state = self.state.lock().await;
                    if let Some(artifact) = self.get_locked(&mut state, fingerprint, version) {
                        return Ok(artifact);
                    }
                }

                let (tx, rx) = broadcast::channel(1);
                in_flight.insert(fingerprint.to_string(), tx);
                self.stats.computations.fetch_add(1, Ordering::Relaxed);

                let cache = Arc::clone(self);
                let dataset_id = dataset_id.to_string();
                let fingerprint = fingerprint.to_string();
                tokio::spawn(async move {
                    let result = match tokio::spawn(compute()).await {
                        Ok(result) => result,
                        Err(join) => Err(ProcessError::internal(format!(
                            "artifact computation failed: {}",
                            join
                        ))),
                    };
                    cache.complete(&dataset_id, fingerprint, result).await;
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => Err(ProcessError::internal(
                "artifact computation ended without a result",
            )),
        }
    }

    /// Store a finished computation and wake its waiters.
    async fn complete(&self, dataset_id: &str, fingerprint: String, result: Shared) {
        let mut in_flight = self.in_flight.lock().await;
        if let Ok(artifact) = &result {
            let mut state = self.state.lock().await;
            self.put_locked(&mut state, dataset_id, fingerprint.clone(), artifact.clone());
        }
        if let Some(tx) = in_flight.remove(&fingerprint) {
            let waiters = tx.receiver_count();
            // No receivers left is fine; the result is cached regardless.
            let _ = tx.send(result);
            debug!(dataset = dataset_id, fingerprint = %fingerprint, waiters, "Computation finished");
        }
    }

    /// Number of computations currently running.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    pub fn len(&self) -> usize {
        self.stats.entry_count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let s = &self.stats;
        CacheStatsSnapshot {
            hits: s.hits.load(Ordering::Relaxed),
            misses: s.misses.load(Ordering::Relaxed),
            evictions: s.evictions.load(Ordering::Relaxed),
            expired: s.expired.load(Ordering::Relaxed),
            stale: s.stale.load(Ordering::Relaxed),
            corrupted: s.corrupted.load(Ordering::Relaxed),
            coalesced: s.coalesced.load(Ordering::Relaxed),
            computations: s.computations.load(Ordering::Relaxed),
            size_bytes: s.size_bytes.load(Ordering::Relaxed),
            entry_count: s.entry_count.load(Ordering::Relaxed),
        }
    }

    /// Remove all entries. Version floors are kept.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.size_bytes = 0;
        self.sync_gauges(&state);
    }
}
