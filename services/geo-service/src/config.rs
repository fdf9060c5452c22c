//! Service configuration.
//!
//! Loaded from a YAML file, then overridden by `GEO_*` environment
//! variables, then validated.

use geo_common::{BoundingBox, ProcessError, Srs};
use grid_processor::ResamplingMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use storage::{CacheConfig, DatasetFormat, DatasetSpec, PoolConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value '{value}' for {key}")]
    Env { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What to do with requests that only partly overlap a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Keep the requested extent; pixels outside the dataset are nodata.
    #[default]
    Reject,
    /// Clip bounding-box requests to the dataset extent.
    Clamp,
}

impl FromStr for BoundsPolicy {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(BoundsPolicy::Reject),
            "clamp" => Ok(BoundsPolicy::Clamp),
            other => Err(ProcessError::InvalidRequest(format!(
                "unknown bounds policy '{}'",
                other
            ))),
        }
    }
}

/// One dataset to register at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub id: String,
    pub path: PathBuf,
    /// Guessed from the file extension when absent.
    #[serde(default)]
    pub format: Option<DatasetFormat>,
    #[serde(default)]
    pub srs: Option<Srs>,
    /// Declared extent `[min_x, min_y, max_x, max_y]` in the dataset SRS.
    #[serde(default)]
    pub extent: Option<[f64; 4]>,
    #[serde(default)]
    pub nodata: Option<f64>,
}

impl DatasetConfig {
    pub fn to_spec(&self) -> Result<DatasetSpec, ConfigError> {
        let format = match self.format {
            Some(format) => format,
            None => DatasetFormat::from_extension(&self.path).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "dataset '{}': cannot infer format of {}",
                    self.id,
                    self.path.display()
                ))
            })?,
        };

        let mut spec = DatasetSpec::file(&self.id, &self.path, format);
        if let Some(srs) = self.srs {
            spec = spec.with_srs(srs);
        }
        if let Some([min_x, min_y, max_x, max_y]) = self.extent {
            spec = spec.with_extent(BoundingBox::new(min_x, min_y, max_x, max_y));
        }
        if let Some(nodata) = self.nodata {
            spec = spec.with_nodata(nodata);
        }
        Ok(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub max_size_mb: u64,
    /// Zero disables expiry.
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_size_mb: 256,
            ttl_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_handles_per_dataset: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_handles_per_dataset: 4,
            acquire_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1000,
        }
    }
}

impl RetrySettings {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Concurrent blocking jobs (reads, warps, encodes).
    pub threads: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub datasets: Vec<DatasetConfig>,
    pub cache: CacheSettings,
    pub pool: PoolSettings,
    pub default_resampling: ResamplingMethod,
    pub bounds_policy: BoundsPolicy,
    pub request_timeout_ms: u64,
    /// Largest accepted output width or height in pixels.
    pub max_output_size: usize,
    pub retry: RetrySettings,
    pub workers: WorkerSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            cache: CacheSettings::default(),
            pool: PoolSettings::default(),
            default_resampling: ResamplingMethod::default(),
            bounds_policy: BoundsPolicy::default(),
            request_timeout_ms: 30_000,
            max_output_size: 8192,
            retry: RetrySettings::default(),
            workers: WorkerSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a YAML file, apply environment overrides and validate.
    ///
    /// Relative dataset paths are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            for dataset in &mut config.datasets {
                if dataset.path.is_relative() {
                    dataset.path = base.join(&dataset.path);
                }
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            datasets = config.datasets.len(),
            "Loaded service configuration"
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `GEO_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::Env {
                key: key.to_string(),
                value,
            })
        }

        let get = |key: &str| lookup(key).map(|value| (key.to_string(), value));

        if let Some((k, v)) = get("GEO_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_CACHE_SIZE_MB") {
            self.cache.max_size_mb = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_POOL_MAX_HANDLES") {
            self.pool.max_handles_per_dataset = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_POOL_ACQUIRE_TIMEOUT_MS") {
            self.pool.acquire_timeout_ms = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_DEFAULT_RESAMPLING") {
            self.default_resampling = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_BOUNDS_POLICY") {
            self.bounds_policy = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_WORKER_THREADS") {
            self.workers.threads = parse(&k, v)?;
        }
        if let Some((k, v)) = get("GEO_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse(&k, v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries must be at least 1");
        }
        if self.cache.max_size_mb == 0 {
            return invalid("cache.max_size_mb must be at least 1");
        }
        if self.pool.max_handles_per_dataset == 0 {
            return invalid("pool.max_handles_per_dataset must be at least 1");
        }
        if self.pool.acquire_timeout_ms == 0 {
            return invalid("pool.acquire_timeout_ms must be positive");
        }
        if self.request_timeout_ms == 0 {
            return invalid("request_timeout_ms must be positive");
        }
        if self.max_output_size == 0 {
            return invalid("max_output_size must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return invalid("retry.initial_backoff_ms exceeds retry.max_backoff_ms");
        }
        if self.workers.threads == 0 {
            return invalid("workers.threads must be at least 1");
        }

        let mut seen = std::collections::HashSet::new();
        for dataset in &self.datasets {
            if dataset.id.trim().is_empty() {
                return invalid("dataset id is empty");
            }
            if !seen.insert(dataset.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "dataset '{}' is listed twice",
                    dataset.id
                )));
            }
            if let Some([min_x, min_y, max_x, max_y]) = dataset.extent {
                if !BoundingBox::new(min_x, min_y, max_x, max_y).is_valid() {
                    return Err(ConfigError::Invalid(format!(
                        "dataset '{}' has an empty extent",
                        dataset.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_handles_per_dataset: self.pool.max_handles_per_dataset,
            acquire_timeout: Duration::from_millis(self.pool.acquire_timeout_ms),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(
            self.cache.max_entries,
            self.cache.max_size_mb,
            self.cache.ttl_secs,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const YAML: &str = r#"
datasets:
  - id: dem
    path: data/dem.tif
    srs: EPSG:4326
    extent: [-10, -10, 10, 10]
  - id: fields
    path: data/fields.geojson
cache:
  max_entries: 500
  ttl_secs: 60
pool:
  max_handles_per_dataset: 2
bounds_policy: clamp
default_resampling: cubic
"#;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config = ServiceConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.datasets[0].srs, Some(Srs::Wgs84));
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.cache.max_size_mb, 256);
        assert_eq!(config.pool.max_handles_per_dataset, 2);
        assert_eq!(config.pool.acquire_timeout_ms, 5000);
        assert_eq!(config.bounds_policy, BoundsPolicy::Clamp);
        assert_eq!(config.default_resampling, ResamplingMethod::Cubic);
        assert_eq!(config.cache_config().ttl, Some(Duration::from_secs(60)));
        config.validate().unwrap();
    }

    #[test]
    fn test_dataset_spec_infers_format() {
        let config = ServiceConfig::from_yaml_str(YAML).unwrap();
        let dem = config.datasets[0].to_spec().unwrap();
        assert_eq!(dem.format, DatasetFormat::GeoTiff);
        assert_eq!(dem.extent, Some(BoundingBox::new(-10.0, -10.0, 10.0, 10.0)));
        assert_eq!(config.datasets[1].to_spec().unwrap().format, DatasetFormat::GeoJson);

        let unknown = DatasetConfig {
            id: "x".into(),
            path: "data/x.bin".into(),
            format: None,
            srs: None,
            extent: None,
            nodata: None,
        };
        assert!(matches!(unknown.to_spec(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("GEO_POOL_MAX_HANDLES", "8"),
            ("GEO_BOUNDS_POLICY", "clamp"),
            ("GEO_DEFAULT_RESAMPLING", "nearest"),
            ("GEO_REQUEST_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.pool.max_handles_per_dataset, 8);
        assert_eq!(config.bounds_policy, BoundsPolicy::Clamp);
        assert_eq!(config.default_resampling, ResamplingMethod::Nearest);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));

        let err = config
            .apply_overrides(|k| (k == "GEO_WORKER_THREADS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "GEO_WORKER_THREADS"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServiceConfig::default();
        config.pool.max_handles_per_dataset = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::from_yaml_str(YAML).unwrap();
        config.datasets[1].id = "dem".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetrySettings {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 300,
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(300));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = test_utils::temp_test_dir();
        let path = test_utils::write_fixture(dir.path(), "service.yaml", YAML);
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.datasets[0].path, dir.path().join("data/dem.tif"));
    }
}
