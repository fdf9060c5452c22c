//! Processing pipeline: validate, bound, acquire, read, warp, encode.
//!
//! ```text
//! ProcessingRequest
//!      │
//!      ├─► Resolve dataset, check kind/format/shape     (no handle yet)
//!      ├─► Request extent → dataset SRS, bounds check   (no handle yet)
//!      ├─► Acquire pooled handle
//!      └─► Worker pool (blocking)
//!            ├─► Read window (+margin), release handle
//!            ├─► Warp onto the target grid
//!            └─► Encode
//! ```
//!
//! Exhausted pools and transient open failures are retried with
//! exponential backoff; everything else fails immediately.

use geo_common::{Artifact, BoundingBox, ContentType, ProcessError, ProcessResult, Srs, TileCoord};
use grid_processor::{PixelWindow, TargetGrid, TransformEngine};
use projection::{ProjectionError, DEFAULT_DENSIFY};
use renderer::RasterStyle;
use std::sync::Arc;
use std::time::Instant;
use storage::{Dataset, DatasetInfo, DatasetKind, DatasetRegistry, HandlePool};
use tracing::{debug, warn};

use crate::config::{BoundsPolicy, RetrySettings, ServiceConfig};
use crate::request::{ProcessingRequest, RequestKind};
use crate::worker::WorkerPool;

/// Extra source pixels read around the requested window so kernels have
/// neighbours at the edges.
const WINDOW_MARGIN: usize = 2;

/// Where a raster request reads from and what it produces.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RasterPlan {
    target: TargetGrid,
    window: PixelWindow,
}

pub struct Pipeline {
    registry: Arc<DatasetRegistry>,
    pool: Arc<HandlePool>,
    engine: Arc<TransformEngine>,
    workers: Arc<WorkerPool>,
    bounds_policy: BoundsPolicy,
    max_output_size: usize,
    retry: RetrySettings,
}

impl Pipeline {
    pub fn new(
        registry: Arc<DatasetRegistry>,
        pool: Arc<HandlePool>,
        engine: Arc<TransformEngine>,
        workers: Arc<WorkerPool>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            registry,
            pool,
            engine,
            workers,
            bounds_policy: config.bounds_policy,
            max_output_size: config.max_output_size,
            retry: config.retry.clone(),
        }
    }

    pub fn engine(&self) -> &Arc<TransformEngine> {
        &self.engine
    }

    /// Produce the artifact for a request, retrying resource errors.
    pub async fn process(&self, request: &ProcessingRequest) -> ProcessResult<Artifact> {
        let mut attempt = 1;
        loop {
            match self.process_once(request).await {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        dataset = %request.dataset,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );
                    metrics::counter!("geo_pipeline_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn process_once(&self, request: &ProcessingRequest) -> ProcessResult<Artifact> {
        let dataset = self.registry.get(&request.dataset)?;
        self.validate(request, dataset.info())?;

        match &request.kind {
            RequestKind::Tile { .. } | RequestKind::BoundingBox { .. } => {
                let plan = self.plan_raster(request, dataset.info())?;
                self.render_raster(&dataset, request, plan).await
            }
            RequestKind::Features | RequestKind::Boundary => {
                let source_filter = self.plan_vector(request, dataset.info())?;
                self.render_vector(&dataset, request, source_filter).await
            }
        }
    }

    /// Checks that need no handle and no coordinate math.
    fn validate(&self, request: &ProcessingRequest, info: &DatasetInfo) -> ProcessResult<()> {
        let id = &request.dataset;
        let wants_raster = request.kind.is_raster();
        let expected = if wants_raster {
            DatasetKind::Raster
        } else {
            DatasetKind::Vector
        };
        if info.kind != expected {
            return Err(ProcessError::InvalidRequest(format!(
                "{} requests need a {:?} dataset, '{}' is {:?}",
                request.kind.name(),
                expected,
                id,
                info.kind
            )));
        }
        if request.format.is_raster() != wants_raster {
            return Err(ProcessError::UnsupportedFormat(format!(
                "{} for {} requests",
                request.format,
                request.kind.name()
            )));
        }

        if let Some((width, height)) = request.output_size() {
            if width == 0 || height == 0 {
                return Err(ProcessError::InvalidRequest(format!(
                    "output size {}x{} has no pixels",
                    width, height
                )));
            }
            if width > self.max_output_size || height > self.max_output_size {
                return Err(ProcessError::InvalidRequest(format!(
                    "output size {}x{} exceeds {} pixels per side",
                    width, height, self.max_output_size
                )));
            }
        }

        match &request.kind {
            RequestKind::Tile { z, x, y, .. } => TileCoord::new(*z, *x, *y).validate()?,
            RequestKind::BoundingBox { bbox, .. } if !bbox.is_valid() => {
                return Err(ProcessError::InvalidRequest(format!(
                    "bbox {} has no area",
                    bbox.cache_key()
                )));
            }
            _ => {}
        }

        if wants_raster {
            let band = request.options.band();
            if band == 0 || band > info.band_count {
                return Err(ProcessError::InvalidRequest(format!(
                    "band {} out of range 1..={}",
                    band, info.band_count
                )));
            }
            if let Some((lo, hi)) = request.options.rescale {
                if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                    return Err(ProcessError::InvalidRequest(format!(
                        "rescale range {}..{} is empty",
                        lo, hi
                    )));
                }
            }
            request.options.ramp.stops()?;
        }
        Ok(())
    }

    /// Request extent of a tile in the target SRS.
    fn tile_extent(&self, tile: TileCoord, target: Srs) -> ProcessResult<BoundingBox> {
        match target {
            Srs::WebMercator => Ok(tile.web_mercator_bounds()),
            srs if srs.is_geographic() => Ok(tile.wgs84_bounds()),
            srs => self
                .engine
                .transform_bbox(&tile.web_mercator_bounds(), Srs::WebMercator, srs),
        }
    }

    /// Transform a target-SRS extent into the dataset SRS. An extent the
    /// dataset SRS cannot represent at all is out of bounds, not a
    /// transform failure.
    fn to_dataset_srs(
        &self,
        bbox: &BoundingBox,
        target: Srs,
        info: &DatasetInfo,
        dataset_id: &str,
    ) -> ProcessResult<BoundingBox> {
        self.engine
            .transformer(target, info.srs)
            .transform_bbox(bbox, DEFAULT_DENSIFY)
            .map_err(|e| match e {
                ProjectionError::OutsideArea(_) => {
                    ProcessError::RequestOutOfBounds(dataset_id.to_string())
                }
                other => other.into(),
            })
    }

    fn plan_raster(&self, request: &ProcessingRequest, info: &DatasetInfo) -> ProcessResult<RasterPlan> {
        let id = request.dataset.as_str();
        let target_srs = request.target_srs;
        let out_of_bounds = || ProcessError::RequestOutOfBounds(id.to_string());

        let (target_bbox, width, height, clippable) = match &request.kind {
            RequestKind::Tile { z, x, y, size } => (
                self.tile_extent(TileCoord::new(*z, *x, *y), target_srs)?,
                *size,
                *size,
                false,
            ),
            RequestKind::BoundingBox {
                bbox,
                width,
                height,
            } => (*bbox, *width, *height, true),
            RequestKind::Features | RequestKind::Boundary => {
                return Err(ProcessError::internal("vector request in raster planning"))
            }
        };

        let source_bbox = self.to_dataset_srs(&target_bbox, target_srs, info, id)?;
        let overlap = source_bbox
            .intersection(&info.extent)
            .ok_or_else(out_of_bounds)?;

        let (target_bbox, width, height) =
            if clippable && self.bounds_policy == BoundsPolicy::Clamp {
                let overlap_target = self.engine.transform_bbox(&overlap, info.srs, target_srs)?;
                let clipped = target_bbox
                    .intersection(&overlap_target)
                    .ok_or_else(out_of_bounds)?;
                let scale = |size: usize, part: f64, whole: f64| {
                    ((size as f64 * part / whole).round() as usize).clamp(1, size)
                };
                (
                    clipped,
                    scale(width, clipped.width(), target_bbox.width()),
                    scale(height, clipped.height(), target_bbox.height()),
                )
            } else {
                (target_bbox, width, height)
            };

        let target = TargetGrid::new(target_srs, target_bbox, width, height)?;
        let window = info
            .geo_transform()
            .window_for_bbox(&overlap, info.width, info.height, WINDOW_MARGIN)
            .ok_or_else(out_of_bounds)?;

        Ok(RasterPlan { target, window })
    }

    /// Vector filter extent in the dataset SRS, bounds-checked.
    fn plan_vector(
        &self,
        request: &ProcessingRequest,
        info: &DatasetInfo,
    ) -> ProcessResult<Option<BoundingBox>> {
        if request.kind != RequestKind::Features {
            return Ok(None);
        }
        let Some(filter) = &request.filter.bbox else {
            return Ok(None);
        };
        if !filter.is_valid() {
            return Err(ProcessError::InvalidRequest(format!(
                "filter bbox {} has no area",
                filter.cache_key()
            )));
        }

        let source = self.to_dataset_srs(filter, request.target_srs, info, &request.dataset)?;
        let e = &info.extent;
        let touches = source.min_x <= e.max_x
            && source.max_x >= e.min_x
            && source.min_y <= e.max_y
            && source.max_y >= e.min_y;
        if !touches {
            return Err(ProcessError::RequestOutOfBounds(request.dataset.clone()));
        }
        Ok(Some(source))
    }

    async fn render_raster(
        &self,
        dataset: &Dataset,
        request: &ProcessingRequest,
        plan: RasterPlan,
    ) -> ProcessResult<Artifact> {
        let handle = self.pool.acquire(dataset.id()).await?;
        let version = handle.version();

        let engine = Arc::clone(&self.engine);
        let source_srs = dataset.info().srs;
        let band = request.options.band();
        let method = request.options.resampling;
        let format = request.format;
        let style = RasterStyle {
            ramp: request.options.ramp.clone(),
            range: request.options.rescale,
        };
        let id = dataset.id().to_string();

        self.workers
            .run(move || {
                let mut handle = handle;
                let start = Instant::now();
                let window = handle.read_window(band, plan.window)?;
                drop(handle);
                let read_ms = start.elapsed().as_secs_f64() * 1000.0;

                let start = Instant::now();
                let warped = engine.reproject_raster(&window, source_srs, &plan.target, method)?;
                let warp_ms = start.elapsed().as_secs_f64() * 1000.0;

                let start = Instant::now();
                let bytes = match format {
                    ContentType::Png => renderer::encode_png(&warped, &style)?,
                    ContentType::GeoTiff => renderer::encode_geotiff(&warped, plan.target.srs)?,
                    ContentType::GeoJson => {
                        return Err(ProcessError::UnsupportedFormat(format.to_string()))
                    }
                };
                let encode_ms = start.elapsed().as_secs_f64() * 1000.0;

                debug!(
                    dataset = %id,
                    window = ?plan.window,
                    width = plan.target.width,
                    height = plan.target.height,
                    read_ms,
                    warp_ms,
                    encode_ms,
                    bytes = bytes.len(),
                    "Rendered raster"
                );
                Ok(Artifact::new(bytes, format, version))
            })
            .await
    }

    async fn render_vector(
        &self,
        dataset: &Dataset,
        request: &ProcessingRequest,
        source_filter: Option<BoundingBox>,
    ) -> ProcessResult<Artifact> {
        let handle = self.pool.acquire(dataset.id()).await?;
        let version = handle.version();

        let to_target = self.engine.transformer(dataset.info().srs, request.target_srs);
        let boundary = request.kind == RequestKind::Boundary;
        let normalize = request.filter.normalize_rates;
        let id = dataset.id().to_string();

        self.workers
            .run(move || {
                let mut handle = handle;
                let features = handle.read_features()?;
                drop(handle);

                let collection = if boundary {
                    vector::boundary_of(&features)?
                } else {
                    let mut selected = match source_filter {
                        Some(bbox) => features.filter_bbox(&bbox),
                        None => features,
                    };
                    if normalize {
                        let summary = vector::normalize_rates(&mut selected)?;
                        debug!(
                            dataset = %id,
                            rate_key = %summary.rate_key,
                            min_rate = summary.min_rate,
                            max_rate = summary.max_rate,
                            "Normalized plan rates"
                        );
                    }
                    selected
                };

                let projected = vector::reproject_collection(&collection, &to_target)?;
                debug!(dataset = %id, features = projected.len(), "Rendered features");
                Ok(Artifact::new(projected.to_vec()?, ContentType::GeoJson, version))
            })
            .await
    }
}
