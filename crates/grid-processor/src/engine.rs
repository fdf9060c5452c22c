//! Spatial transform engine: transformer reuse plus raster and extent
//! reprojection entry points.

use dashmap::DashMap;
use geo_common::{BoundingBox, ProcessResult, Srs};
use projection::{Transformer, DEFAULT_DENSIFY};
use std::sync::Arc;
use tracing::debug;

use crate::projection::reproject_raster;
use crate::types::{RasterWindow, ResamplingMethod, TargetGrid};

/// Shared, thread-safe transform engine.
///
/// Transformers are built once per (source, target) pair and reused by all
/// requests.
#[derive(Debug)]
pub struct TransformEngine {
    transformers: DashMap<(Srs, Srs), Arc<Transformer>>,
    default_method: ResamplingMethod,
}

impl TransformEngine {
    pub fn new(default_method: ResamplingMethod) -> Self {
        Self {
            transformers: DashMap::new(),
            default_method,
        }
    }

    /// Resampling method used when a request does not pick one.
    pub fn default_method(&self) -> ResamplingMethod {
        self.default_method
    }

    /// Get or build the transformer for a pair of SRS.
    pub fn transformer(&self, source: Srs, target: Srs) -> Arc<Transformer> {
        if let Some(existing) = self.transformers.get(&(source, target)) {
            return Arc::clone(&existing);
        }

        let entry = self
            .transformers
            .entry((source, target))
            .or_insert_with(|| {
                debug!(source = %source, target = %target, "Building transformer");
                metrics::counter!("geo_transformers_built_total").increment(1);
                Arc::new(Transformer::new(source, target))
            });
        Arc::clone(&entry)
    }

    /// Number of cached transformers.
    pub fn cached_transformers(&self) -> usize {
        self.transformers.len()
    }

    /// Transform a single point.
    pub fn transform_point(&self, source: Srs, target: Srs, x: f64, y: f64) -> ProcessResult<(f64, f64)> {
        Ok(self.transformer(source, target).transform_point(x, y)?)
    }

    /// Transform an extent, densifying its edges.
    pub fn transform_bbox(&self, bbox: &BoundingBox, source: Srs, target: Srs) -> ProcessResult<BoundingBox> {
        Ok(self
            .transformer(source, target)
            .transform_bbox(bbox, DEFAULT_DENSIFY)?)
    }

    /// Reproject a raster window in `source_srs` onto `target`.
    ///
    /// `method` overrides the engine default when given.
    pub fn reproject_raster(
        &self,
        window: &RasterWindow,
        source_srs: Srs,
        target: &TargetGrid,
        method: Option<ResamplingMethod>,
    ) -> ProcessResult<RasterWindow> {
        let method = method.unwrap_or(self.default_method);
        let to_source = self.transformer(target.srs, source_srs);
        Ok(reproject_raster(window, target, &to_source, method)?)
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(ResamplingMethod::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::ProcessError;

    #[test]
    fn test_transformers_are_reused() {
        let engine = TransformEngine::default();
        let a = engine.transformer(Srs::Wgs84, Srs::WebMercator);
        let b = engine.transformer(Srs::Wgs84, Srs::WebMercator);
        assert!(Arc::ptr_eq(&a, &b));
        engine.transformer(Srs::WebMercator, Srs::Wgs84);
        assert_eq!(engine.cached_transformers(), 2);
    }

    #[test]
    fn test_pole_is_transform_error() {
        let engine = TransformEngine::default();
        let err = engine
            .transform_point(Srs::Wgs84, Srs::WebMercator, 0.0, 90.0)
            .unwrap_err();
        assert!(matches!(err, ProcessError::TransformError(_)));
    }
}
