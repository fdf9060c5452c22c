//! Processing requests handed to the core by the gateway.

use geo_common::{BoundingBox, ContentType, ProcessError, ProcessResult, Srs, TileCoord};
use grid_processor::ResamplingMethod;
use renderer::ColorRamp;
use serde::{Deserialize, Serialize};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: usize = 256;

fn default_tile_size() -> usize {
    DEFAULT_TILE_SIZE
}

fn default_target_srs() -> Srs {
    Srs::Wgs84
}

/// What part of a dataset to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKind {
    /// An XYZ tile. Web Mercator and geographic targets use the tile's
    /// bounds directly; other targets use them transformed.
    Tile {
        z: u32,
        x: u32,
        y: u32,
        #[serde(default = "default_tile_size")]
        size: usize,
    },
    /// An extent in the target SRS rendered at a fixed pixel size.
    BoundingBox {
        bbox: BoundingBox,
        width: usize,
        height: usize,
    },
    /// The features of a vector dataset.
    Features,
    /// The union of a vector dataset's polygons as a single feature.
    Boundary,
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Tile { .. } => "tile",
            RequestKind::BoundingBox { .. } => "bbox",
            RequestKind::Features => "features",
            RequestKind::Boundary => "boundary",
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, RequestKind::Tile { .. } | RequestKind::BoundingBox { .. })
    }
}

/// Raster styling and sampling overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// 1-based band; band 1 when absent.
    pub band: Option<usize>,
    /// Value range mapped onto the colour ramp; the data range when absent.
    pub rescale: Option<(f64, f64)>,
    pub ramp: ColorRamp,
    /// Overrides the service default.
    pub resampling: Option<ResamplingMethod>,
}

impl RenderOptions {
    pub fn band(&self) -> usize {
        self.band.unwrap_or(1)
    }
}

/// Vector request filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFilter {
    /// Keep features overlapping this extent, given in the target SRS.
    pub bbox: Option<BoundingBox>,
    /// Normalize application rates and add relative rates.
    pub normalize_rates: bool,
}

/// A request for one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub dataset: String,
    #[serde(default = "default_target_srs")]
    pub target_srs: Srs,
    pub kind: RequestKind,
    pub format: ContentType,
    #[serde(default)]
    pub options: RenderOptions,
    #[serde(default)]
    pub filter: FeatureFilter,
}

impl ProcessingRequest {
    pub fn new(
        dataset: impl Into<String>,
        target_srs: Srs,
        kind: RequestKind,
        format: ContentType,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            target_srs,
            kind,
            format,
            options: RenderOptions::default(),
            filter: FeatureFilter::default(),
        }
    }

    pub fn tile(
        dataset: impl Into<String>,
        target_srs: Srs,
        tile: TileCoord,
        size: usize,
        format: ContentType,
    ) -> Self {
        Self::new(
            dataset,
            target_srs,
            RequestKind::Tile {
                z: tile.z,
                x: tile.x,
                y: tile.y,
                size,
            },
            format,
        )
    }

    pub fn bbox(
        dataset: impl Into<String>,
        target_srs: Srs,
        bbox: BoundingBox,
        width: usize,
        height: usize,
        format: ContentType,
    ) -> Self {
        Self::new(
            dataset,
            target_srs,
            RequestKind::BoundingBox {
                bbox,
                width,
                height,
            },
            format,
        )
    }

    pub fn features(dataset: impl Into<String>, target_srs: Srs) -> Self {
        Self::new(dataset, target_srs, RequestKind::Features, ContentType::GeoJson)
    }

    pub fn boundary(dataset: impl Into<String>, target_srs: Srs) -> Self {
        Self::new(dataset, target_srs, RequestKind::Boundary, ContentType::GeoJson)
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_filter(mut self, filter: FeatureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Parse a JSON request. An unknown target SRS is reported as
    /// `UnsupportedProjection`, any other schema problem as `InvalidRequest`.
    pub fn from_json(bytes: &[u8]) -> ProcessResult<Self> {
        let malformed = |e: serde_json::Error| {
            ProcessError::InvalidRequest(format!("malformed request: {}", e))
        };
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(malformed)?;
        if let Some(srs) = value.get("target_srs").and_then(|v| v.as_str()) {
            Srs::parse(srs)?;
        }
        serde_json::from_value(value).map_err(malformed)
    }

    /// Output size in pixels for raster kinds.
    pub fn output_size(&self) -> Option<(usize, usize)> {
        match &self.kind {
            RequestKind::Tile { size, .. } => Some((*size, *size)),
            RequestKind::BoundingBox { width, height, .. } => Some((*width, *height)),
            RequestKind::Features | RequestKind::Boundary => None,
        }
    }
}
