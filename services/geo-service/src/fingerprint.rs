//! Cache fingerprints for processing requests.
//!
//! A fingerprint is the SHA-256 of a canonical request string. Defaults are
//! resolved before hashing, so requests that produce the same bytes share a
//! fingerprint. Coordinates are written losslessly: two requests share an
//! entry only when the pipeline sees the same numbers.

use geo_common::BoundingBox;
use grid_processor::ResamplingMethod;
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::request::{ProcessingRequest, RequestKind};

/// Bumped when the canonical form or any output encoding changes.
const FINGERPRINT_VERSION: u32 = 2;

/// Shortest decimal form that parses back to the same `f64`.
fn exact(v: f64) -> String {
    // -0.0 and 0.0 produce the same output
    let v = if v == 0.0 { 0.0 } else { v };
    v.to_string()
}

fn bbox_key(b: &BoundingBox) -> String {
    format!(
        "{},{},{},{}",
        exact(b.min_x),
        exact(b.min_y),
        exact(b.max_x),
        exact(b.max_y)
    )
}

/// Canonical, human-readable form of a request against one dataset version.
pub fn canonical_request(
    request: &ProcessingRequest,
    dataset_version: u64,
    default_resampling: ResamplingMethod,
) -> String {
    let mut out = format!(
        "v{}|dataset={}|version={}|srs={}|format={}",
        FINGERPRINT_VERSION,
        request.dataset,
        dataset_version,
        request.target_srs.epsg_code(),
        request.format
    );

    // Writing to a String cannot fail
    let _ = match &request.kind {
        RequestKind::Tile { z, x, y, size } => {
            write!(out, "|tile={}/{}/{}@{}", z, x, y, size)
        }
        RequestKind::BoundingBox {
            bbox,
            width,
            height,
        } => write!(out, "|bbox={}@{}x{}", bbox_key(bbox), width, height),
        RequestKind::Features => write!(out, "|features"),
        RequestKind::Boundary => write!(out, "|boundary"),
    };

    if request.kind.is_raster() {
        let options = &request.options;
        let _ = write!(
            out,
            "|band={}|resampling={}|ramp={}",
            options.band(),
            options.resampling.unwrap_or(default_resampling),
            options.ramp.cache_key()
        );
        if let Some((lo, hi)) = options.rescale {
            let _ = write!(out, "|rescale={},{}", exact(lo), exact(hi));
        }
    } else {
        let filter = &request.filter;
        if let Some(bbox) = &filter.bbox {
            let _ = write!(out, "|filter={}", bbox_key(bbox));
        }
        if filter.normalize_rates {
            out.push_str("|rates");
        }
    }
    out
}

/// SHA-256 hex fingerprint of a request against one dataset version.
pub fn fingerprint(
    request: &ProcessingRequest,
    dataset_version: u64,
    default_resampling: ResamplingMethod,
) -> String {
    let canonical = canonical_request(request, dataset_version, default_resampling);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{FeatureFilter, RenderOptions};
    use geo_common::{ContentType, Srs, TileCoord};

    fn tile() -> ProcessingRequest {
        ProcessingRequest::tile(
            "D1",
            Srs::WebMercator,
            TileCoord::new(2, 1, 1),
            256,
            ContentType::Png,
        )
    }

    #[test]
    fn test_defaults_resolved_before_hashing() {
        let implicit = tile();
        let explicit = tile().with_options(RenderOptions {
            band: Some(1),
            resampling: Some(ResamplingMethod::Bilinear),
            ..Default::default()
        });
        let a = fingerprint(&implicit, 1, ResamplingMethod::Bilinear);
        assert_eq!(a, fingerprint(&explicit, 1, ResamplingMethod::Bilinear));
        assert_eq!(a.len(), 64);

        // A different service default changes the output bytes
        assert_ne!(a, fingerprint(&implicit, 1, ResamplingMethod::Nearest));
    }

    #[test]
    fn test_version_and_format_change_fingerprint() {
        let a = fingerprint(&tile(), 1, ResamplingMethod::Bilinear);
        assert_ne!(a, fingerprint(&tile(), 2, ResamplingMethod::Bilinear));

        let mut tiff = tile();
        tiff.format = ContentType::GeoTiff;
        assert_ne!(a, fingerprint(&tiff, 1, ResamplingMethod::Bilinear));
    }

    #[test]
    fn test_coordinates_hashed_exactly() {
        let bbox = |dx: f64| {
            ProcessingRequest::bbox(
                "D1",
                Srs::Wgs84,
                BoundingBox::new(-0.0 + dx, 0.0, 1.0, 1.0),
                10,
                10,
                ContentType::Png,
            )
        };
        let m = ResamplingMethod::Bilinear;
        // Signed zero renders identically
        assert_eq!(fingerprint(&bbox(0.0), 1, m), fingerprint(&bbox(-0.0), 1, m));
        assert_ne!(fingerprint(&bbox(0.0), 1, m), fingerprint(&bbox(1e-12), 1, m));

        let tiny = bbox(0.1 + 0.2);
        let canonical = canonical_request(&tiny, 1, m);
        assert!(canonical.contains("bbox=0.30000000000000004,0,1,1@10x10"), "{canonical}");
        assert_ne!(fingerprint(&tiny, 1, m), fingerprint(&bbox(0.3), 1, m));
    }

    #[test]
    fn test_vector_canonical_form() {
        let request = ProcessingRequest::features("fields", Srs::Wgs84).with_filter(FeatureFilter {
            bbox: Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            normalize_rates: true,
        });
        let canonical = canonical_request(&request, 3, ResamplingMethod::Cubic);
        assert_eq!(
            canonical,
            "v2|dataset=fields|version=3|srs=4326|format=geojson|features\
             |filter=0,0,1,1|rates"
        );
    }
}
