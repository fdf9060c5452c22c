//! Point and extent transforms between supported SRS pairs.
//!
//! Every transform goes through geographic coordinates: the source is
//! inverted to lon/lat degrees and the target projected forward from there.

use geo_common::{BoundingBox, Datum, Srs};

use crate::ellipsoid::{GRS80, WGS84};
use crate::utm::UtmZone;
use crate::{mercator, ProjectionError};

/// Default number of segments each bbox edge is split into.
pub const DEFAULT_DENSIFY: usize = 21;

#[derive(Debug, Clone)]
enum Projector {
    Geographic,
    WebMercator,
    Utm(UtmZone),
}

impl Projector {
    fn for_srs(srs: Srs) -> Self {
        match srs {
            Srs::Wgs84 | Srs::Nad83 => Projector::Geographic,
            Srs::WebMercator => Projector::WebMercator,
            Srs::Utm { zone, north, datum } => {
                let ellipsoid = match datum {
                    Datum::Wgs84 => WGS84,
                    Datum::Etrs89 => GRS80,
                };
                Projector::Utm(UtmZone::new(zone, north, ellipsoid))
            }
        }
    }

    fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        match self {
            Projector::Geographic => {
                if x.is_finite() && y.is_finite() {
                    Ok((x, y))
                } else {
                    Err(ProjectionError::NonFinite(x, y))
                }
            }
            Projector::WebMercator => mercator::inverse(x, y),
            Projector::Utm(zone) => zone.inverse(x, y),
        }
    }

    fn from_geographic(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        match self {
            Projector::Geographic => {
                if lon.is_finite() && lat.is_finite() {
                    Ok((lon, lat))
                } else {
                    Err(ProjectionError::NonFinite(lon, lat))
                }
            }
            Projector::WebMercator => mercator::forward(lon, lat),
            Projector::Utm(zone) => zone.forward(lon, lat),
        }
    }
}

/// A reusable transform from `source` to `target` coordinates.
#[derive(Debug, Clone)]
pub struct Transformer {
    source: Srs,
    target: Srs,
    from: Projector,
    to: Projector,
}

impl Transformer {
    pub fn new(source: Srs, target: Srs) -> Self {
        Self {
            source,
            target,
            from: Projector::for_srs(source),
            to: Projector::for_srs(target),
        }
    }

    pub fn source(&self) -> Srs {
        self.source
    }

    pub fn target(&self) -> Srs {
        self.target
    }

    /// True when coordinates pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.source.is_equivalent(&self.target)
    }

    /// Transform a single coordinate pair.
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if self.is_identity() {
            return if x.is_finite() && y.is_finite() {
                Ok((x, y))
            } else {
                Err(ProjectionError::NonFinite(x, y))
            };
        }
        let (lon, lat) = self.from.to_geographic(x, y)?;
        self.to.from_geographic(lon, lat)
    }

    /// Transform a bounding box by sampling `densify` segments per edge.
    ///
    /// Samples are clamped to the projection area of the target SRS, so the
    /// result covers the part of `bbox` the target can represent. An extent
    /// with no overlap with that area fails.
    pub fn transform_bbox(
        &self,
        bbox: &BoundingBox,
        densify: usize,
    ) -> Result<BoundingBox, ProjectionError> {
        if self.is_identity() {
            if !bbox.is_valid() {
                return Err(ProjectionError::NonFinite(bbox.min_x, bbox.min_y));
            }
            return Ok(*bbox);
        }

        let steps = densify.max(1);
        let mut geographic = Vec::with_capacity(4 * (steps + 1));
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = bbox.min_x + t * bbox.width();
            let y = bbox.min_y + t * bbox.height();
            for (px, py) in [
                (x, bbox.min_y),
                (x, bbox.max_y),
                (bbox.min_x, y),
                (bbox.max_x, y),
            ] {
                geographic.push(self.from.to_geographic(px, py)?);
            }
        }

        let area = self.target.projection_area();
        let sampled = bounds_of(&geographic).ok_or(ProjectionError::Diverged)?;
        if !sampled.intersects(&area) {
            return Err(ProjectionError::OutsideArea(self.target.to_string()));
        }

        let mut projected = Vec::with_capacity(geographic.len());
        for (lon, lat) in geographic {
            let lon = lon.clamp(area.min_x, area.max_x);
            let lat = lat.clamp(area.min_y, area.max_y);
            projected.push(self.to.from_geographic(lon, lat)?);
        }

        bounds_of(&projected).ok_or(ProjectionError::Diverged)
    }

    /// The transform in the opposite direction.
    pub fn inverse(&self) -> Transformer {
        Transformer::new(self.target, self.source)
    }
}

fn bounds_of(points: &[(f64, f64)]) -> Option<BoundingBox> {
    let (first, rest) = points.split_first()?;
    let mut bbox = BoundingBox::new(first.0, first.1, first.0, first.1);
    for &(x, y) in rest {
        bbox.min_x = bbox.min_x.min(x);
        bbox.min_y = bbox.min_y.min(y);
        bbox.max_x = bbox.max_x.max(x);
        bbox.max_y = bbox.max_y.max(y);
    }
    Some(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let t = Transformer::new(Srs::Wgs84, Srs::Nad83);
        assert!(t.is_identity());
        assert_eq!(t.transform_point(1.5, -2.5).unwrap(), (1.5, -2.5));
    }

    #[test]
    fn test_bbox_to_web_mercator() {
        let t = Transformer::new(Srs::Wgs84, Srs::WebMercator);
        let merc = t
            .transform_bbox(&BoundingBox::new(-10.0, -10.0, 10.0, 10.0), DEFAULT_DENSIFY)
            .unwrap();
        assert!((merc.max_x - 1113194.9079).abs() < 1e-3);
        assert!((merc.max_y - 1118889.9748).abs() < 1e-3);
        assert!((merc.min_x + merc.max_x).abs() < 1e-6);
    }

    #[test]
    fn test_pole_point_fails() {
        let t = Transformer::new(Srs::Wgs84, Srs::WebMercator);
        assert!(t.transform_point(0.0, 90.0).is_err());
        // The extent is clamped to the Mercator square instead
        let world = t
            .transform_bbox(&BoundingBox::new(-180.0, -90.0, 180.0, 90.0), 8)
            .unwrap();
        assert!(world.max_y.is_finite());
    }

    #[test]
    fn test_utm_via_mercator() {
        let utm = Srs::parse("EPSG:32632").unwrap();
        let t = Transformer::new(Srs::WebMercator, utm);
        let (mx, my) = mercator::forward(9.0, 45.0).unwrap();
        let (e, n) = t.transform_point(mx, my).unwrap();
        assert!((e - 500000.0).abs() < 1e-3);

        let (mx2, my2) = t.inverse().transform_point(e, n).unwrap();
        assert!((mx - mx2).abs() < 1e-4);
        assert!((my - my2).abs() < 1e-4);
    }

    #[test]
    fn test_utm_bbox_past_zone_edge() {
        let utm = Srs::parse("EPSG:32632").unwrap();
        let t = Transformer::new(Srs::Wgs84, utm);

        // Zone 32 spans 6..12 E; 13..14 E is entirely in zone 33
        let east = t
            .transform_bbox(&BoundingBox::new(13.0, 50.0, 14.0, 51.0), DEFAULT_DENSIFY)
            .unwrap();
        assert!(east.min_x > 750000.0 && east.max_x < 900000.0, "{east:?}");

        // Straddling the edge is not cut at 12 E
        let straddle = t
            .transform_bbox(&BoundingBox::new(11.0, 50.0, 13.0, 51.0), DEFAULT_DENSIFY)
            .unwrap();
        let (edge, _) = t.transform_point(12.0, 50.5).unwrap();
        assert!(straddle.max_x > edge + 50000.0, "{straddle:?}");
    }

    #[test]
    fn test_outside_area_of_use() {
        let utm = Srs::parse("EPSG:32632").unwrap();
        let t = Transformer::new(Srs::Wgs84, utm);
        let far = BoundingBox::new(100.0, 0.0, 110.0, 10.0);
        assert!(matches!(
            t.transform_bbox(&far, 4),
            Err(ProjectionError::OutsideArea(_))
        ));
    }
}
