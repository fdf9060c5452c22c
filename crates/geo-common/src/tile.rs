//! XYZ tile addressing on the Web Mercator (GoogleMapsCompatible) grid.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::srs::WEB_MERCATOR_EXTENT;
use crate::{BoundingBox, ProcessError};

/// Deepest zoom level accepted for tile requests.
pub const MAX_ZOOM: u32 = 24;

/// A tile coordinate (z/x/y), y counted from the north edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Reject zoom levels above [`MAX_ZOOM`] and indices outside the matrix.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.z > MAX_ZOOM {
            return Err(ProcessError::InvalidRequest(format!(
                "zoom level {} exceeds maximum {}",
                self.z, MAX_ZOOM
            )));
        }
        let n = 1u64 << self.z;
        if self.x as u64 >= n || self.y as u64 >= n {
            return Err(ProcessError::InvalidRequest(format!(
                "tile {} is outside the {}x{} matrix",
                self.cache_key(),
                n,
                n
            )));
        }
        Ok(())
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Tile bounds in Web Mercator meters.
    pub fn web_mercator_bounds(&self) -> BoundingBox {
        let span = 2.0 * WEB_MERCATOR_EXTENT / (1u64 << self.z) as f64;
        let min_x = -WEB_MERCATOR_EXTENT + self.x as f64 * span;
        let max_y = WEB_MERCATOR_EXTENT - self.y as f64 * span;
        BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
    }

    /// Tile bounds in WGS84 degrees.
    pub fn wgs84_bounds(&self) -> BoundingBox {
        let n = (1u64 << self.z) as f64;

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x + 1) as f64 / n * 360.0 - 180.0;

        let lat_max = (PI * (1.0 - 2.0 * self.y as f64 / n))
            .sinh()
            .atan()
            .to_degrees();
        let lat_min = (PI * (1.0 - 2.0 * (self.y + 1) as f64 / n))
            .sinh()
            .atan()
            .to_degrees();

        BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_tile() {
        let tile = TileCoord::new(0, 0, 0);
        let merc = tile.web_mercator_bounds();
        assert!((merc.min_x + WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((merc.max_y - WEB_MERCATOR_EXTENT).abs() < 1e-6);

        let geo = tile.wgs84_bounds();
        assert!((geo.min_x + 180.0).abs() < 1e-9);
        assert!((geo.max_y - 85.0511).abs() < 1e-3);
    }

    #[test]
    fn test_validate() {
        assert!(TileCoord::new(2, 3, 3).validate().is_ok());
        assert!(TileCoord::new(2, 4, 0).validate().is_err());
        assert!(TileCoord::new(MAX_ZOOM + 1, 0, 0).validate().is_err());
    }
}
