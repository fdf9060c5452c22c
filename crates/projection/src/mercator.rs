//! Spherical (Web) Mercator, EPSG:3857.

use std::f64::consts::PI;

use crate::ProjectionError;

/// Sphere radius used by Web Mercator (the WGS84 semi-major axis).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which Web Mercator becomes square.
pub const MAX_LATITUDE: f64 = 85.05112877980659;

/// Geographic degrees to Web Mercator meters.
///
/// Latitudes at the poles have no finite image and fail.
pub fn forward(lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(ProjectionError::NonFinite(lon, lat));
    }
    if lat.abs() >= 90.0 {
        return Err(ProjectionError::PoleSingularity(lat));
    }

    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();

    if !y.is_finite() {
        return Err(ProjectionError::Diverged);
    }
    Ok((x, y))
}

/// Web Mercator meters to geographic degrees.
pub fn inverse(x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(ProjectionError::NonFinite(x, y));
    }

    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    Ok((lon, lat))
}
