//! Universal Transverse Mercator.
//!
//! Uses the Krüger series in the third flattening `n` to third order, which
//! is accurate to well under a millimeter within a zone and stays usable a
//! few zones away from the central meridian.
//!
//! Reference: Karney, "Transverse Mercator with an accuracy of a few
//! nanometers", J. Geodesy 85 (2011).

use crate::ellipsoid::Ellipsoid;
use crate::ProjectionError;

/// Scale factor on the central meridian.
const K0: f64 = 0.9996;
/// False easting (meters)
const FALSE_EASTING: f64 = 500000.0;
/// False northing applied in the southern hemisphere (meters)
const FALSE_NORTHING_SOUTH: f64 = 10000000.0;
/// Maximum distance from the central meridian accepted by `forward`.
const MAX_MERIDIAN_OFFSET: f64 = 60.0;

/// A single UTM zone on a given ellipsoid.
#[derive(Debug, Clone)]
pub struct UtmZone {
    pub zone: u8,
    pub north: bool,
    /// Central meridian (degrees)
    pub lon0: f64,
    e: f64,
    /// Rectifying radius scaled by k0
    k0_a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl UtmZone {
    pub fn new(zone: u8, north: bool, ellipsoid: Ellipsoid) -> Self {
        let n = ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;

        let a_rect = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        Self {
            zone,
            north,
            lon0: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
            e: ellipsoid.eccentricity(),
            k0_a: K0 * a_rect,
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    fn false_northing(&self) -> f64 {
        if self.north {
            0.0
        } else {
            FALSE_NORTHING_SOUTH
        }
    }

    /// Geographic degrees to easting/northing meters.
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ProjectionError::NonFinite(lon, lat));
        }

        let mut dlon = lon - self.lon0;
        // Normalize to [-180, 180)
        dlon = (dlon + 180.0).rem_euclid(360.0) - 180.0;
        if dlon.abs() > MAX_MERIDIAN_OFFSET || lat.abs() > 89.9 {
            return Err(ProjectionError::OutsideZone {
                lon,
                zone: self.zone,
                offset: dlon.abs(),
            });
        }

        let phi = lat.to_radians();
        let lambda = dlon.to_radians();

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();
        let xi_p = (t / lambda.cos()).atan();
        let eta_p = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let easting = FALSE_EASTING + self.k0_a * eta;
        let northing = self.false_northing() + self.k0_a * xi;

        if !easting.is_finite() || !northing.is_finite() {
            return Err(ProjectionError::Diverged);
        }
        Ok((easting, northing))
    }

    /// Easting/northing meters to geographic degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> Result<(f64, f64), ProjectionError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(ProjectionError::NonFinite(easting, northing));
        }

        let xi = (northing - self.false_northing()) / self.k0_a;
        let eta = (easting - FALSE_EASTING) / self.k0_a;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            phi += d * (k * chi).sin();
        }
        let lambda = eta_p.sinh().atan2(xi_p.cos());

        let lat = phi.to_degrees();
        let lon = self.lon0 + lambda.to_degrees();
        if !lat.is_finite() || !lon.is_finite() {
            return Err(ProjectionError::Diverged);
        }
        Ok((lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipsoid::WGS84;

    #[test]
    fn test_central_meridian_equator() {
        let zone = UtmZone::new(31, true, WGS84);
        let (e, n) = zone.forward(3.0, 0.0).unwrap();
        assert!((e - 500000.0).abs() < 1e-6);
        assert!(n.abs() < 1e-6);
    }

    #[test]
    fn test_known_point() {
        // Eiffel tower, zone 31N
        let zone = UtmZone::new(31, true, WGS84);
        let (e, n) = zone.forward(2.2945, 48.8582).unwrap();
        assert!((e - 448251.8).abs() < 1.0, "easting {e}");
        assert!((n - 5411932.7).abs() < 1.0, "northing {n}");
    }

    #[test]
    fn test_roundtrip_south() {
        let zone = UtmZone::new(33, false, WGS84);
        for (lon, lat) in [(15.0, -1.0), (13.4, -33.9), (17.9, -60.0)] {
            let (e, n) = zone.forward(lon, lat).unwrap();
            let (lon2, lat2) = zone.inverse(e, n).unwrap();
            assert!((lon - lon2).abs() < 1e-8, "{lon} vs {lon2}");
            assert!((lat - lat2).abs() < 1e-8, "{lat} vs {lat2}");
        }
    }

    #[test]
    fn test_far_from_zone_fails() {
        let zone = UtmZone::new(32, true, WGS84);
        assert!(matches!(
            zone.forward(170.0, 10.0),
            Err(ProjectionError::OutsideZone { .. })
        ));
    }
}
