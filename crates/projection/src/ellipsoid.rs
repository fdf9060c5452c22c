//! Reference ellipsoids.

/// An oblate ellipsoid defined by semi-major axis and flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (meters)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

pub const WGS84: Ellipsoid = Ellipsoid {
    a: 6378137.0,
    f: 1.0 / 298.257223563,
};

pub const GRS80: Ellipsoid = Ellipsoid {
    a: 6378137.0,
    f: 1.0 / 298.257222101,
};

impl Ellipsoid {
    /// First eccentricity.
    pub fn eccentricity(&self) -> f64 {
        (self.f * (2.0 - self.f)).sqrt()
    }

    /// Third flattening, n = f / (2 - f).
    pub fn third_flattening(&self) -> f64 {
        self.f / (2.0 - self.f)
    }
}
