//! Spatial Reference System identifiers and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{BoundingBox, ProcessError};

/// Half the equatorial circumference of the Web Mercator sphere, in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

/// Degrees either side of a UTM central meridian that still project.
pub const UTM_PROJECTION_HALF_WIDTH: f64 = 15.0;

/// Geodetic datum of a projected SRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datum {
    /// WGS84 ellipsoid
    Wgs84,
    /// ETRS89 (GRS80 ellipsoid)
    Etrs89,
}

/// Spatial reference systems understood by the transform engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Srs {
    /// WGS84 Geographic (lon/lat in degrees)
    Wgs84,
    /// NAD83 Geographic
    Nad83,
    /// Web Mercator (meters)
    WebMercator,
    /// Universal Transverse Mercator (meters)
    Utm { zone: u8, north: bool, datum: Datum },
}

impl Srs {
    /// Parse an SRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326" / "epsg:4326"
    /// - "CRS:84" (WGS84 with lon/lat axis order)
    /// - "EPSG:3857" / "EPSG:900913"
    /// - "EPSG:32632" (WGS84 / UTM 32N), "EPSG:32733" (UTM 33S)
    /// - "EPSG:25832" (ETRS89 / UTM 32N)
    pub fn parse(s: &str) -> Result<Self, ProcessError> {
        let normalized = s.trim().to_uppercase();
        let unsupported = || ProcessError::UnsupportedProjection(s.to_string());

        if normalized == "CRS:84" {
            return Ok(Srs::Wgs84);
        }

        let digits = normalized.strip_prefix("EPSG:").ok_or_else(unsupported)?;
        if digits == "900913" {
            return Ok(Srs::WebMercator);
        }
        if !(4..=5).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unsupported());
        }

        let code: u32 = digits.parse().map_err(|_| unsupported())?;
        Self::from_epsg(code).ok_or_else(unsupported)
    }

    /// Look up an SRS by its numeric EPSG code.
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Srs::Wgs84),
            4269 => Some(Srs::Nad83),
            3857 => Some(Srs::WebMercator),
            32601..=32660 => Some(Srs::Utm {
                zone: (code - 32600) as u8,
                north: true,
                datum: Datum::Wgs84,
            }),
            32701..=32760 => Some(Srs::Utm {
                zone: (code - 32700) as u8,
                north: false,
                datum: Datum::Wgs84,
            }),
            25828..=25838 => Some(Srs::Utm {
                zone: (code - 25800) as u8,
                north: true,
                datum: Datum::Etrs89,
            }),
            _ => None,
        }
    }

    /// Numeric EPSG code.
    pub fn epsg_code(&self) -> u32 {
        match self {
            Srs::Wgs84 => 4326,
            Srs::Nad83 => 4269,
            Srs::WebMercator => 3857,
            Srs::Utm {
                zone,
                north: true,
                datum: Datum::Wgs84,
            } => 32600 + *zone as u32,
            Srs::Utm {
                zone,
                north: false,
                datum: Datum::Wgs84,
            } => 32700 + *zone as u32,
            // ETRS89 UTM codes only exist for the northern hemisphere
            Srs::Utm {
                zone,
                datum: Datum::Etrs89,
                ..
            } => 25800 + *zone as u32,
        }
    }

    /// Check if this is a geographic (lon/lat) SRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Srs::Wgs84 | Srs::Nad83)
    }

    /// Valid bounds for this SRS, in its own units.
    pub fn valid_bounds(&self) -> BoundingBox {
        match self {
            Srs::Wgs84 | Srs::Nad83 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            Srs::WebMercator => BoundingBox::new(
                -WEB_MERCATOR_EXTENT,
                -WEB_MERCATOR_EXTENT,
                WEB_MERCATOR_EXTENT,
                WEB_MERCATOR_EXTENT,
            ),
            Srs::Utm { north: true, .. } => {
                BoundingBox::new(166021.44, 0.0, 833978.56, 9329005.18)
            }
            Srs::Utm { north: false, .. } => {
                BoundingBox::new(166021.44, 1116915.04, 833978.56, 10000000.0)
            }
        }
    }

    /// Geographic area (lon/lat degrees) in which this SRS is usable.
    pub fn geographic_area(&self) -> BoundingBox {
        match self {
            Srs::Wgs84 | Srs::Nad83 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            // Web Mercator is clipped to a square world
            Srs::WebMercator => BoundingBox::new(-180.0, -85.06, 180.0, 85.06),
            Srs::Utm { zone, north, .. } => {
                let west = (*zone as f64 - 1.0) * 6.0 - 180.0;
                if *north {
                    BoundingBox::new(west, 0.0, west + 6.0, 84.0)
                } else {
                    BoundingBox::new(west, -80.0, west + 6.0, 0.0)
                }
            }
        }
    }

    /// Geographic area (lon/lat degrees) that coordinates can be projected
    /// into this SRS from. Wider than [`Srs::geographic_area`] for UTM:
    /// datasets often run past their zone edge and the projection stays
    /// accurate there.
    pub fn projection_area(&self) -> BoundingBox {
        match self {
            Srs::Utm { zone, north, .. } => {
                let lon0 = (*zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;
                let west = lon0 - UTM_PROJECTION_HALF_WIDTH;
                let east = lon0 + UTM_PROJECTION_HALF_WIDTH;
                if *north {
                    BoundingBox::new(west, 0.0, east, 84.0)
                } else {
                    BoundingBox::new(west, -80.0, east, 0.0)
                }
            }
            srs => srs.geographic_area(),
        }
    }

    /// Whether coordinates in `self` and `other` are interchangeable without math.
    ///
    /// The WGS84/NAD83 datum shift (about a meter) is ignored.
    pub fn is_equivalent(&self, other: &Srs) -> bool {
        self == other || (self.is_geographic() && other.is_geographic())
    }
}

impl fmt::Display for Srs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg_code())
    }
}

impl FromStr for Srs {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Srs::parse(s)
    }
}

impl TryFrom<String> for Srs {
    type Error = ProcessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Srs::parse(&value)
    }
}

impl From<Srs> for String {
    fn from(srs: Srs) -> Self {
        srs.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_srs() {
        assert_eq!(Srs::parse("EPSG:4326").unwrap(), Srs::Wgs84);
        assert_eq!(Srs::parse("epsg:3857").unwrap(), Srs::WebMercator);
        assert_eq!(Srs::parse("CRS:84").unwrap(), Srs::Wgs84);
        assert_eq!(Srs::parse("EPSG:900913").unwrap(), Srs::WebMercator);
        assert_eq!(
            Srs::parse("EPSG:32632").unwrap(),
            Srs::Utm {
                zone: 32,
                north: true,
                datum: Datum::Wgs84
            }
        );
        assert_eq!(
            Srs::parse("EPSG:25832").unwrap(),
            Srs::Utm {
                zone: 32,
                north: true,
                datum: Datum::Etrs89
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            Srs::parse("EPSG:99999"),
            Err(ProcessError::UnsupportedProjection(_))
        ));
        assert!(Srs::parse("EPSG:123").is_err());
        assert!(Srs::parse("EPSG:4326a").is_err());
        assert!(Srs::parse("+proj=longlat").is_err());
    }

    #[test]
    fn test_epsg_roundtrip() {
        for code in [4326, 4269, 3857, 32601, 32660, 32701, 32760, 25828, 25838] {
            let srs = Srs::from_epsg(code).unwrap();
            assert_eq!(srs.epsg_code(), code);
            assert_eq!(Srs::parse(&srs.to_string()).unwrap(), srs);
        }
    }

    #[test]
    fn test_utm_geographic_area() {
        let area = Srs::parse("EPSG:32632").unwrap().geographic_area();
        assert_eq!(area.min_x, 6.0);
        assert_eq!(area.max_x, 12.0);
    }

    #[test]
    fn test_utm_projection_area_spans_neighbour_zones() {
        let srs = Srs::parse("EPSG:32632").unwrap();
        let area = srs.projection_area();
        assert_eq!(area.min_x, 9.0 - UTM_PROJECTION_HALF_WIDTH);
        assert_eq!(area.max_x, 9.0 + UTM_PROJECTION_HALF_WIDTH);
        assert!(area.contains(&srs.geographic_area()));
        assert_eq!(Srs::WebMercator.projection_area(), Srs::WebMercator.geographic_area());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Srs::WebMercator).unwrap();
        assert_eq!(json, "\"EPSG:3857\"");
        let srs: Srs = serde_json::from_str("\"EPSG:32733\"").unwrap();
        assert_eq!(srs.epsg_code(), 32733);
        assert!(serde_json::from_str::<Srs>("\"EPSG:1\"").is_err());
    }
}
