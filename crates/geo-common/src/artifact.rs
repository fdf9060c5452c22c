//! Produced artifacts: encoded bytes plus content-type metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ProcessError;

/// Output encodings the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Png,
    GeoTiff,
    GeoJson,
}

impl ContentType {
    /// MIME type sent back to callers.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::GeoTiff => "image/tiff",
            ContentType::GeoJson => "application/geo+json",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Png => "png",
            ContentType::GeoTiff => "tif",
            ContentType::GeoJson => "geojson",
        }
    }

    /// Whether this format encodes raster data.
    pub fn is_raster(&self) -> bool {
        matches!(self, ContentType::Png | ContentType::GeoTiff)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentType::Png => "png",
            ContentType::GeoTiff => "geotiff",
            ContentType::GeoJson => "geojson",
        })
    }
}

impl FromStr for ContentType {
    type Err = ProcessError;

    /// Accepts short names (`png`) as well as MIME types (`image/png`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" | "image/png" => Ok(ContentType::Png),
            "geotiff" | "tiff" | "tif" | "image/tiff" | "image/geotiff" => {
                Ok(ContentType::GeoTiff)
            }
            "geojson" | "json" | "application/geo+json" | "application/json" => {
                Ok(ContentType::GeoJson)
            }
            _ => Err(ProcessError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// An immutable processing output.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Bytes,
    pub content_type: ContentType,
    /// Version of the source dataset this artifact was produced from.
    pub dataset_version: u64,
    /// CRC32 of `bytes`, checked when served from cache.
    pub checksum: u32,
}

impl Artifact {
    pub fn new(bytes: impl Into<Bytes>, content_type: ContentType, dataset_version: u64) -> Self {
        let bytes = bytes.into();
        let checksum = crc32fast::hash(&bytes);
        Self {
            bytes,
            content_type,
            dataset_version,
            checksum,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.content_type.mime_type()
    }

    /// Check the payload against its recorded checksum.
    pub fn verify(&self) -> bool {
        crc32fast::hash(&self.bytes) == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type() {
        assert_eq!("PNG".parse::<ContentType>().unwrap(), ContentType::Png);
        assert_eq!("image/tiff".parse::<ContentType>().unwrap(), ContentType::GeoTiff);
        assert_eq!(
            "application/geo+json".parse::<ContentType>().unwrap(),
            ContentType::GeoJson
        );
        assert!(matches!(
            "bmp".parse::<ContentType>(),
            Err(ProcessError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let artifact = Artifact::new(vec![1u8, 2, 3, 4], ContentType::Png, 7);
        assert!(artifact.verify());
        assert_eq!(artifact.mime_type(), "image/png");

        let mut tampered = artifact.clone();
        tampered.bytes = Bytes::from_static(&[1, 2, 3, 5]);
        assert!(!tampered.verify());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ContentType::GeoTiff).unwrap();
        assert_eq!(json, "\"geotiff\"");
    }
}
