//! GeoTIFF encoding of single-band rasters.
//!
//! Writes a 32-bit float grayscale image with ModelPixelScale,
//! ModelTiepoint and GeoKeyDirectory tags so the output can be opened
//! directly by GIS tools. Samples are downcast from `f64` here and nowhere
//! earlier.

use std::io::{Cursor, Seek, Write};

use geo_common::Srs;
use grid_processor::RasterWindow;
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::error::{RenderError, Result};

// GeoTIFF Tag IDs (not in standard tiff crate)
pub const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
pub const GEOTIFF_MODELTIEPOINT: u16 = 33922;
pub const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
pub const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
pub const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Encode a raster window as an uncompressed GeoTIFF in memory.
pub fn encode_geotiff(window: &RasterWindow, srs: Srs) -> Result<Vec<u8>> {
    if window.width == 0 || window.height == 0 {
        return Err(RenderError::EmptyImage {
            width: window.width,
            height: window.height,
        });
    }

    // Missing samples are written as the declared nodata value, else NaN
    let fill = window.nodata.unwrap_or(f64::NAN);
    let samples: Vec<f32> = window
        .data
        .iter()
        .map(|&v| if window.is_nodata(v) { fill as f32 } else { v as f32 })
        .collect();

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor)?;
        let mut image =
            encoder.new_image::<Gray32Float>(window.width as u32, window.height as u32)?;
        write_geotiff_tags(image.encoder(), window, srs, fill)?;
        image.write_data(&samples)?;
    }

    Ok(cursor.into_inner())
}

fn write_geotiff_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    window: &RasterWindow,
    srs: Srs,
    nodata: f64,
) -> Result<()> {
    let gt = &window.transform;

    // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
    let pixel_scale = [gt.pixel_width, gt.pixel_height, 0.0];
    dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

    // ModelTiepoint ties pixel (0, 0) to the top-left corner
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;

    let geokeys = build_geokey_directory(srs);
    dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

    let nodata = if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    };
    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;

    Ok(())
}

/// GeoKeyDirectory: header followed by (KeyID, TIFFTagLocation, Count, Value).
fn build_geokey_directory(srs: Srs) -> Vec<u16> {
    let (model_type, crs_key) = if srs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    vec![
        1, 1, 0, 3, // version, revision, minor revision, key count
        GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, srs.epsg_code() as u16,
    ]
}

/// Read the EPSG code out of a GeoKeyDirectory, if present.
pub fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    keys.get(4..4 + count * 4)?
        .chunks_exact(4)
        .find(|key| {
            (key[0] == PROJECTED_CS_TYPE_GEO_KEY || key[0] == GEOGRAPHIC_TYPE_GEO_KEY)
                && key[1] == 0
        })
        .map(|key| key[3] as u32)
}
