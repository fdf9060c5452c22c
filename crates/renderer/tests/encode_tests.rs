//! Tests for the PNG and GeoTIFF encoders.

use geo_common::{BoundingBox, Srs};
use grid_processor::{GeoTransform, RasterWindow};
use renderer::geotiff::{epsg_from_geokeys, GEOTIFF_GEOKEYDIRECTORY, GEOTIFF_MODELTIEPOINT};
use renderer::png::{create_png, create_png_auto};
use renderer::{encode_geotiff, encode_png, ColorRamp, RasterStyle};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

// ============================================================================
// Helper functions
// ============================================================================

fn ramp_window(width: usize, height: usize) -> RasterWindow {
    let data = (0..width * height)
        .map(|i| (i % width) as f64 / width as f64)
        .collect();
    let gt = GeoTransform::from_extent(&BoundingBox::new(-10.0, -10.0, 10.0, 10.0), width, height);
    RasterWindow::new(data, width, height, gt, Some(-9999.0)).unwrap()
}

fn ihdr(png: &[u8]) -> (u32, u32, u8) {
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    (width, height, png[25])
}

// ============================================================================
// PNG
// ============================================================================

#[test]
fn test_png_signature_and_header() {
    let png = encode_png(&ramp_window(256, 256), &RasterStyle::default()).unwrap();

    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    let (w, h, color_type) = ihdr(&png);
    assert_eq!((w, h), (256, 256));
    // 256 grey levels fit a palette
    assert_eq!(color_type, 3);
    assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
}

#[test]
fn test_png_is_deterministic() {
    let window = ramp_window(128, 64);
    let style = RasterStyle {
        ramp: ColorRamp::Viridis,
        range: Some((0.0, 1.0)),
    };
    let a = encode_png(&window, &style).unwrap();
    let b = encode_png(&window, &style).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_png_falls_back_to_rgba() {
    // 300 distinct colours
    let pixels: Vec<u8> = (0..300u32)
        .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7, 255])
        .collect();
    let png = create_png_auto(&pixels, 30, 10).unwrap();
    assert_eq!(ihdr(&png).2, 6);

    let explicit = create_png(&pixels, 30, 10).unwrap();
    assert_eq!(png, explicit);
}

#[test]
fn test_nodata_is_transparent() {
    let mut window = ramp_window(4, 1);
    window.data[0] = -9999.0;
    let pixels = renderer::render_raster(&window, &RasterStyle::default()).unwrap();
    assert_eq!(pixels[3], 0);
    assert_eq!(pixels[7], 255);
}

// ============================================================================
// GeoTIFF
// ============================================================================

#[test]
fn test_geotiff_readback() {
    let mut window = ramp_window(16, 8);
    window.data[3] = f64::NAN;
    let bytes = encode_geotiff(&window, Srs::WebMercator).unwrap();

    let mut decoder = Decoder::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (16, 8));

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(GEOTIFF_MODELTIEPOINT))
        .unwrap();
    assert_eq!(&tiepoint[3..5], &[-10.0, 10.0]);

    let keys = decoder
        .get_tag_u16_vec(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY))
        .unwrap();
    assert_eq!(epsg_from_geokeys(&keys), Some(3857));

    match decoder.read_image().unwrap() {
        DecodingResult::F32(data) => {
            assert_eq!(data.len(), 128);
            assert_eq!(data[3], -9999.0);
            assert_eq!(data[1], (1.0f64 / 16.0) as f32);
        }
        _ => panic!("expected f32 samples"),
    }
}

#[test]
fn test_geotiff_is_deterministic() {
    let window = ramp_window(32, 32);
    assert_eq!(
        encode_geotiff(&window, Srs::Wgs84).unwrap(),
        encode_geotiff(&window, Srs::Wgs84).unwrap()
    );
}
