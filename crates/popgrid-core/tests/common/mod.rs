//! Fixture writers shared by the integration tests.
#![allow(dead_code)]

use std::fs::{self, File};
use std::path::Path;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const NODATA: f32 = -99999.0;

/// Placement and frame of a synthetic raster.
#[derive(Clone, Copy)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel: f64,
    pub epsg: u16,
}

/// 6×4 cells of 0.5° over lon 10..13, lat 44..46.
pub const ITALY_ISH: Layout = Layout { width: 6, height: 4, origin_x: 10.0, origin_y: 46.0, pixel: 0.5, epsg: 4326 };

/// Write a single-band Float32 GeoTIFF with GDAL_NODATA set.
pub fn write_geotiff(path: &Path, layout: Layout, data: &[f32]) {
    assert_eq!(data.len(), layout.width * layout.height);
    let file = File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(file).unwrap();
    let mut image = tiff
        .new_image::<colortype::Gray32Float>(layout.width as u32, layout.height as u32)
        .unwrap();

    let scale = [layout.pixel, layout.pixel, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, layout.origin_x, layout.origin_y, 0.0];
    let key = if layout.epsg == 3857 { 3072 } else { 2048 };
    let model = if layout.epsg == 3857 { 1 } else { 2 };
    let geokeys = [1u16, 1, 0, 3, 1024, 0, 1, model, 1025, 0, 1, 1, key, 0, 1, layout.epsg];

    image.encoder().write_tag(Tag::from_u16_exhaustive(33550), &scale[..]).unwrap();
    image.encoder().write_tag(Tag::from_u16_exhaustive(33922), &tiepoint[..]).unwrap();
    image.encoder().write_tag(Tag::from_u16_exhaustive(34735), &geokeys[..]).unwrap();
    image.encoder().write_tag(Tag::from_u16_exhaustive(42113), "-99999").unwrap();
    image.write_data(data).unwrap();
}

/// Cell values `base + row * width + col`, with the north-west cell set to no-data.
pub fn ramp(layout: Layout, base: f32) -> Vec<f32> {
    let mut data: Vec<f32> = (0..layout.width * layout.height).map(|i| base + i as f32).collect();
    data[0] = NODATA;
    data
}

/// Sum of the valid cells of `ramp(layout, base)`.
pub fn ramp_total(layout: Layout, base: f32) -> f64 {
    ramp(layout, base).iter().filter(|&&v| v != NODATA).map(|&v| v as f64).sum()
}

/// GeoJSON FeatureCollection of axis-aligned boxes keyed by `NAME_1`.
pub fn write_boxes(path: &Path, boxes: &[(&str, [f64; 4])]) {
    let features: Vec<String> = boxes
        .iter()
        .map(|(name, [x0, y0, x1, y1])| {
            format!(
                r#"{{"type":"Feature","properties":{{"NAME_1":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}"#
            )
        })
        .collect();
    fs::write(
        path,
        format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(",")),
    )
    .unwrap();
}

/// Three provinces that exactly tile `ITALY_ISH`.
pub fn write_provinces(path: &Path) {
    write_boxes(
        path,
        &[
            ("Ovest", [10.0, 44.0, 11.5, 46.0]),
            ("Nordest", [11.5, 45.0, 13.0, 46.0]),
            ("Sudest", [11.5, 44.0, 13.0, 45.0]),
        ],
    );
}
