//! GeoTIFF loading.
//!
//! Population rasters are single-band GeoTIFFs. Georeferencing comes from the
//! GeoTIFF tags:
//!   ModelPixelScaleTag  (33550)  [sx, sy, sz]
//!   ModelTiepointTag    (33922)  [i, j, k, x, y, z]
//!   GeoKeyDirectoryTag  (34735)  header + 4-short key entries
//!   GDAL_NODATA         (42113)  ASCII no-data value
//! Rotated rasters (ModelTransformationTag) are not supported.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::catalog::RasterDescriptor;
use crate::coords::ReferenceFrame;
use crate::error::{Error, Result};
use crate::grid::{GeoTransform, RasterGrid};

pub(crate) const MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const MODEL_TIEPOINT: u16 = 33922;
pub(crate) const GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const GDAL_NODATA: u16 = 42113;

const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Where the aggregator gets pixel data from.
pub trait GridSource: Sync {
    fn load(&self, descriptor: &RasterDescriptor) -> Result<RasterGrid>;
}

/// Reads GeoTIFFs from disk and rejects any whose frame is not `expected`.
#[derive(Debug, Clone, Copy)]
pub struct GeoTiffSource {
    pub expected: ReferenceFrame,
}

impl GeoTiffSource {
    pub fn new(expected: ReferenceFrame) -> Self {
        Self { expected }
    }
}

impl GridSource for GeoTiffSource {
    fn load(&self, descriptor: &RasterDescriptor) -> Result<RasterGrid> {
        let grid = read_geotiff(&descriptor.path)?;
        if grid.frame != self.expected {
            return Err(Error::frame(
                &descriptor.path,
                format!("raster is {}, regions are {}", grid.frame, self.expected),
            ));
        }
        Ok(grid)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GeoKeys {
    pub pixel_is_point: bool,
    /// EPSG code from ProjectedCSTypeGeoKey, else GeographicTypeGeoKey.
    pub epsg: Option<u16>,
}

/// Decode the inline (SHORT) entries of a GeoKeyDirectory.
pub(crate) fn parse_geokeys(dir: &[u16]) -> GeoKeys {
    let mut keys = GeoKeys::default();
    let mut geographic = None;
    let mut projected = None;
    // Header: version, revision, minor revision, number of keys.
    let n_keys = dir.get(3).copied().unwrap_or(0) as usize;
    for entry in dir.chunks_exact(4).skip(1).take(n_keys) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            // Value lives in GeoDoubleParams / GeoAsciiParams; none we need.
            continue;
        }
        match id {
            KEY_RASTER_TYPE => keys.pixel_is_point = value == RASTER_PIXEL_IS_POINT,
            KEY_GEOGRAPHIC_TYPE => geographic = Some(value),
            KEY_PROJECTED_TYPE => projected = Some(value),
            _ => {}
        }
    }
    keys.epsg = projected.or(geographic);
    keys
}

/// Build the placement from pixel scale and the first tiepoint.
pub(crate) fn transform_from_tags(scale: &[f64], tiepoint: &[f64], pixel_is_point: bool) -> Option<GeoTransform> {
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    let (sx, sy) = (scale[0], scale[1]);
    if !(sx > 0.0 && sy > 0.0) {
        return None;
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let mut t = GeoTransform {
        origin_x: x - i * sx,
        origin_y: y + j * sy,
        pixel_width: sx,
        pixel_height: sy,
    };
    if pixel_is_point {
        // Tiepoint refers to the cell centre.
        t.origin_x -= sx / 2.0;
        t.origin_y += sy / 2.0;
    }
    Some(t)
}

fn to_f32(img: DecodingResult) -> Vec<f32> {
    match img {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}

/// Read a single-band GeoTIFF into a grid. Frame checks are left to the caller.
pub fn read_geotiff(path: &Path) -> Result<RasterGrid> {
    let file = File::open(path).map_err(|e| Error::load(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| Error::load(path, format!("not a valid TIFF: {e}")))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(|e| Error::load(path, e))?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(Error::load(path, "zero-sized raster"));
    }
    match decoder.colortype().map_err(|e| Error::load(path, e))? {
        ColorType::Gray(_) => {}
        other => return Err(Error::load(path, format!("expected a single band, found {other:?}"))),
    }

    let scale = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .map_err(|e| Error::load(path, e))?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(|e| Error::load(path, e))?;
    let tiepoint = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .map_err(|e| Error::load(path, e))?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(|e| Error::load(path, e))?;
    let geokeys = decoder
        .find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .map_err(|e| Error::load(path, e))?
        .map(|v| v.into_u16_vec())
        .transpose()
        .map_err(|e| Error::load(path, e))?
        .map(|dir| parse_geokeys(&dir))
        .ok_or_else(|| Error::frame(path, "no GeoKeyDirectory"))?;
    let nodata = decoder
        .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))
        .map_err(|e| Error::load(path, e))?
        .map(|v| v.into_string())
        .transpose()
        .map_err(|e| Error::load(path, e))?;

    let (Some(scale), Some(tiepoint)) = (scale, tiepoint) else {
        return Err(Error::load(path, "missing ModelPixelScale/ModelTiepoint georeferencing"));
    };
    let transform = transform_from_tags(&scale, &tiepoint, geokeys.pixel_is_point)
        .ok_or_else(|| Error::load(path, "malformed georeferencing tags"))?;

    let frame = match geokeys.epsg {
        Some(code) if code != 0 && code != USER_DEFINED => ReferenceFrame::from_epsg(u32::from(code)),
        Some(_) => return Err(Error::frame(path, "user-defined or undefined reference frame")),
        None => return Err(Error::frame(path, "raster declares no EPSG reference frame")),
    };

    let nodata = match nodata {
        Some(s) => {
            let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            let v: f64 = s
                .parse()
                .map_err(|_| Error::load(path, format!("bad GDAL_NODATA value `{s}`")))?;
            Some(v as f32)
        }
        None => None,
    };

    let img = decoder.read_image().map_err(|e| Error::load(path, e))?;
    let data = to_f32(img);
    if data.len() != width * height {
        return Err(Error::load(
            path,
            format!("decoded {} pixels, expected {}×{}", data.len(), width, height),
        ));
    }

    debug!(path = %path.display(), width, height, %frame, ?nodata, "loaded raster");
    Ok(RasterGrid { data, width, height, transform, frame, nodata })
}
