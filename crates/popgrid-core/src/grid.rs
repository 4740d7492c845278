use crate::coords::ReferenceFrame;

/// Affine placement of a north-up raster: top-left corner plus cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X (longitude / easting) of the west edge of column 0.
    pub origin_x: f64,
    /// Y (latitude / northing) of the north edge of row 0.
    pub origin_y: f64,
    /// Cell width, positive.
    pub pixel_width: f64,
    /// Cell height, positive; rows run north → south.
    pub pixel_height: f64,
}

impl GeoTransform {
    #[inline]
    pub fn center_x(&self, col: usize) -> f64 {
        self.origin_x + (col as f64 + 0.5) * self.pixel_width
    }

    #[inline]
    pub fn center_y(&self, row: usize) -> f64 {
        self.origin_y - (row as f64 + 0.5) * self.pixel_height
    }

    /// Fractional column whose centre sits at `x` (column `c` has centre at `c`).
    #[inline]
    pub(crate) fn col_of(&self, x: f64) -> f64 {
        (x - self.origin_x) / self.pixel_width - 0.5
    }

    /// Fractional row whose centre sits at `y`.
    #[inline]
    pub(crate) fn row_of(&self, y: f64) -> f64 {
        (self.origin_y - y) / self.pixel_height - 0.5
    }
}

/// A single-band population raster, row-major, row 0 = northernmost.
/// Pixel values are f32; coordinate math uses f64.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub frame: ReferenceFrame,
    /// Sentinel marking cells without a measurement. NaN is always treated as no data.
    pub nodata: Option<f32>,
}

impl RasterGrid {
    /// Create a grid filled with `fill`.
    pub fn new(width: usize, height: usize, transform: GeoTransform, frame: ReferenceFrame, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            transform,
            frame,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// True if `v` carries a measurement.
    #[inline]
    pub fn is_valid(&self, v: f32) -> bool {
        !v.is_nan() && self.nodata != Some(v)
    }

    /// (min_x, min_y, max_x, max_y) of the outer cell edges.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let t = &self.transform;
        let max_x = t.origin_x + self.width as f64 * t.pixel_width;
        let min_y = t.origin_y - self.height as f64 * t.pixel_height;
        (t.origin_x, min_y, max_x, t.origin_y)
    }

    /// Sum of every valid cell.
    pub fn total(&self) -> f64 {
        self.data
            .iter()
            .filter(|&&v| self.is_valid(v))
            .map(|&v| v as f64)
            .sum()
    }
}
