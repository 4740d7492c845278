//! Zonal sum of a raster over one region.
//!
//! A cell belongs to a region when its centre is inside the polygon under the
//! even-odd rule. Rows are scanned at their centre latitude: every ring edge
//! that crosses the row contributes one x-intersection, and sorted
//! intersections pair up into inside spans `[x_a, x_b)`. Crossings use the
//! half-open test `(y_a > y) != (y_b > y)`, so a centre on an edge shared by
//! two adjacent regions is counted by exactly one of them.

use geo::{LineString, MultiPolygon};

use crate::grid::RasterGrid;
use crate::regions::Region;

/// Retained-cell breakdown of one overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayStats {
    pub sum: f64,
    /// Cells inside the region carrying a value.
    pub valid_cells: usize,
    /// Cells inside the region marked no-data (or NaN).
    pub nodata_cells: usize,
}

/// Population of `grid` inside `region`.
pub fn overlay(grid: &RasterGrid, region: &Region) -> f64 {
    overlay_stats(grid, region).sum
}

pub fn overlay_stats(grid: &RasterGrid, region: &Region) -> OverlayStats {
    let mut stats = OverlayStats::default();
    let Some((rows, cols)) = window(grid, region) else {
        return stats;
    };

    let t = &grid.transform;
    let mut xs: Vec<f64> = Vec::new();
    for row in rows.0..rows.1 {
        let y = t.center_y(row);
        xs.clear();
        row_crossings(region.geometry(), y, &mut xs);
        xs.sort_by(|a, b| a.total_cmp(b));

        for span in xs.chunks_exact(2) {
            // Column c is inside when x_a <= centre(c) < x_b.
            let start = t.col_of(span[0]).ceil().max(cols.0 as f64) as usize;
            let end = t.col_of(span[1]).ceil().min(cols.1 as f64);
            if end <= start as f64 {
                continue;
            }
            let end = end as usize;
            let base = row * grid.width;
            for &v in &grid.data[base + start..base + end] {
                if grid.is_valid(v) {
                    stats.sum += v as f64;
                    stats.valid_cells += 1;
                } else {
                    stats.nodata_cells += 1;
                }
            }
        }
    }
    stats
}

/// Row and column ranges (half-open) covering the region's bounding
/// rectangle, padded by one cell so rounding never drops a centre the
/// crossing test would keep. None when the rectangle misses the grid.
fn window(grid: &RasterGrid, region: &Region) -> Option<((usize, usize), (usize, usize))> {
    let bbox = region.bbox();
    let (gx0, gy0, gx1, gy1) = grid.extent();
    if bbox.max().x < gx0 || bbox.min().x > gx1 || bbox.max().y < gy0 || bbox.min().y > gy1 {
        return None;
    }

    let t = &grid.transform;
    let clamp = |v: f64, hi: usize| -> usize { v.max(0.0).min(hi as f64) as usize };
    let col_lo = clamp(t.col_of(bbox.min().x).floor(), grid.width);
    let col_hi = clamp(t.col_of(bbox.max().x).ceil() + 1.0, grid.width);
    // Rows grow southwards: the north edge gives the first row.
    let row_lo = clamp(t.row_of(bbox.max().y).floor(), grid.height);
    let row_hi = clamp(t.row_of(bbox.min().y).ceil() + 1.0, grid.height);

    if col_lo >= col_hi || row_lo >= row_hi {
        return None;
    }
    Some(((row_lo, row_hi), (col_lo, col_hi)))
}

fn row_crossings(geometry: &MultiPolygon<f64>, y: f64, out: &mut Vec<f64>) {
    for polygon in geometry.iter() {
        ring_crossings(polygon.exterior(), y, out);
        for hole in polygon.interiors() {
            ring_crossings(hole, y, out);
        }
    }
}

fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for line in ring.lines() {
        // Interpolate from the lower endpoint so a shared edge yields the same
        // x whichever way the ring walks it.
        let (a, b) = if line.start.y <= line.end.y {
            (line.start, line.end)
        } else {
            (line.end, line.start)
        };
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}
