//! Pixel windows over a raster grid

use crate::raster::GeoTransform;
use crate::vector::BBox;

/// A rectangular block of pixels: offsets and size in the full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, cols: usize, rows: usize) -> Self {
        Self { col_off, row_off, cols, rows }
    }

    /// The whole `cols` x `rows` image
    pub fn full(cols: usize, rows: usize) -> Self {
        Self::new(0, 0, cols, rows)
    }

    /// Pixels of a `cols` x `rows` grid touched by `bbox`, clamped to the
    /// grid. `None` when the box misses the grid entirely.
    pub fn from_bbox(bbox: &BBox, transform: &GeoTransform, cols: usize, rows: usize) -> Option<Self> {
        if bbox.is_empty() {
            return None;
        }

        // For north-up images min_y maps to the last row and max_y to the first.
        let (col_a, row_a) = transform.geo_to_pixel(bbox.min_x, bbox.max_y);
        let (col_b, row_b) = transform.geo_to_pixel(bbox.max_x, bbox.min_y);
        if !(col_a.is_finite() && col_b.is_finite() && row_a.is_finite() && row_b.is_finite()) {
            return None;
        }

        let clamp = |v: f64, hi: usize| -> usize { (v.max(0.0) as usize).min(hi) };
        let min_col = clamp(col_a.min(col_b).floor(), cols);
        let max_col = clamp(col_a.max(col_b).ceil(), cols);
        let min_row = clamp(row_a.min(row_b).floor(), rows);
        let max_row = clamp(row_a.max(row_b).ceil(), rows);

        if min_col >= max_col || min_row >= max_row {
            return None;
        }

        Some(Self::new(min_col, min_row, max_col - min_col, max_row - min_row))
    }

    pub fn col_end(&self) -> usize {
        self.col_off + self.cols
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.rows
    }

    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overlap with another window, if any
    pub fn intersection(&self, other: &PixelWindow) -> Option<PixelWindow> {
        let col_off = self.col_off.max(other.col_off);
        let row_off = self.row_off.max(other.row_off);
        let col_end = self.col_end().min(other.col_end());
        let row_end = self.row_end().min(other.row_end());
        (col_off < col_end && row_off < row_end)
            .then(|| PixelWindow::new(col_off, row_off, col_end - col_off, row_end - row_off))
    }
}
