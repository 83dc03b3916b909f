//! Polygon rasterization by pixel center.
//!
//! A pixel belongs to the mask when its center lies inside the geometry
//! (even-odd rule over all rings, so holes are excluded).

use geo::{Contains, Coord, LineString, MultiPolygon, Point};
use ndarray::Array2;

use vegtrend_core::GeoTransform;

/// Boolean mask of a `rows` x `cols` grid, `true` inside `geometry`.
///
/// North-up grids are filled row by row from edge crossings at each row's
/// center line; rotated grids fall back to a point-in-polygon test per pixel.
pub fn rasterize_mask(geometry: &MultiPolygon<f64>, transform: &GeoTransform, rows: usize, cols: usize) -> Array2<bool> {
    if transform.is_north_up() && transform.pixel_width > 0.0 {
        scanline_mask(geometry, transform, rows, cols)
    } else {
        Array2::from_shape_fn((rows, cols), |(row, col)| {
            let (x, y) = transform.pixel_to_geo(col, row);
            geometry.contains(&Point::new(x, y))
        })
    }
}

fn scanline_mask(geometry: &MultiPolygon<f64>, transform: &GeoTransform, rows: usize, cols: usize) -> Array2<bool> {
    let mut mask = Array2::from_elem((rows, cols), false);
    let rings: Vec<&LineString<f64>> = geometry
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .collect();

    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..rows {
        let y = transform.origin_y + (row as f64 + 0.5) * transform.pixel_height;

        crossings.clear();
        for ring in &rings {
            for line in ring.lines() {
                if let Some(x) = crossing(line.start, line.end, y) {
                    crossings.push(x);
                }
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let start = first_center_at_or_after(span[0], transform).min(cols);
            let end = first_center_at_or_after(span[1], transform).min(cols);
            for col in start..end {
                mask[[row, col]] = true;
            }
        }
    }

    mask
}

/// X where segment `p`-`q` crosses the horizontal line at `y`. Half-open in
/// y so a vertex shared by two edges is counted once.
fn crossing(p: Coord<f64>, q: Coord<f64>, y: f64) -> Option<f64> {
    if (p.y > y) == (q.y > y) {
        return None;
    }
    let t = (y - p.y) / (q.y - p.y);
    Some(p.x + t * (q.x - p.x))
}

/// Index of the first column whose center x is >= `x`.
fn first_center_at_or_after(x: f64, transform: &GeoTransform) -> usize {
    let col = ((x - transform.origin_x) / transform.pixel_width - 0.5).ceil();
    if col <= 0.0 {
        0
    } else {
        col as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn unit_grid() -> GeoTransform {
        // 10 x 10 grid of 1-unit pixels covering x 0..10, y 0..10
        GeoTransform::new(0.0, 10.0, 1.0, -1.0)
    }

    #[test]
    fn test_square_mask() {
        let square = polygon![
            (x: 2.0, y: 2.0), (x: 6.0, y: 2.0), (x: 6.0, y: 5.0), (x: 2.0, y: 5.0), (x: 2.0, y: 2.0)
        ];
        let mask = rasterize_mask(&MultiPolygon::new(vec![square]), &unit_grid(), 10, 10);

        assert_eq!(mask.iter().filter(|&&m| m).count(), 12);
        // pixel (row 5, col 2) has center (2.5, 4.5)
        assert!(mask[[5, 2]]);
        assert!(!mask[[4, 2]]);
        assert!(!mask[[5, 6]]);
    }

    #[test]
    fn test_hole_is_excluded() {
        let with_hole = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0), (x: 4.0, y: 4.0)]]
        );
        let mask = rasterize_mask(&MultiPolygon::new(vec![with_hole]), &unit_grid(), 10, 10);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 96);
        assert!(!mask[[5, 5]]);
    }

    #[test]
    fn test_scanline_matches_point_in_polygon() {
        let triangle = polygon![
            (x: 0.3, y: 0.7), (x: 9.1, y: 2.2), (x: 4.4, y: 9.6), (x: 0.3, y: 0.7)
        ];
        let geometry = MultiPolygon::new(vec![triangle]);
        let transform = unit_grid();
        let mask = rasterize_mask(&geometry, &transform, 10, 10);

        for ((row, col), &inside) in mask.indexed_iter() {
            let (x, y) = transform.pixel_to_geo(col, row);
            assert_eq!(inside, geometry.contains(&Point::new(x, y)), "pixel ({row}, {col})");
        }
    }
}
