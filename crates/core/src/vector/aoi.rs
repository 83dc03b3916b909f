//! Area of interest: unioned polygons tagged with their CRS

use std::path::Path;

use geo::{BooleanOps, BoundingRect, Contains, CoordsIter, MapCoords};
use geo_types::{Coord, MultiPolygon, Point, Polygon};
use tracing::debug;

use crate::crs::{Reprojector, CRS};
use crate::error::{Error, Result};
use crate::vector::BBox;

/// One or more polygons, unioned into a single multipolygon at
/// construction, together with the CRS their coordinates are expressed in.
///
/// Immutable: [`AreaOfInterest::reproject`] returns a new instance and leaves
/// the source untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    geometry: MultiPolygon<f64>,
    crs: CRS,
}

impl AreaOfInterest {
    /// Union `polygons` into one geometry.
    pub fn new(polygons: Vec<Polygon<f64>>, crs: CRS) -> Result<Self> {
        let part_count = polygons.len();
        let mut parts = polygons.into_iter();
        let Some(first) = parts.next() else {
            return Err(Error::InvalidAoi("no polygon geometry".into()));
        };

        let geometry = parts.fold(MultiPolygon::new(vec![first]), |acc, p| {
            acc.union(&MultiPolygon::new(vec![p]))
        });

        if geometry.0.is_empty() {
            return Err(Error::InvalidAoi("union of the input polygons is empty".into()));
        }

        debug!(
            input_parts = part_count,
            unioned_parts = geometry.0.len(),
            crs = %crs,
            "built area of interest"
        );

        Ok(Self { geometry, crs })
    }

    /// Load an AOI from a GeoJSON file
    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::vector::read_aoi_geojson(path)
    }

    /// Parse an AOI from GeoJSON text
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        crate::vector::parse_aoi_geojson(text)
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Bounding box in the AOI's own CRS
    pub fn bbox(&self) -> BBox {
        self.geometry
            .bounding_rect()
            .map(BBox::from)
            .unwrap_or_else(|| BBox::from_points(std::iter::empty()))
    }

    /// Whether a point lies strictly inside the AOI
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.geometry.contains(&Point::new(x, y))
    }

    /// Same area expressed in `target`. Vertices are transformed one by one;
    /// edges are not densified.
    pub fn reproject(&self, target: &CRS) -> Result<Self> {
        if self.crs.is_equivalent(target) {
            return Ok(self.clone());
        }

        let reprojector = Reprojector::new(&self.crs, target)?;
        let geometry = self.geometry.map_coords(|c| {
            let (x, y) = reprojector.transform(c.x, c.y);
            Coord { x, y }
        });

        if has_non_finite(&geometry) {
            return Err(Error::InvalidAoi(format!(
                "reprojection from {} to {} produced non-finite coordinates",
                self.crs, target
            )));
        }

        Ok(Self {
            geometry,
            crs: target.clone(),
        })
    }

    /// GeoJSON geometry object for catalog `intersects` queries
    pub fn to_geojson_geometry(&self) -> serde_json::Value {
        let ring = |ls: &geo_types::LineString<f64>| -> Vec<[f64; 2]> {
            ls.coords().map(|c| [c.x, c.y]).collect()
        };
        let polygon = |p: &Polygon<f64>| -> Vec<Vec<[f64; 2]>> {
            std::iter::once(p.exterior())
                .chain(p.interiors())
                .map(ring)
                .collect()
        };

        if self.geometry.0.len() == 1 {
            serde_json::json!({
                "type": "Polygon",
                "coordinates": polygon(&self.geometry.0[0]),
            })
        } else {
            serde_json::json!({
                "type": "MultiPolygon",
                "coordinates": self.geometry.iter().map(polygon).collect::<Vec<_>>(),
            })
        }
    }
}

/// Whether any vertex, hole vertices included, is NaN or infinite.
fn has_non_finite(geometry: &MultiPolygon<f64>) -> bool {
    geometry
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::Area;
    use geo_types::LineString;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_overlapping_parts_are_unioned() {
        let aoi = AreaOfInterest::new(
            vec![square(0.0, 0.0, 2.0), square(1.0, 0.0, 2.0)],
            CRS::from_epsg(32630),
        )
        .unwrap();

        assert_eq!(aoi.geometry().0.len(), 1);
        assert_abs_diff_eq!(aoi.geometry().unsigned_area(), 6.0, epsilon = 1e-9);
        assert_eq!(aoi.bbox(), BBox::new(0.0, 0.0, 3.0, 2.0));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(AreaOfInterest::new(vec![], CRS::wgs84()).is_err());
    }

    #[test]
    fn test_reproject_returns_new_instance() {
        let aoi = AreaOfInterest::new(vec![square(-3.8, 40.3, 0.1)], CRS::wgs84()).unwrap();
        let utm = aoi.reproject(&CRS::from_epsg(32630)).unwrap();

        assert_eq!(aoi.crs().epsg(), Some(4326));
        assert_eq!(utm.crs().epsg(), Some(32630));

        let b = utm.bbox();
        assert!(b.min_x > 400_000.0 && b.max_x < 600_000.0);
        assert!(b.min_y > 4_400_000.0 && b.max_y < 4_500_000.0);

        let back = utm.reproject(&CRS::wgs84()).unwrap();
        assert_abs_diff_eq!(back.bbox().min_x, -3.8, epsilon = 1e-6);
        assert_abs_diff_eq!(back.bbox().max_y, 40.4, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_hole_vertex_detected() {
        let hole = LineString::from(vec![(2.0, 2.0), (4.0, 2.0), (4.0, f64::NAN), (2.0, 2.0)]);
        let mut holed = square(0.0, 0.0, 10.0);
        holed.interiors_push(hole);

        assert!(!has_non_finite(&MultiPolygon(vec![square(0.0, 0.0, 10.0)])));
        assert!(has_non_finite(&MultiPolygon(vec![holed])));
    }

    #[test]
    fn test_contains_point() {
        let aoi = AreaOfInterest::new(vec![square(0.0, 0.0, 10.0)], CRS::from_epsg(32630)).unwrap();
        assert!(aoi.contains_point(5.0, 5.0));
        assert!(!aoi.contains_point(15.0, 5.0));
    }
}
