//! Clip a raster to an area of interest.
//!
//! The AOI is brought into the raster's CRS (the raster itself is never
//! resampled), the raster is cropped to the AOI's bounding window, and
//! pixels whose centers fall outside the AOI are set to nodata.

use std::borrow::Cow;

use ndarray::Array2;
use tracing::{debug, warn};

use vegtrend_core::{AreaOfInterest, PixelWindow, Raster, RasterElement, Result};

use super::rasterize::rasterize_mask;

/// A raster restricted to the AOI's bounding extent.
#[derive(Debug, Clone)]
pub struct ClippedRaster<T: RasterElement> {
    /// Cropped cells; cells outside the AOI hold the nodata sentinel
    pub raster: Raster<T>,
    /// Number of cells whose centers lie inside the AOI
    pub retained: usize,
}

impl<T: RasterElement> ClippedRaster<T> {
    /// Whether the AOI missed the raster entirely.
    pub fn is_empty(&self) -> bool {
        self.retained == 0
    }
}

/// Clip `raster` to `aoi`.
///
/// When the CRSs differ the AOI is reprojected to the raster's CRS. A raster
/// without CRS is assumed to share the AOI's. If the AOI does not overlap
/// the raster the result has zero retained cells; this is not an error.
///
/// The output's nodata is the input's, or the element type's default when
/// the input has none.
pub fn clip_to_aoi<T: RasterElement>(raster: &Raster<T>, aoi: &AreaOfInterest) -> Result<ClippedRaster<T>> {
    let aoi: Cow<'_, AreaOfInterest> = match raster.crs() {
        Some(crs) if !crs.is_equivalent(aoi.crs()) => {
            debug!(from = %aoi.crs(), to = %crs, "reprojecting AOI to raster CRS");
            Cow::Owned(aoi.reproject(crs)?)
        }
        Some(_) => Cow::Borrowed(aoi),
        None => {
            warn!(aoi_crs = %aoi.crs(), "raster has no CRS, assuming the AOI's");
            Cow::Borrowed(aoi)
        }
    };

    let nodata = raster.nodata().unwrap_or_else(T::default_nodata);

    let Some(window) = PixelWindow::from_bbox(&aoi.bbox(), raster.transform(), raster.cols(), raster.rows()) else {
        debug!("AOI does not intersect raster extent");
        return Ok(empty_like(raster, nodata));
    };

    let mut cropped = raster.window(window.row_off, window.col_off, window.rows, window.cols)?;
    let mask = rasterize_mask(aoi.geometry(), cropped.transform(), window.rows, window.cols);

    let mut retained = 0;
    let mut data = cropped.data().clone();
    for (cell, &inside) in data.iter_mut().zip(mask.iter()) {
        if inside {
            retained += 1;
        } else {
            *cell = nodata;
        }
    }

    cropped = cropped.with_same_meta(data, Some(nodata))?;
    debug!(rows = window.rows, cols = window.cols, retained, "clipped raster to AOI");

    if retained == 0 {
        return Ok(empty_like(raster, nodata));
    }

    Ok(ClippedRaster {
        raster: cropped,
        retained,
    })
}

fn empty_like<T: RasterElement>(raster: &Raster<T>, nodata: T) -> ClippedRaster<T> {
    let empty = Raster::from_array(Array2::from_elem((0, 0), nodata)).with_georef(
        *raster.transform(),
        raster.crs().cloned(),
        Some(nodata),
    );
    ClippedRaster {
        raster: empty,
        retained: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use vegtrend_core::{GeoTransform, CRS};

    const NODATA: f64 = -9999.0;

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]),
            vec![],
        )
    }

    /// 100 x 100 grid of 10 m pixels in UTM 30N, value = row * 100 + col
    fn utm_raster() -> Raster<f64> {
        let data = (0..10_000).map(|i| i as f64).collect();
        Raster::from_vec(data, 100, 100).unwrap().with_georef(
            GeoTransform::new(440_000.0, 4_460_000.0, 10.0, -10.0),
            Some(CRS::from_epsg(32630)),
            Some(NODATA),
        )
    }

    #[test]
    fn test_clip_same_crs() {
        let raster = utm_raster();
        let aoi = AreaOfInterest::new(
            vec![square(440_100.0, 4_459_700.0, 440_200.0, 4_459_800.0)],
            CRS::from_epsg(32630),
        )
        .unwrap();

        let clipped = clip_to_aoi(&raster, &aoi).unwrap();
        assert_eq!(clipped.raster.shape(), (10, 10));
        assert_eq!(clipped.retained, 100);
        assert_eq!(clipped.raster.transform().origin_x, 440_100.0);
        assert_eq!(clipped.raster.transform().origin_y, 4_459_800.0);
        // top-left cell of the crop is row 20, col 10 of the source
        assert_eq!(clipped.raster.get(0, 0).unwrap(), 2010.0);
        assert_eq!(clipped.raster.nodata(), Some(NODATA));
    }

    #[test]
    fn test_outside_cells_are_nodata() {
        let raster = utm_raster();
        // L-shaped AOI inside a 10 x 10 crop
        let aoi = AreaOfInterest::new(
            vec![
                square(440_100.0, 4_459_700.0, 440_150.0, 4_459_800.0),
                square(440_150.0, 4_459_700.0, 440_200.0, 4_459_750.0),
            ],
            CRS::from_epsg(32630),
        )
        .unwrap();

        let clipped = clip_to_aoi(&raster, &aoi).unwrap();
        assert_eq!(clipped.raster.shape(), (10, 10));
        assert_eq!(clipped.retained, 75);
        assert_eq!(clipped.raster.get(0, 9).unwrap(), NODATA);
        assert_eq!(clipped.raster.get(9, 9).unwrap(), 2919.0);
    }

    #[test]
    fn test_no_intersection_is_empty() {
        let raster = utm_raster();
        let aoi = AreaOfInterest::new(vec![square(0.0, 0.0, 100.0, 100.0)], CRS::from_epsg(32630)).unwrap();

        let clipped = clip_to_aoi(&raster, &aoi).unwrap();
        assert!(clipped.is_empty());
        assert_eq!(clipped.raster.len(), 0);
    }

    #[test]
    fn test_reprojected_aoi_matches_manual_reprojection() {
        let raster = utm_raster();
        let utm_aoi = AreaOfInterest::new(
            vec![square(440_123.0, 4_459_411.0, 440_587.0, 4_459_872.0)],
            CRS::from_epsg(32630),
        )
        .unwrap();
        let wgs84_aoi = utm_aoi.reproject(&CRS::wgs84()).unwrap();

        let automatic = clip_to_aoi(&raster, &wgs84_aoi).unwrap();
        let manual = clip_to_aoi(&raster, &wgs84_aoi.reproject(&CRS::from_epsg(32630)).unwrap()).unwrap();

        assert_eq!(automatic.retained, manual.retained);
        assert_eq!(automatic.raster.shape(), manual.raster.shape());
        assert_eq!(automatic.raster.transform(), manual.raster.transform());
        assert_eq!(automatic.raster.data(), manual.raster.data());
        assert!(automatic.retained > 0);
    }

    #[test]
    fn test_raster_without_crs_uses_aoi_crs() {
        let mut raster = utm_raster();
        raster.set_crs(None);
        let aoi = AreaOfInterest::new(
            vec![square(440_000.0, 4_459_900.0, 440_050.0, 4_460_000.0)],
            CRS::from_epsg(32630),
        )
        .unwrap();

        let clipped = clip_to_aoi(&raster, &aoi).unwrap();
        assert_eq!(clipped.retained, 50);
    }
}
