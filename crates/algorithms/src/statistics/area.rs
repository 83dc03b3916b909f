//! Area-mean reduction of a raster to a single scalar

use serde::Serialize;

use vegtrend_core::{Raster, RasterElement};

/// Mean of the valid cells of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaMean {
    pub mean: f64,
    /// Cells that entered the mean
    pub valid: usize,
    /// All cells of the raster, valid or not
    pub total: usize,
}

impl AreaMean {
    /// Share of cells that were valid
    pub fn coverage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64
        }
    }
}

/// Mean over cells that are neither the raster's nodata sentinel nor
/// non-finite.
///
/// Returns `None` when no cell qualifies; callers treat that as "no data"
/// rather than zero.
pub fn area_mean<T: RasterElement>(raster: &Raster<T>) -> Option<AreaMean> {
    let mut sum = 0.0_f64;
    let mut valid = 0_usize;

    for &value in raster.data().iter() {
        if !raster.is_valid(value) {
            continue;
        }
        let Some(v) = value.to_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        sum += v;
        valid += 1;
    }

    (valid > 0).then(|| AreaMean {
        mean: sum / valid as f64,
        valid,
        total: raster.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_skips_nodata() {
        let mut raster = Raster::from_vec(vec![-9999.0, 0.5, 0.3, -9999.0], 2, 2).unwrap();
        raster.set_nodata(Some(-9999.0));

        let reduced = area_mean(&raster).unwrap();
        assert_relative_eq!(reduced.mean, 0.4, epsilon = 1e-12);
        assert_eq!(reduced.valid, 2);
        assert_eq!(reduced.total, 4);
        assert_relative_eq!(reduced.coverage(), 0.5);
    }

    #[test]
    fn test_mean_skips_non_finite() {
        let mut raster = Raster::from_vec(vec![f64::NAN, 0.2, f64::INFINITY, 0.6, f64::NEG_INFINITY, -9999.0], 2, 3).unwrap();
        raster.set_nodata(Some(-9999.0));

        let reduced = area_mean(&raster).unwrap();
        assert_relative_eq!(reduced.mean, 0.4, epsilon = 1e-12);
        assert_eq!(reduced.valid, 2);
    }

    #[test]
    fn test_no_valid_cells() {
        let mut raster = Raster::filled(3, 3, -9999.0_f64);
        raster.set_nodata(Some(-9999.0));
        assert!(area_mean(&raster).is_none());

        let empty: Raster<f64> = Raster::new(0, 0);
        assert!(area_mean(&empty).is_none());
    }

    #[test]
    fn test_integer_raster() {
        let mut raster = Raster::from_vec(vec![0_u16, 10, 20, 30], 2, 2).unwrap();
        raster.set_nodata(Some(0));
        assert_relative_eq!(area_mean(&raster).unwrap().mean, 20.0);
    }
}
