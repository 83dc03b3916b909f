//! Two-band normalized difference indices
//!
//! Every supported index is `(a - b) / (a + b)` over two reflectance bands;
//! only the band pair changes.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::maybe_rayon::*;
use vegtrend_core::raster::Raster;
use vegtrend_core::{Error, Result};

/// Supported spectral indices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index: (NIR - Red) / (NIR + Red)
    #[default]
    Ndvi,
    /// Green NDVI: (NIR - Green) / (NIR + Green)
    Gndvi,
    /// Normalized Difference Water Index (McFeeters): (Green - NIR) / (Green + NIR)
    Ndwi,
    /// Normalized Burn Ratio: (NIR - SWIR2) / (NIR + SWIR2)
    Nbr,
}

impl SpectralIndex {
    /// Band common names `(positive, negative)` as used for catalog asset keys.
    pub fn bands(&self) -> (&'static str, &'static str) {
        match self {
            SpectralIndex::Ndvi => ("nir", "red"),
            SpectralIndex::Gndvi => ("nir", "green"),
            SpectralIndex::Ndwi => ("green", "nir"),
            SpectralIndex::Nbr => ("nir08", "swir22"),
        }
    }

    /// Lowercase name, used for artifact prefixes.
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Gndvi => "gndvi",
            SpectralIndex::Ndwi => "ndwi",
            SpectralIndex::Nbr => "nbr",
        }
    }

    /// Compute this index from its two bands, in [`SpectralIndex::bands`] order.
    pub fn compute(&self, positive: &Raster<f64>, negative: &Raster<f64>, nodata: f64) -> Result<Raster<f64>> {
        normalized_difference(positive, negative, nodata)
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ndvi" => Ok(SpectralIndex::Ndvi),
            "gndvi" => Ok(SpectralIndex::Gndvi),
            "ndwi" => Ok(SpectralIndex::Ndwi),
            "nbr" => Ok(SpectralIndex::Nbr),
            other => Err(Error::InvalidParameter {
                name: "index",
                value: other.to_string(),
                reason: "expected one of ndvi, gndvi, ndwi, nbr".into(),
            }),
        }
    }
}

/// Normalized difference `(a - b) / (a + b)` of two aligned bands.
///
/// A pixel is `nodata` when either input is invalid (its raster's sentinel
/// or non-finite) or when `a + b` is exactly zero. Values are not clamped,
/// so negative reflectances can push results outside [-1, 1].
///
/// The output takes its georeferencing from `band_a` and carries `nodata`
/// as its sentinel.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>, nodata: f64) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                // SAFETY: row < rows and col < cols, and both rasters share that shape
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if !band_a.is_valid(a) || !band_b.is_valid(b) {
                    continue;
                }

                let sum = a + b;
                if sum == 0.0 {
                    continue;
                }

                let value = (a - b) / sum;
                if value.is_finite() {
                    *out = value;
                }
            }
            row_data
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    band_a.with_same_meta(array, Some(nodata))
}

/// NDVI from NIR and red bands
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>, nodata: f64) -> Result<Raster<f64>> {
    normalized_difference(nir, red, nodata)
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vegtrend_core::{GeoTransform, CRS};

    const NODATA: f64 = -9999.0;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        Raster::filled(rows, cols, value).with_georef(
            GeoTransform::new(440_000.0, 4_460_000.0, 10.0, -10.0),
            Some(CRS::from_epsg(32630)),
            None,
        )
    }

    fn make_gradient(rows: usize, cols: usize, start: f64, step: f64) -> Raster<f64> {
        let data = (0..rows * cols).map(|i| start + i as f64 * step).collect();
        Raster::from_vec(data, rows, cols).unwrap()
    }

    #[test]
    fn test_ndvi_basic() {
        let nir = make_band(5, 5, 0.5);
        let red = make_band(5, 5, 0.1);

        let result = ndvi(&nir, &red, NODATA).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.4 / 0.6, epsilon = 1e-12);
        assert_eq!(result.nodata(), Some(NODATA));
        assert_eq!(result.transform(), nir.transform());
        assert_eq!(result.crs().and_then(|c| c.epsg()), Some(32630));
    }

    #[test]
    fn test_values_in_range_or_nodata() {
        let a = make_gradient(10, 10, 0.0, 0.01);
        let b = make_gradient(10, 10, 0.5, -0.005);

        let result = normalized_difference(&a, &b, NODATA).unwrap();
        for &v in result.data().iter() {
            assert!(v == NODATA || (-1.0..=1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn test_zero_denominator_is_nodata() {
        let mut nir = make_band(3, 3, 0.3);
        let mut red = make_band(3, 3, 0.1);
        nir.set(1, 1, 0.0).unwrap();
        red.set(1, 1, 0.0).unwrap();
        nir.set(0, 2, 0.2).unwrap();
        red.set(0, 2, -0.2).unwrap();

        let result = ndvi(&nir, &red, NODATA).unwrap();
        assert_eq!(result.get(1, 1).unwrap(), NODATA);
        assert_eq!(result.get(0, 2).unwrap(), NODATA);
        assert_relative_eq!(result.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_inputs_propagate() {
        let mut nir = make_band(2, 2, 0.4);
        let red = make_band(2, 2, 0.1);
        nir.set(0, 0, f64::NAN).unwrap();
        nir.set(1, 1, 7.0).unwrap();
        nir.set_nodata(Some(7.0));

        let result = ndvi(&nir, &red, NODATA).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), NODATA);
        assert_eq!(result.get(1, 1).unwrap(), NODATA);
        assert_relative_eq!(result.get(0, 1).unwrap(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_no_clamping() {
        // reflectance offsets can produce small negative values
        let nir = make_band(1, 1, 0.3);
        let red = make_band(1, 1, -0.1);
        let result = ndvi(&nir, &red, NODATA).unwrap();
        assert_relative_eq!(result.get(0, 0).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = make_band(5, 5, 0.5);
        let b = make_band(5, 6, 0.5);
        assert!(matches!(
            normalized_difference(&a, &b, NODATA),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_index_kinds() {
        assert_eq!(SpectralIndex::default(), SpectralIndex::Ndvi);
        assert_eq!(SpectralIndex::Ndwi.bands(), ("green", "nir"));
        assert_eq!("GNDVI".parse::<SpectralIndex>().unwrap(), SpectralIndex::Gndvi);
        assert!("evi".parse::<SpectralIndex>().is_err());

        let green = make_band(2, 2, 0.1);
        let nir = make_band(2, 2, 0.3);
        let ndwi = SpectralIndex::Ndwi.compute(&green, &nir, NODATA).unwrap();
        assert_relative_eq!(ndwi.get(0, 0).unwrap(), -0.5, epsilon = 1e-12);
    }
}
