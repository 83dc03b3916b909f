//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Band rasters arrive as unsigned or signed integer digital numbers;
/// index rasters are floating point.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value equals the no-data sentinel.
    ///
    /// Sentinel comparison is exact: a value is no-data only if it is the
    /// sentinel itself. NaN is handled by [`RasterElement::is_valid`].
    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        matches!(nodata, Some(nd) if *self == nd)
    }

    /// A cell is valid when it is not the sentinel and is numerically finite.
    fn is_valid(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_valid(&self, nodata: Option<Self>) -> bool {
                !self.is_nodata(nodata)
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_valid(&self, nodata: Option<Self>) -> bool {
                self.is_finite() && !self.is_nodata(nodata)
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(i16);
impl_raster_element_int!(u32);
impl_raster_element_int!(i32);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_validity_excludes_sentinel_and_non_finite() {
        let nd = Some(-9999.0_f64);
        assert!(0.5_f64.is_valid(nd));
        assert!(!(-9999.0_f64).is_valid(nd));
        assert!(!f64::NAN.is_valid(nd));
        assert!(!f64::INFINITY.is_valid(nd));
        assert!(!f64::NEG_INFINITY.is_valid(None));
    }

    #[test]
    fn integer_validity() {
        assert!(!0_u16.is_valid(Some(0)));
        assert!(1200_u16.is_valid(Some(0)));
        assert!(0_u16.is_valid(None));
    }
}
