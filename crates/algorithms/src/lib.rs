//! # vegtrend Algorithms
//!
//! Raster and time-series algorithms for the vegetation-trend pipeline.
//!
//! ## Algorithm Categories
//!
//! - **imagery**: normalized difference spectral indices (NDVI, GNDVI, NDWI, NBR)
//! - **vector**: AOI rasterization and clipping with CRS reconciliation
//! - **statistics**: area-mean reduction over valid cells
//! - **timeseries**: scene dates, sorting, moving average, linear trend

pub(crate) mod maybe_rayon;

pub mod imagery;
pub mod statistics;
pub mod timeseries;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{ndvi, normalized_difference, SpectralIndex};
    pub use crate::statistics::{area_mean, AreaMean};
    pub use crate::timeseries::{
        fit_trend, moving_average, parse_scene_date, DuplicateDatePolicy, SeriesOptions, TimeSeries,
        TimeSeriesPoint, Trend, TrendDirection,
    };
    pub use crate::vector::{clip_to_aoi, ClippedRaster};
    pub use vegtrend_core::prelude::*;
}
