//! Statistical reductions of raster data
//!
//! - **area**: area-mean over valid cells

pub mod area;

pub use area::{area_mean, AreaMean};
