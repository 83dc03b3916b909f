//! Vector/raster overlay operations
//!
//! - Rasterize an AOI to a pixel mask
//! - Clip a raster to an AOI with CRS reconciliation

mod clip;
mod rasterize;

pub use clip::{clip_to_aoi, ClippedRaster};
pub use rasterize::rasterize_mask;
