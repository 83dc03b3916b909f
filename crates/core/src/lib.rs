//! # vegtrend Core
//!
//! Core types and I/O for the vegtrend vegetation-trend pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling and point reprojection
//! - `AreaOfInterest`: Unioned polygon AOI with its CRS
//! - Native GeoTIFF I/O carrying CRS and nodata metadata

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, PixelWindow, Raster, RasterElement};
pub use vector::{AreaOfInterest, BBox};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, PixelWindow, Raster, RasterElement};
    pub use crate::vector::{AreaOfInterest, BBox};
}
