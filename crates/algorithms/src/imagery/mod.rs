//! Imagery analysis algorithms
//!
//! Normalized difference spectral indices (NDVI, GNDVI, NDWI, NBR) from
//! pairs of reflectance bands.

mod indices;

pub use indices::{ndvi, normalized_difference, SpectralIndex};
