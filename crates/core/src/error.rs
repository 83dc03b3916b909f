//! Error types for vegtrend core

use thiserror::Error;

/// Main error type for raster, CRS and AOI operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported reprojection: {from} -> {to}")]
    UnsupportedReprojection { from: String, to: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    #[error("Invalid area of interest: {0}")]
    InvalidAoi(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: {required} distinct dates required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("No YYYYMMDD date token in scene identity '{0}'")]
    DateParse(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for vegtrend core operations
pub type Result<T> = std::result::Result<T, Error>;
