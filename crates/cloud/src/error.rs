//! Error types for catalog search and band loading.

use thiserror::Error;

/// Errors produced by the catalog client and the band loader.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server does not support Range requests for {url}")]
    RangeNotSupported { url: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("catalog search matched more than {limit} items; narrow the query or raise max_items")]
    TooManyItems { limit: usize },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("scene {scene} has no '{band}' band")]
    MissingBand { scene: String, band: String },

    #[error("invalid STAC item {id}: {reason}")]
    InvalidItem { id: String, reason: String },

    #[error("area of interest does not intersect the band raster")]
    BBoxOutside,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] vegtrend_core::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
