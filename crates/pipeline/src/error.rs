//! Pipeline error types
//!
//! [`PipelineError`] ends a run. [`SceneFailure`] excludes one scene and is
//! counted in the run summary; the run carries on without it.

use std::path::PathBuf;

use thiserror::Error;

use vegtrend_chart::ChartError;
use vegtrend_cloud::CloudError;
use vegtrend_parallel::ParallelError;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({path}): {err}", path = .0.display(), err = .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({path}): {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("area of interest {}: {source}", .path.display())]
    Aoi {
        path: PathBuf,
        #[source]
        source: vegtrend_core::Error,
    },

    #[error("scene selection failed: {0}")]
    Catalog(#[source] CloudError),

    #[error("failed to set up {what}: {source}")]
    Setup {
        what: &'static str,
        #[source]
        source: CloudError,
    },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index store: {0}")]
    Store(#[source] vegtrend_core::Error),

    #[error("time series: {0}")]
    Series(#[source] vegtrend_core::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to encode trend report: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Parallel(#[from] ParallelError),
}

/// Why a single scene was left out of the series
#[derive(Debug, Clone, Error)]
pub enum SceneFailure {
    #[error("scene has no '{band}' band")]
    MissingBand { band: String },

    #[error("loading band '{band}': {reason}")]
    BandLoad { band: String, reason: String },

    #[error("computing index: {0}")]
    Compute(String),

    #[error("persisting index raster: {0}")]
    Persist(String),

    #[error("reading index raster: {0}")]
    RasterRead(String),

    #[error("{0}")]
    DateParse(String),

    #[error("clipping to area of interest: {0}")]
    Clip(String),

    #[error("area of interest does not overlap the raster")]
    ClipEmpty,

    #[error("no valid pixels inside the area of interest")]
    NoValidPixels,
}

impl SceneFailure {
    /// Stable short label used to group failures in the summary
    pub fn kind(&self) -> &'static str {
        match self {
            SceneFailure::MissingBand { .. } => "missing_band",
            SceneFailure::BandLoad { .. } => "band_load",
            SceneFailure::Compute(_) => "compute",
            SceneFailure::Persist(_) => "persist",
            SceneFailure::RasterRead(_) => "raster_read",
            SceneFailure::DateParse(_) => "date_parse",
            SceneFailure::Clip(_) => "clip",
            SceneFailure::ClipEmpty => "clip_empty",
            SceneFailure::NoValidPixels => "no_valid_pixels",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_errors() {
        let err = ConfigError::Validation(vec!["a: bad".into(), "b: worse".into()]);
        assert_eq!(err.to_string(), "config validation failed:\n  - a: bad\n  - b: worse");
    }

    #[test]
    fn test_failure_kinds() {
        let failure = SceneFailure::MissingBand { band: "red".into() };
        assert_eq!(failure.kind(), "missing_band");
        assert_eq!(failure.to_string(), "scene has no 'red' band");
        assert_eq!(SceneFailure::ClipEmpty.kind(), "clip_empty");
    }
}
