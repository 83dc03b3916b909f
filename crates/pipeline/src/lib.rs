//! # vegtrend Pipeline
//!
//! Runs the vegetation-trend study end to end:
//!
//! 1. **select**: candidate scenes from a [`SceneSelector`](vegtrend_cloud::SceneSelector)
//! 2. **compute**: one index raster per scene, persisted in an [`IndexStore`]
//!    and skipped when already stored
//! 3. **reduce**: clip each stored raster to the AOI and average valid cells
//! 4. **aggregate**: sort, smooth and fit a trend, then write the table,
//!    trend report and chart
//!
//! Per-scene work is independent and runs under the configured
//! [`ProcessingMode`](vegtrend_parallel::ProcessingMode).

pub mod artifacts;
pub mod compute;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reduce;
pub mod store;
pub mod summary;

pub use artifacts::ArtifactWriter;
pub use compute::{ComputeOutcome, IndexComputer};
pub use config::{ConfigSource, PipelineConfig};
pub use error::{ConfigError, PipelineError, Result, SceneFailure};
pub use pipeline::{Pipeline, RunOutcome};
pub use reduce::{reduce_scene, Reduction};
pub use store::{FsIndexStore, IndexStore};
pub use summary::{ArtifactPaths, RunSummary};
