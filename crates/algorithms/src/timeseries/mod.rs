//! Temporal aggregation of per-scene area means
//!
//! - **scene_date**: acquisition date from a scene identity
//! - **series**: sorted series with duplicate-date policy
//! - **smoothing**: centered moving average
//! - **trend**: OLS slope against elapsed days

pub mod scene_date;
pub mod series;
pub mod smoothing;
pub mod trend;

pub use scene_date::parse_scene_date;
pub use series::{DuplicateDatePolicy, SeriesOptions, TimeSeries, TimeSeriesPoint};
pub use smoothing::{moving_average, validate_window};
pub use trend::{fit_trend, Trend, TrendDirection};
