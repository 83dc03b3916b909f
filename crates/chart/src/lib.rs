//! # vegtrend Chart
//!
//! Color schemes and an SVG renderer for vegetation index time series.
//!
//! The renderer only sees a finished [`TimeSeries`]: raw points, the
//! smoothed curve and, when fitted, the trend line.
//!
//! ## Usage
//!
//! ```ignore
//! use vegtrend_chart::{ChartParams, SeriesRenderer, SvgRenderer};
//!
//! SvgRenderer::new(ChartParams::default()).render(&series, Path::new("results/ndvi_timeseries.svg"))?;
//! ```

mod scheme;
mod svg;

use std::path::{Path, PathBuf};

use thiserror::Error;
use vegtrend_algorithms::timeseries::TimeSeries;

pub use scheme::{evaluate, ColorScheme, ColorStop, Rgb};
pub use svg::{render_series_chart, write_series_chart, ChartParams};

/// Chart rendering errors
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("failed to write chart to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders a finished time series to a chart artifact at `path`.
pub trait SeriesRenderer: Send + Sync {
    fn render(&self, series: &TimeSeries, path: &Path) -> Result<(), ChartError>;

    /// File extension of the artifacts this renderer writes
    fn extension(&self) -> &'static str;
}

/// [`SeriesRenderer`] producing standalone SVG documents.
#[derive(Debug, Clone, Default)]
pub struct SvgRenderer {
    params: ChartParams,
}

impl SvgRenderer {
    pub fn new(params: ChartParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChartParams {
        &self.params
    }
}

impl SeriesRenderer for SvgRenderer {
    fn render(&self, series: &TimeSeries, path: &Path) -> Result<(), ChartError> {
        write_series_chart(series, &self.params, path)
    }

    fn extension(&self) -> &'static str {
        "svg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vegtrend_algorithms::timeseries::{SeriesOptions, TimeSeriesPoint};

    #[test]
    fn test_svg_renderer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi_timeseries.svg");
        let points = (1..=4).map(|m| TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2025, m, 1).unwrap(), 0.3 + m as f64 * 0.01));
        let series = TimeSeries::build(points, &SeriesOptions::default()).unwrap();

        let renderer = SvgRenderer::default();
        renderer.render(&series, &path).unwrap();
        assert_eq!(renderer.extension(), "svg");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<circle"));
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("chart.svg");
        let series = TimeSeries::build(Vec::new(), &SeriesOptions::default()).unwrap();
        assert!(matches!(
            SvgRenderer::default().render(&series, &path),
            Err(ChartError::Write { .. })
        ));
    }
}
