//! Series artifacts: CSV table, trend report and chart

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use vegtrend_algorithms::timeseries::{TimeSeries, Trend};
use vegtrend_chart::SeriesRenderer;

use crate::error::{PipelineError, Result};
use crate::summary::ArtifactPaths;

/// One CSV row. Missing smoothed values are written as empty cells.
#[derive(Debug, Serialize)]
struct TableRow {
    date: NaiveDate,
    mean_index: f64,
    smoothed_index: Option<f64>,
}

/// Trend parameters plus the slope per year, for `trend.json`.
#[derive(Debug, Serialize)]
struct TrendReport<'a> {
    index: &'a str,
    #[serde(flatten)]
    trend: &'a Trend,
    slope_per_year: f64,
    start: NaiveDate,
    end: NaiveDate,
}

/// Write the series as `date,mean_index,smoothed_index`.
pub fn write_table(series: &TimeSeries, path: &Path) -> Result<()> {
    let table_err = |source| PipelineError::Table {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(table_err)?;
    for (date, value, smoothed) in series.rows() {
        writer
            .serialize(TableRow {
                date,
                mean_index: value,
                smoothed_index: smoothed,
            })
            .map_err(table_err)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write the fitted trend as pretty JSON.
pub fn write_trend(series: &TimeSeries, trend: &Trend, index: &str, path: &Path) -> Result<()> {
    let points = series.points();
    let (start, end) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => (trend.origin, trend.origin),
    };
    let report = TrendReport {
        index,
        trend,
        slope_per_year: trend.slope * 365.25,
        start,
        end,
    };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes every artifact for a finished series into one directory.
pub struct ArtifactWriter<'a> {
    dir: PathBuf,
    prefix: &'a str,
    renderer: &'a dyn SeriesRenderer,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(dir: impl Into<PathBuf>, prefix: &'a str, renderer: &'a dyn SeriesRenderer) -> Self {
        Self {
            dir: dir.into(),
            prefix,
            renderer,
        }
    }

    pub fn table_path(&self) -> PathBuf {
        self.dir.join(format!("{}_data.csv", self.prefix))
    }

    pub fn chart_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}_plot.{}", self.prefix, self.renderer.extension()))
    }

    pub fn trend_path(&self) -> PathBuf {
        self.dir.join("trend.json")
    }

    /// Write the table, the chart and, when a trend was fitted, the trend
    /// report. A stale trend report from an earlier run is removed.
    pub fn write(&self, series: &TimeSeries) -> Result<ArtifactPaths> {
        fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let table = self.table_path();
        write_table(series, &table)?;

        let chart = self.chart_path();
        self.renderer.render(series, &chart)?;

        let trend_path = self.trend_path();
        let trend = match series.trend() {
            Some(trend) => {
                write_trend(series, trend, self.prefix, &trend_path)?;
                Some(trend_path)
            }
            None => {
                if trend_path.exists() {
                    fs::remove_file(&trend_path).map_err(|source| PipelineError::Io {
                        path: trend_path.clone(),
                        source,
                    })?;
                }
                None
            }
        };

        info!(
            table = %table.display(),
            chart = %chart.display(),
            points = series.len(),
            "artifacts written"
        );
        Ok(ArtifactPaths { table, chart, trend })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegtrend_algorithms::timeseries::{SeriesOptions, TimeSeriesPoint};
    use vegtrend_chart::SvgRenderer;

    fn series(values: &[(u32, f64)]) -> TimeSeries {
        let points = values
            .iter()
            .map(|&(day, v)| TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2025, 5, day).unwrap(), v));
        TimeSeries::build(points, &SeriesOptions::default()).unwrap()
    }

    #[test]
    fn test_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi_data.csv");
        write_table(&series(&[(1, 0.25), (11, 0.5), (21, 0.75)]), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,mean_index,smoothed_index");
        assert_eq!(lines[1], "2025-05-01,0.25,");
        assert_eq!(lines[2], "2025-05-11,0.5,0.5");
        assert_eq!(lines[3], "2025-05-21,0.75,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_writer_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgRenderer::default();
        let writer = ArtifactWriter::new(dir.path().join("results"), "ndvi", &renderer);

        let paths = writer.write(&series(&[(1, 0.3), (11, 0.4), (21, 0.5)])).unwrap();
        assert!(paths.table.ends_with("ndvi_data.csv"));
        assert!(paths.chart.ends_with("ndvi_plot.svg"));
        assert!(paths.chart.is_file());

        let trend_path = paths.trend.unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&trend_path).unwrap()).unwrap();
        assert_eq!(report["index"], "ndvi");
        assert_eq!(report["direction"], "increasing");
        assert_eq!(report["n"], 3);
        assert_eq!(report["start"], "2025-05-01");
        assert!((report["slope"].as_f64().unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_single_point_removes_stale_trend() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgRenderer::default();
        let writer = ArtifactWriter::new(dir.path(), "ndvi", &renderer);
        fs::write(writer.trend_path(), "{}").unwrap();

        let paths = writer.write(&series(&[(5, 0.4)])).unwrap();
        assert!(paths.trend.is_none());
        assert!(!writer.trend_path().exists());
        assert!(paths.table.is_file());
    }
}
