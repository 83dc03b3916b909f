//! Dated series of area means

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vegtrend_core::Result;

use super::smoothing::{moving_average, validate_window};
use super::trend::{fit_trend, Trend};

/// One dated observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// What to do with several observations on the same date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDatePolicy {
    /// Keep every point, in arrival order
    #[default]
    KeepAll,
    /// Keep the first point to arrive for each date
    First,
    /// Replace same-date points by their mean
    Mean,
}

/// Options for [`TimeSeries::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesOptions {
    /// Odd moving-average window
    pub window: usize,
    pub duplicates: DuplicateDatePolicy,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            window: 3,
            duplicates: DuplicateDatePolicy::KeepAll,
        }
    }
}

/// Points sorted ascending by date with their smoothed values and trend.
///
/// Derived values are computed once in [`TimeSeries::build`]; the point
/// order never changes afterwards.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    points: Vec<TimeSeriesPoint>,
    smoothed: Vec<Option<f64>>,
    trend: Option<Trend>,
    window: usize,
}

impl TimeSeries {
    /// Sort, resolve same-date collisions, smooth and fit.
    ///
    /// Non-finite values are dropped. The sort is stable, so same-date
    /// points keep their arrival order. A series too short for a trend is
    /// still built, with [`TimeSeries::trend`] returning `None`.
    pub fn build(points: impl IntoIterator<Item = TimeSeriesPoint>, options: &SeriesOptions) -> Result<Self> {
        validate_window(options.window)?;

        let mut points: Vec<TimeSeriesPoint> = points
            .into_iter()
            .filter(|p| {
                let keep = p.value.is_finite();
                if !keep {
                    warn!(date = %p.date, "dropping non-finite series value");
                }
                keep
            })
            .collect();

        points.sort_by_key(|p| p.date);
        let points = resolve_duplicates(points, options.duplicates);

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let smoothed = moving_average(&values, options.window)?;

        let trend = match fit_trend(&points) {
            Ok(trend) => Some(trend),
            Err(e) => {
                debug!(points = points.len(), error = %e, "no trend fitted");
                None
            }
        };

        Ok(Self {
            points,
            smoothed,
            trend,
            window: options.window,
        })
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    /// Smoothed value per point, `None` near the ends
    pub fn smoothed(&self) -> &[Option<f64>] {
        &self.smoothed
    }

    pub fn trend(&self) -> Option<&Trend> {
        self.trend.as_ref()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(date, value, smoothed)` per point, in date order.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, f64, Option<f64>)> + '_ {
        self.points
            .iter()
            .zip(&self.smoothed)
            .map(|(p, s)| (p.date, p.value, *s))
    }
}

/// Expects `points` sorted by date.
fn resolve_duplicates(points: Vec<TimeSeriesPoint>, policy: DuplicateDatePolicy) -> Vec<TimeSeriesPoint> {
    if policy == DuplicateDatePolicy::KeepAll {
        return points;
    }

    let mut out: Vec<TimeSeriesPoint> = Vec::with_capacity(points.len());
    let mut group_len = 0_usize;

    for point in points {
        match out.last_mut() {
            Some(last) if last.date == point.date => {
                if policy == DuplicateDatePolicy::Mean {
                    // running mean over the group
                    group_len += 1;
                    last.value += (point.value - last.value) / group_len as f64;
                }
            }
            _ => {
                out.push(point);
                group_len = 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ymd(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn build(points: Vec<TimeSeriesPoint>, duplicates: DuplicateDatePolicy) -> TimeSeries {
        TimeSeries::build(points, &SeriesOptions { window: 3, duplicates }).unwrap()
    }

    #[test]
    fn test_sorted_and_smoothed() {
        let points = vec![
            TimeSeriesPoint::new(ymd(3, 1), 0.44),
            TimeSeriesPoint::new(ymd(1, 1), 0.40),
            TimeSeriesPoint::new(ymd(5, 1), 0.48),
            TimeSeriesPoint::new(ymd(2, 1), 0.42),
            TimeSeriesPoint::new(ymd(4, 1), 0.46),
        ];
        let series = build(points, DuplicateDatePolicy::KeepAll);

        let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![ymd(1, 1), ymd(2, 1), ymd(3, 1), ymd(4, 1), ymd(5, 1)]);
        assert!(series.smoothed()[0].is_none());
        assert!(series.smoothed()[4].is_none());
        assert_relative_eq!(series.smoothed()[2].unwrap(), 0.44, epsilon = 1e-12);
        assert!(series.trend().is_some());
        assert_eq!(series.rows().count(), 5);
    }

    #[test]
    fn test_keep_all_preserves_arrival_order() {
        let points = vec![
            TimeSeriesPoint::new(ymd(2, 1), 0.5),
            TimeSeriesPoint::new(ymd(1, 1), 0.1),
            TimeSeriesPoint::new(ymd(2, 1), 0.7),
        ];
        let series = build(points, DuplicateDatePolicy::KeepAll);
        let values: Vec<_> = series.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![0.1, 0.5, 0.7]);
    }

    #[test]
    fn test_first_and_mean_policies() {
        let points = vec![
            TimeSeriesPoint::new(ymd(2, 1), 0.5),
            TimeSeriesPoint::new(ymd(1, 1), 0.1),
            TimeSeriesPoint::new(ymd(2, 1), 0.7),
            TimeSeriesPoint::new(ymd(2, 1), 0.3),
        ];

        let first = build(points.clone(), DuplicateDatePolicy::First);
        assert_eq!(first.len(), 2);
        assert_eq!(first.points()[1].value, 0.5);

        let mean = build(points, DuplicateDatePolicy::Mean);
        assert_eq!(mean.len(), 2);
        assert_relative_eq!(mean.points()[1].value, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_single_point_has_no_trend() {
        let series = build(vec![TimeSeriesPoint::new(ymd(6, 1), 0.35)], DuplicateDatePolicy::KeepAll);
        assert_eq!(series.len(), 1);
        assert!(series.trend().is_none());
        assert_eq!(series.smoothed(), &[None]);
    }

    #[test]
    fn test_non_finite_values_dropped() {
        let points = vec![
            TimeSeriesPoint::new(ymd(1, 1), f64::NAN),
            TimeSeriesPoint::new(ymd(1, 2), 0.3),
        ];
        let series = build(points, DuplicateDatePolicy::KeepAll);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_even_window_rejected() {
        let options = SeriesOptions {
            window: 2,
            ..SeriesOptions::default()
        };
        assert!(TimeSeries::build(Vec::new(), &options).is_err());
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: DuplicateDatePolicy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"policy": "keep_all"}"#).unwrap();
        assert_eq!(w.policy, DuplicateDatePolicy::KeepAll);
    }
}
