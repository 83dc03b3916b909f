//! Ordinary least-squares trend of a dated series
//!
//! The regressor is the number of whole days elapsed since the first date,
//! so the slope is in index units per day.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use vegtrend_core::{Error, Result};

use super::series::TimeSeriesPoint;

/// Sign of the fitted slope. A slope of exactly zero is `Decreasing`; see
/// [`Trend::flat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
        }
    }
}

/// Linear trend parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    /// Change per day
    pub slope: f64,
    /// Fitted value at `origin`
    pub intercept: f64,
    /// Pearson correlation of value against elapsed days
    pub r: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope (t distribution, n - 2 degrees of
    /// freedom). `None` with only two points.
    pub p_value: Option<f64>,
    /// Standard error of the slope. `None` with only two points.
    pub stderr: Option<f64>,
    /// Number of points fitted
    pub n: usize,
    /// Date at elapsed day zero
    pub origin: NaiveDate,
    pub direction: TrendDirection,
    /// Slope is exactly zero but still reported as decreasing
    pub flat: bool,
}

impl Trend {
    /// Fitted value at `date`.
    pub fn predict(&self, date: NaiveDate) -> f64 {
        let days = (date - self.origin).num_days() as f64;
        self.intercept + self.slope * days
    }
}

/// Fit `value = intercept + slope * days` by ordinary least squares.
///
/// Fails with [`Error::InsufficientData`] when the points span fewer than
/// two distinct dates, reporting how many dates there are. A constant series yields
/// `r = 0` and `r_squared = 0`.
pub fn fit_trend(points: &[TimeSeriesPoint]) -> Result<Trend> {
    let dates: BTreeSet<NaiveDate> = points.iter().map(|p| p.date).collect();
    if dates.len() < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            available: dates.len(),
        });
    }
    let n = points.len();

    let origin = points.iter().map(|p| p.date).min().ok_or(Error::InsufficientData {
        required: 2,
        available: 0,
    })?;

    let xs: Vec<f64> = points.iter().map(|p| (p.date - origin).num_days() as f64).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();

    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let (stderr, p_value) = if n > 2 {
        let sse: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| {
                let residual = y - (intercept + slope * x);
                residual * residual
            })
            .sum();
        let df = nf - 2.0;
        let stderr = (sse / df / sxx).sqrt();
        (Some(stderr), slope_p_value(slope, stderr, df))
    } else {
        (None, None)
    };

    Ok(Trend {
        slope,
        intercept,
        r,
        r_squared: r * r,
        p_value,
        stderr,
        n,
        origin,
        direction: TrendDirection::from_slope(slope),
        flat: slope == 0.0,
    })
}

fn slope_p_value(slope: f64, stderr: f64, df: f64) -> Option<f64> {
    if stderr == 0.0 {
        // exact fit
        return Some(if slope == 0.0 { 1.0 } else { 0.0 });
    }
    let t = slope / stderr;
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(day: i64, value: f64) -> TimeSeriesPoint {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        TimeSeriesPoint {
            date: start + chrono::Duration::days(day),
            value,
        }
    }

    #[test]
    fn test_perfect_linear_series() {
        let points: Vec<_> = [0, 5, 15, 20, 40, 55]
            .iter()
            .map(|&d| point(d, 0.30 + 0.002 * d as f64))
            .collect();

        let trend = fit_trend(&points).unwrap();
        assert_relative_eq!(trend.slope, 0.002, epsilon = 1e-12);
        assert_relative_eq!(trend.intercept, 0.30, epsilon = 1e-12);
        assert_relative_eq!(trend.r_squared, 1.0, epsilon = 1e-9);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!(!trend.flat);
        assert!(trend.p_value.unwrap() < 1e-6);
        assert_eq!(trend.n, 6);
        assert_relative_eq!(trend.predict(point(100, 0.0).date), 0.50, epsilon = 1e-12);
    }

    #[test]
    fn test_decreasing_noisy_series() {
        let values = [0.62, 0.60, 0.61, 0.55, 0.52, 0.50, 0.47];
        let points: Vec<_> = values.iter().enumerate().map(|(i, &v)| point(i as i64 * 10, v)).collect();

        let trend = fit_trend(&points).unwrap();
        assert!(trend.slope < 0.0);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!(trend.r < -0.9);
        assert!(trend.r_squared > 0.8 && trend.r_squared < 1.0);
        let p = trend.p_value.unwrap();
        assert!(p > 0.0 && p < 0.01);
        assert!(trend.stderr.unwrap() > 0.0);
    }

    #[test]
    fn test_zero_slope_is_flagged() {
        let points = vec![point(0, 0.5), point(10, 0.5), point(20, 0.5)];
        let trend = fit_trend(&points).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!(trend.flat);
        assert_eq!(trend.r, 0.0);
        assert_eq!(trend.p_value, Some(1.0));
    }

    #[test]
    fn test_two_points() {
        let trend = fit_trend(&[point(0, 0.4), point(4, 0.5)]).unwrap();
        assert_relative_eq!(trend.slope, 0.025, epsilon = 1e-12);
        assert!(trend.p_value.is_none());
        assert!(trend.stderr.is_none());
    }

    #[test]
    fn test_insufficient_data() {
        assert!(matches!(
            fit_trend(&[point(3, 0.4)]),
            Err(Error::InsufficientData { available: 1, .. })
        ));
        assert!(matches!(fit_trend(&[]), Err(Error::InsufficientData { .. })));
        assert!(matches!(
            fit_trend(&[point(3, 0.4), point(3, 0.6)]),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_same_day_reports_distinct_dates() {
        let err = fit_trend(&[point(3, 0.4), point(3, 0.5), point(3, 0.6)]).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                required: 2,
                available: 1
            }
        ));
        assert!(err.to_string().contains("1 available"));
        assert!(err.to_string().contains("distinct dates"));
    }
}
