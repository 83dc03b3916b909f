//! SVG line chart of a vegetation index time series.
//!
//! Draws the raw series as markers joined by a thin line, the smoothed
//! series as a thicker line (broken where no smoothed value exists), and the
//! fitted trend as a dashed line when one is available.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use vegtrend_algorithms::timeseries::{TimeSeries, TrendDirection};

use crate::scheme::{evaluate, ColorScheme, Rgb};
use crate::ChartError;

/// Chart layout and labels.
#[derive(Debug, Clone)]
pub struct ChartParams {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Y axis label, e.g. "Mean NDVI"
    pub y_label: String,
    /// Marker colors follow this scheme over the plotted value range
    pub scheme: ColorScheme,
}

impl Default for ChartParams {
    fn default() -> Self {
        Self {
            width: 960,
            height: 480,
            title: "Vegetation index time series".into(),
            y_label: "Mean NDVI".into(),
            scheme: ColorScheme::Ndvi,
        }
    }
}

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;

const RAW_COLOR: Rgb = Rgb::new(110, 110, 110);
const SMOOTH_COLOR: Rgb = Rgb::new(20, 110, 40);
const AXIS_COLOR: Rgb = Rgb::new(60, 60, 60);
const GRID_COLOR: Rgb = Rgb::new(225, 225, 225);

/// Data-to-pixel mapping for one chart.
struct Frame {
    first: NaiveDate,
    span_days: f64,
    y_min: f64,
    y_max: f64,
    left: f64,
    top: f64,
    plot_w: f64,
    plot_h: f64,
}

impl Frame {
    fn new(series: &TimeSeries, params: &ChartParams) -> Self {
        let points = series.points();
        let first = points.first().map(|p| p.date).unwrap_or_default();
        let last = points.last().map(|p| p.date).unwrap_or(first);

        let mut values: Vec<f64> = points.iter().map(|p| p.value).collect();
        values.extend(series.smoothed().iter().flatten());
        if let Some(trend) = series.trend() {
            values.push(trend.predict(first));
            values.push(trend.predict(last));
        }

        let (mut y_min, mut y_max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !y_min.is_finite() || !y_max.is_finite() {
            y_min = 0.0;
            y_max = 1.0;
        }
        let pad = ((y_max - y_min) * 0.1).max(0.02);
        y_min -= pad;
        y_max += pad;

        let span_days = (last - first).num_days() as f64;

        Self {
            first,
            span_days,
            y_min,
            y_max,
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            plot_w: (params.width as f64 - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            plot_h: (params.height as f64 - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
        }
    }

    fn x(&self, date: NaiveDate) -> f64 {
        // a single date sits in the middle
        let t = if self.span_days > 0.0 {
            (date - self.first).num_days() as f64 / self.span_days
        } else {
            0.5
        };
        self.left + t * self.plot_w
    }

    fn y(&self, value: f64) -> f64 {
        let t = (value - self.y_min) / (self.y_max - self.y_min);
        self.top + (1.0 - t) * self.plot_h
    }

    fn normalized(&self, value: f64) -> f64 {
        (value - self.y_min) / (self.y_max - self.y_min)
    }
}

/// Render `series` as an SVG document.
pub fn render_series_chart(series: &TimeSeries, params: &ChartParams) -> String {
    let frame = Frame::new(series, params);
    let mut svg = String::new();

    // fmt::Write into a String cannot fail
    let _ = write_document(&mut svg, series, params, &frame);
    svg
}

/// Render `series` and write the SVG to `path`.
pub fn write_series_chart(series: &TimeSeries, params: &ChartParams, path: &Path) -> Result<(), ChartError> {
    let svg = render_series_chart(series, params);
    fs::write(path, svg).map_err(|source| ChartError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), points = series.len(), "wrote chart");
    Ok(())
}

fn write_document(svg: &mut String, series: &TimeSeries, params: &ChartParams, frame: &Frame) -> std::fmt::Result {
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">"#,
        w = params.width,
        h = params.height
    )?;
    writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    writeln!(
        svg,
        r#"<text x="{}" y="28" font-size="16" text-anchor="middle">{}</text>"#,
        params.width as f64 / 2.0,
        escape(&params.title)
    )?;

    write_axes(svg, series, params, frame)?;

    if series.is_empty() {
        writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" fill="{}">no data</text>"#,
            frame.left + frame.plot_w / 2.0,
            frame.top + frame.plot_h / 2.0,
            AXIS_COLOR.to_hex()
        )?;
        return writeln!(svg, "</svg>");
    }

    write_raw(svg, series, params, frame)?;
    write_smoothed(svg, series, frame)?;
    write_trend(svg, series, frame)?;
    write_legend(svg, series, frame)?;

    writeln!(svg, "</svg>")
}

fn write_axes(svg: &mut String, series: &TimeSeries, params: &ChartParams, frame: &Frame) -> std::fmt::Result {
    let bottom = frame.top + frame.plot_h;
    let right = frame.left + frame.plot_w;

    for i in 0..=Y_TICKS {
        let value = frame.y_min + (frame.y_max - frame.y_min) * i as f64 / Y_TICKS as f64;
        let y = frame.y(value);
        writeln!(
            svg,
            r#"<line x1="{:.1}" y1="{y:.1}" x2="{right:.1}" y2="{y:.1}" stroke="{}"/>"#,
            frame.left,
            GRID_COLOR.to_hex()
        )?;
        writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{value:.3}</text>"#,
            frame.left - 8.0,
            y + 4.0
        )?;
    }

    for date in x_ticks(series) {
        let x = frame.x(date);
        writeln!(
            svg,
            r#"<line x1="{x:.1}" y1="{bottom:.1}" x2="{x:.1}" y2="{:.1}" stroke="{}"/>"#,
            bottom + 5.0,
            AXIS_COLOR.to_hex()
        )?;
        writeln!(
            svg,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            bottom + 20.0,
            date.format("%Y-%m-%d")
        )?;
    }

    writeln!(
        svg,
        r#"<polyline points="{l:.1},{t:.1} {l:.1},{b:.1} {r:.1},{b:.1}" fill="none" stroke="{c}"/>"#,
        l = frame.left,
        t = frame.top,
        b = bottom,
        r = right,
        c = AXIS_COLOR.to_hex()
    )?;
    writeln!(
        svg,
        r#"<text x="18" y="{:.1}" text-anchor="middle" transform="rotate(-90 18 {:.1})">{}</text>"#,
        frame.top + frame.plot_h / 2.0,
        frame.top + frame.plot_h / 2.0,
        escape(&params.y_label)
    )?;
    writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">Date</text>"#,
        frame.left + frame.plot_w / 2.0,
        bottom + 45.0
    )
}

/// First of each month in range, thinned to at most eight labels. Short
/// series fall back to their own dates.
fn x_ticks(series: &TimeSeries) -> Vec<NaiveDate> {
    let (Some(first), Some(last)) = (series.points().first(), series.points().last()) else {
        return Vec::new();
    };
    let (first, last) = (first.date, last.date);

    let mut months = Vec::new();
    let mut cursor = NaiveDate::from_ymd_opt(first.year(), first.month(), 1);
    while let Some(date) = cursor {
        if date > last {
            break;
        }
        if date >= first {
            months.push(date);
        }
        cursor = date.checked_add_months(chrono::Months::new(1));
    }

    if months.len() < 2 {
        let mut dates = vec![first];
        if last != first {
            dates.push(last);
        }
        return dates;
    }

    let step = months.len().div_ceil(8);
    months.into_iter().step_by(step).collect()
}

fn write_raw(svg: &mut String, series: &TimeSeries, params: &ChartParams, frame: &Frame) -> std::fmt::Result {
    let points: Vec<String> = series
        .points()
        .iter()
        .map(|p| format!("{:.1},{:.1}", frame.x(p.date), frame.y(p.value)))
        .collect();
    writeln!(
        svg,
        r#"<polyline class="raw" points="{}" fill="none" stroke="{}" stroke-width="1"/>"#,
        points.join(" "),
        RAW_COLOR.to_hex()
    )?;

    for p in series.points() {
        let color = evaluate(params.scheme, frame.normalized(p.value));
        writeln!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="3.5" fill="{}" stroke="{}"><title>{} {:.4}</title></circle>"#,
            frame.x(p.date),
            frame.y(p.value),
            color.to_hex(),
            AXIS_COLOR.to_hex(),
            p.date,
            p.value
        )?;
    }
    Ok(())
}

fn write_smoothed(svg: &mut String, series: &TimeSeries, frame: &Frame) -> std::fmt::Result {
    let mut runs: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for (date, _, smoothed) in series.rows() {
        match smoothed {
            Some(v) => current.push(format!("{:.1},{:.1}", frame.x(date), frame.y(v))),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    for run in runs.iter().filter(|r| r.len() >= 2) {
        writeln!(
            svg,
            r#"<polyline class="smoothed" points="{}" fill="none" stroke="{}" stroke-width="2.5"/>"#,
            run.join(" "),
            SMOOTH_COLOR.to_hex()
        )?;
    }
    Ok(())
}

fn write_trend(svg: &mut String, series: &TimeSeries, frame: &Frame) -> std::fmt::Result {
    let (Some(trend), Some(first), Some(last)) = (series.trend(), series.points().first(), series.points().last()) else {
        return Ok(());
    };

    let color = trend_color(trend.direction);
    writeln!(
        svg,
        r#"<line class="trend" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="2" stroke-dasharray="6 4"/>"#,
        frame.x(first.date),
        frame.y(trend.predict(first.date)),
        frame.x(last.date),
        frame.y(trend.predict(last.date)),
        color.to_hex()
    )
}

fn trend_color(direction: TrendDirection) -> Rgb {
    match direction {
        TrendDirection::Increasing => evaluate(ColorScheme::Divergent, 0.0),
        TrendDirection::Decreasing => evaluate(ColorScheme::Divergent, 1.0),
    }
}

fn write_legend(svg: &mut String, series: &TimeSeries, frame: &Frame) -> std::fmt::Result {
    let x = frame.left + 12.0;
    let mut y = frame.top + 14.0;

    let mut entries = vec![
        ("Observed".to_string(), RAW_COLOR, ""),
        (format!("Moving average (window {})", series.window()), SMOOTH_COLOR, ""),
    ];
    if let Some(trend) = series.trend() {
        let label = format!(
            "Trend: {} ({:+.5}/day, R² {:.3})",
            trend.direction.as_str(),
            trend.slope,
            trend.r_squared
        );
        entries.push((label, trend_color(trend.direction), "6 4"));
    }

    for (label, color, dash) in entries {
        writeln!(
            svg,
            r#"<line x1="{x:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="{}" stroke-width="2.5" stroke-dasharray="{dash}"/>"#,
            x + 24.0,
            color.to_hex()
        )?;
        writeln!(svg, r#"<text x="{:.1}" y="{:.1}">{}</text>"#, x + 30.0, y + 4.0, escape(&label))?;
        y += 18.0;
    }
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
