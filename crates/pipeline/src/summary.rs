//! Run accounting

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::SceneFailure;

/// Paths of the artifacts a run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactPaths {
    pub table: PathBuf,
    pub chart: PathBuf,
    /// Absent when no trend could be fitted
    pub trend: Option<PathBuf>,
}

/// Counts for one run, by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub scenes_selected: usize,
    pub computed: usize,
    pub cached: usize,
    /// Compute failures by [`SceneFailure::kind`]
    pub compute_failures: BTreeMap<&'static str, usize>,
    pub reduced: usize,
    /// Reduction failures by [`SceneFailure::kind`]
    pub reduction_failures: BTreeMap<&'static str, usize>,
    /// Points in the final series, after duplicate-date resolution
    pub series_points: usize,
    pub trend_fitted: bool,
    pub artifacts: Option<ArtifactPaths>,
}

impl RunSummary {
    pub fn record_compute_failure(&mut self, scene_id: &str, failure: &SceneFailure) {
        warn!(scene = scene_id, kind = failure.kind(), error = %failure, "scene skipped in compute stage");
        *self.compute_failures.entry(failure.kind()).or_default() += 1;
    }

    pub fn record_reduction_failure(&mut self, scene_id: &str, failure: &SceneFailure) {
        warn!(scene = scene_id, kind = failure.kind(), error = %failure, "scene skipped in reduction stage");
        *self.reduction_failures.entry(failure.kind()).or_default() += 1;
    }

    pub fn compute_failed(&self) -> usize {
        self.compute_failures.values().sum()
    }

    pub fn reduction_failed(&self) -> usize {
        self.reduction_failures.values().sum()
    }

    /// Scenes dropped in any stage
    pub fn skipped(&self) -> usize {
        self.compute_failed() + self.reduction_failed()
    }

    pub fn log(&self) {
        info!(
            selected = self.scenes_selected,
            computed = self.computed,
            cached = self.cached,
            reduced = self.reduced,
            skipped = self.skipped(),
            points = self.series_points,
            trend = self.trend_fitted,
            "run complete"
        );
    }
}

fn write_failures(f: &mut fmt::Formatter<'_>, failures: &BTreeMap<&'static str, usize>) -> fmt::Result {
    for (kind, count) in failures {
        writeln!(f, "    {kind:<16} {count}")?;
    }
    Ok(())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Scenes selected: {}", self.scenes_selected)?;
        writeln!(f, "  Computed:        {}", self.computed)?;
        writeln!(f, "  Cached:          {}", self.cached)?;
        writeln!(f, "  Compute failed:  {}", self.compute_failed())?;
        write_failures(f, &self.compute_failures)?;
        writeln!(f, "  Reduced:         {}", self.reduced)?;
        writeln!(f, "  Reduce failed:   {}", self.reduction_failed())?;
        write_failures(f, &self.reduction_failures)?;
        writeln!(f, "  Series points:   {}", self.series_points)?;
        writeln!(f, "  Trend fitted:    {}", if self.trend_fitted { "yes" } else { "no" })?;
        match &self.artifacts {
            Some(paths) => {
                writeln!(f, "  Table:           {}", paths.table.display())?;
                writeln!(f, "  Chart:           {}", paths.chart.display())?;
                if let Some(trend) = &paths.trend {
                    writeln!(f, "  Trend report:    {}", trend.display())?;
                }
            }
            None => writeln!(f, "  Artifacts:       none (no valid scene)")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_counts_by_kind() {
        let mut summary = RunSummary::default();
        summary.record_compute_failure("a", &SceneFailure::MissingBand { band: "red".into() });
        summary.record_compute_failure("b", &SceneFailure::MissingBand { band: "nir".into() });
        summary.record_reduction_failure("c", &SceneFailure::ClipEmpty);

        assert_eq!(summary.compute_failures.get("missing_band"), Some(&2));
        assert_eq!(summary.compute_failed(), 2);
        assert_eq!(summary.reduction_failed(), 1);
        assert_eq!(summary.skipped(), 3);
    }

    #[test]
    fn test_display_without_artifacts() {
        let text = RunSummary::default().to_string();
        assert!(text.contains("Scenes selected: 0"));
        assert!(text.contains("none (no valid scene)"));
    }
}
