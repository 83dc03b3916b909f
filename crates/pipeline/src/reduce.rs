//! Per-scene reduction: stored raster to one dated area mean

use tracing::debug;

use vegtrend_algorithms::statistics::area_mean;
use vegtrend_algorithms::timeseries::{parse_scene_date, TimeSeriesPoint};
use vegtrend_algorithms::vector::clip_to_aoi;
use vegtrend_core::AreaOfInterest;

use crate::error::SceneFailure;
use crate::store::IndexStore;

/// One scene reduced to its area mean
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub scene_id: String,
    pub point: TimeSeriesPoint,
    /// Valid cells that contributed to the mean
    pub valid: usize,
    /// Cells inside the area of interest
    pub retained: usize,
}

/// Clip the stored raster for `scene_id` to `aoi` and average its valid cells.
///
/// The date is parsed first, so an undated artifact is never read.
pub fn reduce_scene(
    store: &dyn IndexStore,
    scene_id: &str,
    aoi: &AreaOfInterest,
) -> Result<Reduction, SceneFailure> {
    let date = parse_scene_date(scene_id).map_err(|e| SceneFailure::DateParse(e.to_string()))?;

    let raster = store
        .read(scene_id)
        .map_err(|e| SceneFailure::RasterRead(e.to_string()))?;

    let clipped = clip_to_aoi(&raster, aoi).map_err(|e| SceneFailure::Clip(e.to_string()))?;
    if clipped.is_empty() {
        return Err(SceneFailure::ClipEmpty);
    }

    let mean = area_mean(&clipped.raster).ok_or(SceneFailure::NoValidPixels)?;
    debug!(
        scene = scene_id,
        %date,
        mean = mean.mean,
        valid = mean.valid,
        retained = clipped.retained,
        "scene reduced"
    );

    Ok(Reduction {
        scene_id: scene_id.to_string(),
        point: TimeSeriesPoint::new(date, mean.mean),
        valid: mean.valid,
        retained: clipped.retained,
    })
}
