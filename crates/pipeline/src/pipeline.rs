//! The scene-to-trend driver
//!
//! Stages run in order: select scenes, compute and persist one index raster
//! per scene, reduce each stored raster to an area mean, then aggregate the
//! means into a series and write its artifacts. Only selection and artifact
//! output can fail a run; per-scene problems are counted and skipped.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use vegtrend_algorithms::timeseries::{TimeSeries, TimeSeriesPoint};
use vegtrend_chart::{SeriesRenderer, SvgRenderer};
use vegtrend_cloud::{
    BandLoader, GeoTiffBandLoader, SceneDescriptor, SceneSelector, StacClientBlocking,
    StacSceneSelector,
};
use vegtrend_core::{AreaOfInterest, CRS};
use vegtrend_parallel::ParallelStrategy;

use crate::artifacts::ArtifactWriter;
use crate::compute::{ComputeOutcome, IndexComputer};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, SceneFailure};
use crate::reduce::reduce_scene;
use crate::store::{FsIndexStore, IndexStore};
use crate::summary::RunSummary;

/// Result of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// `None` when no scene produced a valid area mean
    pub series: Option<TimeSeries>,
}

pub struct Pipeline {
    config: PipelineConfig,
    selector: Box<dyn SceneSelector>,
    loader: Box<dyn BandLoader>,
    store: Box<dyn IndexStore>,
    renderer: Box<dyn SeriesRenderer>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        selector: Box<dyn SceneSelector>,
        loader: Box<dyn BandLoader>,
        store: Box<dyn IndexStore>,
        renderer: Box<dyn SeriesRenderer>,
    ) -> Self {
        Self {
            config,
            selector,
            loader,
            store,
            renderer,
        }
    }

    /// STAC selection, HTTP band loading, a GeoTIFF store under
    /// `paths.raster_dir` and SVG charts.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let catalog = config.stac_catalog();

        let client = StacClientBlocking::new(catalog.clone(), config.client_options())
            .map_err(|source| PipelineError::Setup {
                what: "catalog client",
                source,
            })?;
        let selector = StacSceneSelector::new(client).with_page_size(config.catalog.page_size);

        let loader = GeoTiffBandLoader::new(config.band_loader_options())
            .and_then(|loader| loader.with_catalog(&catalog))
            .map_err(|source| PipelineError::Setup {
                what: "band loader",
                source,
            })?;

        let store = FsIndexStore::open(config.raster_dir(), config.index.kind.name())
            .map_err(PipelineError::Store)?;
        let renderer = SvgRenderer::new(config.chart_params());

        Ok(Self::new(
            config,
            Box::new(selector),
            Box::new(loader),
            Box::new(store),
            Box::new(renderer),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn IndexStore {
        self.store.as_ref()
    }

    /// Read the AOI file and reproject it to `aoi.target_epsg` when set.
    pub fn load_aoi(&self) -> Result<AreaOfInterest> {
        let path = self.config.aoi_path();
        let aoi_err = |source| PipelineError::Aoi {
            path: path.clone(),
            source,
        };

        let aoi = AreaOfInterest::from_geojson_file(&path).map_err(aoi_err)?;
        let aoi = match self.config.aoi.target_epsg {
            Some(code) => aoi.reproject(&CRS::from_epsg(code)).map_err(aoi_err)?,
            None => aoi,
        };
        info!(path = %path.display(), crs = %aoi.crs().identifier(), "area of interest loaded");
        Ok(aoi)
    }

    /// Candidate scenes for the configured query. Any catalog error is fatal.
    pub fn select(&self, aoi: &AreaOfInterest) -> Result<Vec<SceneDescriptor>> {
        let scenes = self
            .selector
            .select(aoi, &self.config.scene_query())
            .map_err(PipelineError::Catalog)?;
        if scenes.is_empty() {
            warn!("no scenes matched the query");
        }
        Ok(scenes)
    }

    /// Compute (or find cached) index rasters. Returns the identities of
    /// scenes with a stored artifact, in input order, repeats included.
    pub fn compute_all(
        &self,
        scenes: &[SceneDescriptor],
        aoi: &AreaOfInterest,
        summary: &mut RunSummary,
    ) -> Result<Vec<String>> {
        let computer = IndexComputer::new(
            self.loader.as_ref(),
            self.store.as_ref(),
            self.config.index.kind,
            self.config.index.nodata,
        );
        let mode = self.config.processing_mode();

        // Each identity is computed once. Later repeats count as cached, or
        // repeat the first failure.
        let mut seen = HashSet::new();
        let distinct: Vec<&SceneDescriptor> =
            scenes.iter().filter(|s| seen.insert(s.id.as_str())).collect();
        info!(
            scenes = scenes.len(),
            distinct = distinct.len(),
            workers = mode.workers(),
            "computing index rasters"
        );

        let outcomes = mode.par_map(&distinct, |scene| computer.compute(scene, aoi))?;
        let mut outcomes: HashMap<&str, std::result::Result<ComputeOutcome, SceneFailure>> = distinct
            .iter()
            .map(|s| s.id.as_str())
            .zip(outcomes)
            .collect();

        let mut ready = Vec::with_capacity(scenes.len());
        for scene in scenes {
            let Some(slot) = outcomes.get_mut(scene.id.as_str()) else {
                continue;
            };
            let outcome = slot.clone();
            if slot.is_ok() {
                *slot = Ok(ComputeOutcome::Cached);
            }
            match outcome {
                Ok(ComputeOutcome::Computed) => summary.computed += 1,
                Ok(ComputeOutcome::Cached) => summary.cached += 1,
                Err(failure) => {
                    summary.record_compute_failure(&scene.id, &failure);
                    continue;
                }
            }
            ready.push(scene.id.clone());
        }
        Ok(ready)
    }

    /// Area mean of every listed stored raster, in input order.
    pub fn reduce_all(
        &self,
        scene_ids: &[String],
        aoi: &AreaOfInterest,
        summary: &mut RunSummary,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let store = self.store.as_ref();
        let mode = self.config.processing_mode();
        info!(rasters = scene_ids.len(), "reducing index rasters");

        let reductions = mode.par_map(scene_ids, |id| reduce_scene(store, id, aoi))?;

        let mut points = Vec::with_capacity(scene_ids.len());
        for (id, reduction) in scene_ids.iter().zip(reductions) {
            match reduction {
                Ok(reduction) => {
                    summary.reduced += 1;
                    points.push(reduction.point);
                }
                Err(failure) => summary.record_reduction_failure(id, &failure),
            }
        }
        Ok(points)
    }

    /// Aggregate the points and write artifacts when at least one exists.
    pub fn finish(&self, points: Vec<TimeSeriesPoint>, mut summary: RunSummary) -> Result<RunOutcome> {
        if points.is_empty() {
            warn!("no scene yielded a valid area mean, no artifacts written");
            summary.log();
            return Ok(RunOutcome {
                summary,
                series: None,
            });
        }

        let series = TimeSeries::build(points, &self.config.series_options())
            .map_err(PipelineError::Series)?;
        summary.series_points = series.len();
        summary.trend_fitted = series.trend().is_some();

        if let Some(trend) = series.trend() {
            info!(
                slope = trend.slope,
                r_squared = trend.r_squared,
                p_value = ?trend.p_value,
                direction = trend.direction.as_str(),
                "trend fitted"
            );
        }

        let writer = ArtifactWriter::new(
            self.config.results_dir(),
            self.config.index.kind.name(),
            self.renderer.as_ref(),
        );
        summary.artifacts = Some(writer.write(&series)?);
        summary.log();

        Ok(RunOutcome {
            summary,
            series: Some(series),
        })
    }

    /// Every stage, from catalog search to artifacts.
    pub fn run(&self) -> Result<RunOutcome> {
        let aoi = self.load_aoi()?;
        let scenes = self.select(&aoi)?;

        let mut summary = RunSummary {
            scenes_selected: scenes.len(),
            ..RunSummary::default()
        };
        let ready = self.compute_all(&scenes, &aoi, &mut summary)?;
        let points = self.reduce_all(&ready, &aoi, &mut summary)?;
        self.finish(points, summary)
    }

    /// Reduce and aggregate whatever is already in the store, without
    /// contacting the catalog.
    pub fn analyze(&self) -> Result<RunOutcome> {
        let aoi = self.load_aoi()?;
        let ids = self.store.list().map_err(PipelineError::Store)?;
        info!(rasters = ids.len(), "analyzing stored index rasters");

        let mut summary = RunSummary::default();
        let points = self.reduce_all(&ids, &aoi, &mut summary)?;
        self.finish(points, summary)
    }
}
