//! Pipeline configuration as operator-tunable TOML.
//!
//! Every section has defaults, so an empty file (or no file at all) runs the
//! Breña park NDVI study for the 2025 season.
//!
//! Search order for [`PipelineConfig::load`]:
//! 1. an explicit path (`--config`), whose errors are fatal
//! 2. `$VEGTREND_CONFIG`, falling back with a warning when unusable
//! 3. `./vegtrend.toml`
//! 4. built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vegtrend_algorithms::imagery::SpectralIndex;
use vegtrend_algorithms::timeseries::{DuplicateDatePolicy, SeriesOptions};
use vegtrend_chart::ChartParams;
use vegtrend_cloud::{BandLoaderOptions, SceneQuery, StacCatalog, StacClientOptions};
use vegtrend_parallel::ProcessingMode;

use crate::error::ConfigError;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "VEGTREND_CONFIG";

/// File looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "vegtrend.toml";

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub aoi: AoiConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

/// Catalog endpoint and search window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// `earth-search`, `planetary-computer` or a STAC API root URL
    pub url: String,
    pub collection: String,
    /// Cloud-cover ceiling as a 0–1 fraction, exclusive
    pub max_cloud_cover: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Stop paginating after this many items
    pub max_items: usize,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: "earth-search".to_string(),
            collection: "sentinel-2-l2a".to_string(),
            max_cloud_cover: 0.2,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2025, 8, 19).unwrap_or_default(),
            max_items: 500,
            page_size: 100,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AoiConfig {
    /// GeoJSON Polygon/MultiPolygon (bare, Feature or FeatureCollection)
    pub path: PathBuf,
    /// Reproject the AOI to this EPSG code before use
    pub target_epsg: Option<u32>,
}

impl Default for AoiConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("input/aoi.geojson"),
            target_epsg: Some(32630),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: SpectralIndex,
    /// Sentinel written for cells without a defined index value
    pub nodata: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: SpectralIndex::Ndvi,
            nodata: -9999.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Odd centered moving-average window
    pub window: usize,
    pub duplicate_dates: DuplicateDatePolicy,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            window: 3,
            duplicate_dates: DuplicateDatePolicy::KeepAll,
        }
    }
}

/// Relative paths resolve against `base_dir` (the working directory when unset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: Option<PathBuf>,
    pub raster_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            raster_dir: PathBuf::from("ndvi"),
            results_dir: PathBuf::from("results"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// 1 runs scenes sequentially, 0 uses every core
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: "NDVI Time Series - Parque Natural de la Breña".to_string(),
            width: 960,
            height: 480,
        }
    }
}

impl PipelineConfig {
    /// Load configuration using the standard search order.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "loaded config");
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => {
                        info!(path = %path.display(), "loaded config from {CONFIG_ENV}");
                        return Ok((config, ConfigSource::File(path)));
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to load config from {CONFIG_ENV}, falling back");
                    }
                }
            } else {
                warn!(path = %path.display(), "{CONFIG_ENV} points to a missing file, falling back");
            }
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(path = %local.display(), "loaded config");
            return Ok((config, ConfigSource::File(local)));
        }

        info!("no config file found, using defaults");
        Ok((Self::default(), ConfigSource::Defaults))
    }

    /// Parse and validate a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let c = &self.catalog;

        if c.url.trim().is_empty() {
            errors.push("catalog.url: must not be empty".to_string());
        }
        if c.collection.trim().is_empty() {
            errors.push("catalog.collection: must not be empty".to_string());
        }
        if !c.max_cloud_cover.is_finite() || c.max_cloud_cover <= 0.0 || c.max_cloud_cover > 1.0 {
            errors.push(format!(
                "catalog.max_cloud_cover: must be a fraction in (0, 1] (got {})",
                c.max_cloud_cover
            ));
        }
        if c.start_date > c.end_date {
            errors.push(format!(
                "catalog.start_date ({}) is after catalog.end_date ({})",
                c.start_date, c.end_date
            ));
        }
        if c.max_items == 0 {
            errors.push("catalog.max_items: must be > 0".to_string());
        }
        if c.page_size == 0 {
            errors.push("catalog.page_size: must be > 0".to_string());
        }
        if c.timeout_secs == 0 {
            errors.push("catalog.timeout_secs: must be > 0".to_string());
        }

        if !self.index.nodata.is_finite() {
            errors.push(format!("index.nodata: must be finite (got {})", self.index.nodata));
        } else if (-1.0..=1.0).contains(&self.index.nodata) {
            errors.push(format!(
                "index.nodata: {} collides with valid index values in [-1, 1]",
                self.index.nodata
            ));
        }

        let w = self.series.window;
        if w == 0 || w % 2 == 0 {
            errors.push(format!("series.window: must be odd and >= 1 (got {w})"));
        }

        if self.chart.width < 100 || self.chart.height < 100 {
            errors.push(format!(
                "chart: {}x{} is too small (minimum 100x100)",
                self.chart.width, self.chart.height
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Join a configured path onto `paths.base_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.paths.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn aoi_path(&self) -> PathBuf {
        self.resolve(&self.aoi.path)
    }

    pub fn raster_dir(&self) -> PathBuf {
        self.resolve(&self.paths.raster_dir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.resolve(&self.paths.results_dir)
    }

    pub fn stac_catalog(&self) -> StacCatalog {
        StacCatalog::from_str_or_url(&self.catalog.url)
    }

    pub fn client_options(&self) -> StacClientOptions {
        StacClientOptions {
            request_timeout: Duration::from_secs(self.catalog.timeout_secs),
            max_retries: self.catalog.max_retries,
            max_items: self.catalog.max_items,
        }
    }

    pub fn band_loader_options(&self) -> BandLoaderOptions {
        BandLoaderOptions {
            request_timeout: Duration::from_secs(self.catalog.timeout_secs),
            max_retries: self.catalog.max_retries,
            ..BandLoaderOptions::default()
        }
    }

    pub fn scene_query(&self) -> SceneQuery {
        SceneQuery {
            collection: self.catalog.collection.clone(),
            start: self.catalog.start_date,
            end: self.catalog.end_date,
            max_cloud_cover: self.catalog.max_cloud_cover,
        }
    }

    pub fn series_options(&self) -> SeriesOptions {
        SeriesOptions {
            window: self.series.window,
            duplicates: self.series.duplicate_dates,
        }
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::from_workers(self.processing.workers)
    }

    pub fn chart_params(&self) -> ChartParams {
        ChartParams {
            width: self.chart.width,
            height: self.chart.height,
            title: self.chart.title.clone(),
            y_label: format!("Mean {}", self.index.kind.name().to_uppercase()),
            ..ChartParams::default()
        }
    }
}
