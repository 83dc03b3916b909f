//! vegtrend CLI - vegetation index trends from satellite scenes

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vegtrend_algorithms::imagery::SpectralIndex;
use vegtrend_algorithms::statistics::area_mean;
use vegtrend_algorithms::timeseries::{parse_scene_date, DuplicateDatePolicy, TimeSeries};
use vegtrend_core::io::read_geotiff;
use vegtrend_pipeline::{Pipeline, PipelineConfig, RunOutcome, RunSummary};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vegtrend")]
#[command(author, version, about = "Vegetation index trends from satellite scenes", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (otherwise $VEGTREND_CONFIG, then ./vegtrend.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search, compute, reduce and aggregate: the whole study
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// List the scenes the catalog query selects, without processing them
    Search {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Rebuild the series and artifacts from stored index rasters only
    Analyze {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Show information about an index raster
    Info {
        /// Input raster file
        input: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line values that take precedence over the config file
#[derive(clap::Args, Default)]
struct Overrides {
    /// First acquisition date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last acquisition date (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Cloud-cover ceiling as a fraction (0.2 = 20%)
    #[arg(long)]
    max_cloud: Option<f64>,

    /// Spectral index: ndvi, gndvi, ndwi or nbr
    #[arg(long)]
    index: Option<SpectralIndex>,

    /// Moving-average window (odd)
    #[arg(long)]
    window: Option<usize>,

    /// Same-date observations: keep_all, first or mean
    #[arg(long, value_parser = parse_duplicates)]
    duplicates: Option<DuplicateDatePolicy>,

    /// Parallel workers (1 = sequential, 0 = all cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// AOI GeoJSON file
    #[arg(long)]
    aoi: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(start) = self.start {
            config.catalog.start_date = start;
        }
        if let Some(end) = self.end {
            config.catalog.end_date = end;
        }
        if let Some(max_cloud) = self.max_cloud {
            config.catalog.max_cloud_cover = max_cloud;
        }
        if let Some(index) = self.index {
            config.index.kind = index;
        }
        if let Some(window) = self.window {
            config.series.window = window;
        }
        if let Some(duplicates) = self.duplicates {
            config.series.duplicate_dates = duplicates;
        }
        if let Some(workers) = self.workers {
            config.processing.workers = workers;
        }
        if let Some(aoi) = self.aoi {
            config.aoi.path = aoi;
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn parse_duplicates(s: &str) -> Result<DuplicateDatePolicy, String> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "keep_all" | "all" => Ok(DuplicateDatePolicy::KeepAll),
        "first" => Ok(DuplicateDatePolicy::First),
        "mean" => Ok(DuplicateDatePolicy::Mean),
        _ => Err(format!("unknown policy '{s}'. Use keep_all, first or mean.")),
    }
}

fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<PipelineConfig> {
    let (mut config, source) = PipelineConfig::load(path).context("Failed to load configuration")?;
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    info!(source = %source, "configuration ready");
    Ok(config)
}

fn print_series(series: &TimeSeries) {
    println!("\n{:<12} {:>10} {:>10}", "Date", "Mean", "Smoothed");
    for (date, value, smoothed) in series.rows() {
        let smoothed = smoothed.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
        println!("{:<12} {:>10.4} {:>10}", date.format("%Y-%m-%d").to_string(), value, smoothed);
    }

    match series.trend() {
        Some(trend) => {
            println!(
                "\nTrend: {}{} ({:+.6}/day, {:+.4}/year)",
                trend.direction.as_str(),
                if trend.flat { " (flat)" } else { "" },
                trend.slope,
                trend.slope * 365.25
            );
            println!("  R²: {:.4}", trend.r_squared);
            if let Some(p) = trend.p_value {
                println!("  p-value: {:.4}", p);
            }
        }
        None => println!("\nTrend: not enough distinct dates"),
    }
}

fn report(outcome: &RunOutcome, summary_title: &str, elapsed: std::time::Duration) {
    if let Some(series) = &outcome.series {
        print_series(series);
    }
    println!("\n{summary_title}:");
    print!("{}", outcome.summary);
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        // ── Run ──────────────────────────────────────────────────────
        Commands::Run { overrides } => {
            let config = load_config(config_path, overrides)?;
            let start = Instant::now();
            let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;

            let aoi = pipeline.load_aoi()?;

            let pb = spinner("Searching catalog...")?;
            let scenes = pipeline.select(&aoi);
            pb.finish_and_clear();
            let scenes = scenes.context("Scene selection failed")?;
            println!("Selected {} scenes", scenes.len());

            let mut summary = RunSummary {
                scenes_selected: scenes.len(),
                ..RunSummary::default()
            };

            let pb = spinner(&format!(
                "Computing {} rasters for {} scenes...",
                pipeline.config().index.kind,
                scenes.len()
            ))?;
            let ready = pipeline.compute_all(&scenes, &aoi, &mut summary);
            pb.finish_and_clear();
            let ready = ready?;

            let pb = spinner("Reducing to area means...")?;
            let points = pipeline.reduce_all(&ready, &aoi, &mut summary);
            pb.finish_and_clear();
            let points = points?;

            let outcome = pipeline.finish(points, summary).context("Failed to write artifacts")?;
            report(&outcome, "Run summary", start.elapsed());
        }

        // ── Search ───────────────────────────────────────────────────
        Commands::Search { overrides } => {
            let config = load_config(config_path, overrides)?;
            let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;
            let aoi = pipeline.load_aoi()?;

            let pb = spinner("Searching catalog...")?;
            let scenes = pipeline.select(&aoi);
            pb.finish_and_clear();
            let mut scenes = scenes.context("Scene selection failed")?;
            scenes.sort_by(|a, b| a.datetime.cmp(&b.datetime));

            let (positive, negative) = pipeline.config().index.kind.bands();
            println!("{:<40} {:<12} {:>7}  {}", "Scene", "Date", "Cloud", "Bands");
            for scene in &scenes {
                let cloud = scene
                    .cloud_cover
                    .map_or_else(|| "-".to_string(), |c| format!("{:.1}%", c * 100.0));
                let bands = match (scene.band(positive), scene.band(negative)) {
                    (Some(_), Some(_)) => "ok".to_string(),
                    (None, _) => format!("missing {positive}"),
                    (_, None) => format!("missing {negative}"),
                };
                println!(
                    "{:<40} {:<12} {:>7}  {}",
                    scene.id,
                    scene.acquisition_date().format("%Y-%m-%d").to_string(),
                    cloud,
                    bands
                );
            }
            println!("\n{} scenes", scenes.len());
        }

        // ── Analyze ──────────────────────────────────────────────────
        Commands::Analyze { overrides } => {
            let config = load_config(config_path, overrides)?;
            let start = Instant::now();
            let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;

            let pb = spinner("Reducing stored rasters...")?;
            let outcome = pipeline.analyze();
            pb.finish_and_clear();
            let outcome = outcome.context("Analysis failed")?;
            report(&outcome, "Analysis summary", start.elapsed());
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading raster...")?;
            let raster = read_geotiff::<f64, _>(&input);
            pb.finish_and_clear();
            let raster = raster.context("Failed to read raster")?;
            let (rows, cols) = raster.shape();
            let transform = raster.transform();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            let bounds = transform.bounds(cols, rows);
            println!("Cell size: {}", transform.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }

            let date = input
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| parse_scene_date(s).ok());
            if let Some(date) = date {
                println!("Acquisition date: {}", date);
            }

            match area_mean(&raster) {
                Some(mean) => {
                    println!("\nStatistics:");
                    println!("  Mean: {:.4}", mean.mean);
                    println!(
                        "  Valid cells: {} ({:.1}%)",
                        mean.valid,
                        100.0 * mean.coverage()
                    );
                }
                None => println!("\nNo valid cells"),
            }
        }

        // ── Config ───────────────────────────────────────────────────
        Commands::Config { overrides } => {
            let config = load_config(config_path, overrides)?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
