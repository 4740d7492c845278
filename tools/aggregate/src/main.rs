//! Build the per-region population table from a boundary file and a folder
//! of stratified GeoTIFFs, or reuse the cached one.
//! Output: the dataset JSON at the cache path, a per-year summary on stderr.

use anyhow::{Context, Result};
use clap::Parser;
use popgrid_core::{CacheStatus, Pipeline, PipelineConfig, ReferenceFrame};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "aggregate", about = "Aggregate gridded population rasters per region and stratum")]
struct Args {
    /// JSON config file; flags below override its fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GeoJSON FeatureCollection of region boundaries.
    #[arg(short, long)]
    boundaries: Option<PathBuf>,

    /// Folder of `{sex}_{age}_{year}.tif` rasters.
    #[arg(short, long)]
    rasters: Option<PathBuf>,

    /// Dataset cache file.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Feature property holding the region name.
    #[arg(short = 'n', long)]
    name_field: Option<String>,

    /// Frame assumed for boundaries without a `crs` member (e.g. EPSG:4326).
    #[arg(long)]
    assume_frame: Option<ReferenceFrame>,

    /// Worker threads (default: available parallelism minus one).
    #[arg(short, long)]
    workers: Option<usize>,

    /// First year to aggregate.
    #[arg(long)]
    from_year: Option<i32>,

    /// Last year to aggregate.
    #[arg(long)]
    to_year: Option<i32>,

    /// Print the age pyramid of this province for every year.
    #[arg(short, long)]
    pyramid: Option<String>,

    /// Drop the cached dataset and recompute.
    #[arg(long)]
    refresh: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

// ── Config layering ───────────────────────────────────────────────────────────

fn resolve_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(p) = &args.boundaries {
        cfg.boundaries = p.clone();
    }
    if let Some(p) = &args.rasters {
        cfg.rasters = p.clone();
    }
    if let Some(p) = &args.cache {
        cfg.cache = p.clone();
    }
    if let Some(name) = &args.name_field {
        cfg.name_field = name.clone();
    }
    if args.assume_frame.is_some() {
        cfg.assume_frame = args.assume_frame;
    }
    if args.workers.is_some() {
        cfg.workers = args.workers;
    }
    if args.from_year.is_some() || args.to_year.is_some() {
        let (first, last) = cfg.years.unwrap_or((i32::MIN, i32::MAX));
        cfg.years = Some((args.from_year.unwrap_or(first), args.to_year.unwrap_or(last)));
    }

    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let cfg = resolve_config(&args)?;
    debug!(config = %serde_json::to_string(&cfg)?, "effective configuration");

    let pipeline = Pipeline::new(cfg)?;
    if args.refresh && pipeline.cache().invalidate()? {
        info!(cache = %pipeline.cache().path().display(), "dropped cached dataset");
    }

    let outcome = pipeline.run().context("aggregation failed")?;
    let ds = &outcome.dataset;

    let source = match outcome.cache {
        CacheStatus::Hit => "cache",
        CacheStatus::Computed => "computed",
        CacheStatus::Uncached => "not cached",
    };
    eprintln!("\n{} rows ({}) → {}", ds.len(), source, pipeline.cache().path().display());
    eprintln!("{:<6} {:>16}", "year", "population");
    eprintln!("{}", "-".repeat(23));
    for (year, total) in ds.totals_by_year() {
        eprintln!("{:<6} {:>16.1}", year, total);
    }

    if let Some(province) = &args.pyramid {
        for year in ds.totals_by_year().into_keys() {
            let bars = ds.age_pyramid(province, year);
            if bars.is_empty() {
                continue;
            }
            eprintln!("\n{province} {year}");
            eprintln!("{:<10} {:>14} {:>14}", "age", "female", "male");
            for bar in bars {
                eprintln!("{:<10} {:>14.1} {:>14.1}", bar.age_class, bar.female, bar.male);
            }
        }
    }

    if !outcome.failures.is_empty() {
        eprintln!("\n{} raster(s) skipped:", outcome.failures.len());
        for failure in &outcome.failures {
            eprintln!("  {failure}");
        }
    }

    if ds.is_empty() && outcome.failures.is_empty() {
        warn!(rasters = %pipeline.config().rasters.display(), "no rasters matched");
    }
    Ok(())
}
