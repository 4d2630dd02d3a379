//! Index builder.
//!
//! Reads intermediate polygon records, rasterizes them level by level and
//! writes the compiled region index.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regiongrid::ingest::{EntityCatalog, RecordReader};
use regiongrid::{BuildConfig, IndexBuilder};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "build-index")]
#[command(about = "Build a reverse geocoding index from polygon records")]
struct Args {
    /// Polygon record file (tab separated, optionally gzip compressed)
    #[arg(short, long)]
    input: PathBuf,

    /// Output index file
    #[arg(short, long)]
    output: PathBuf,

    /// TOML build configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raster resolution in degrees per pixel
    #[arg(long)]
    resolution: Option<f64>,

    /// Lowest admin level to include
    #[arg(long)]
    min_level: Option<u8>,

    /// Highest admin level to include
    #[arg(long)]
    max_level: Option<u8>,

    /// Minimum ring size, in pixels
    #[arg(long)]
    min_pixels: Option<f64>,

    /// Rows rendered per slice
    #[arg(long)]
    slice_height: Option<usize>,
}

impl Args {
    fn build_config(&self) -> Result<BuildConfig> {
        let mut config = match &self.config {
            Some(path) => BuildConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => BuildConfig::default(),
        };
        if let Some(v) = self.resolution {
            config.resolution = v;
        }
        if let Some(v) = self.min_level {
            config.min_level = v;
        }
        if let Some(v) = self.max_level {
            config.max_level = v;
        }
        if let Some(v) = self.min_pixels {
            config.min_pixels = v;
        }
        if let Some(v) = self.slice_height {
            config.slice_height = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = args.build_config()?;
    let start = Instant::now();

    info!("Regiongrid Index Builder");
    info!("Input: {}", args.input.display());
    info!(
        "Resolution {} deg, levels {}-{}, min size {} deg^2",
        config.resolution,
        config.min_level,
        config.max_level,
        config.min_size()
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} lines ({per_sec})")?,
    );
    let mut catalog = EntityCatalog::new(&config);
    for line in RecordReader::open(&args.input)? {
        catalog.add_line(line?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    catalog.log_summary();

    let builder = IndexBuilder::new(&config)?;
    let index = builder.build(catalog)?;
    let size = index.write(&args.output)?;

    info!(
        "Done: {} entries, {} bytes in {:.1}s",
        index.entry_count(),
        size,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
