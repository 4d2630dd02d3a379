//! Reverse geocoding queries against a compiled region index.
//!
//! Points are taken from the command line as `lon,lat`, or from stdin one per
//! line when none are given. Each answer is printed as one JSON line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regiongrid::{AdminRecord, ReverseGeocoder};

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Resolve coordinates to administrative regions")]
struct Args {
    /// Compiled index file
    #[arg(short, long)]
    index: PathBuf,

    /// Points as "lon,lat"
    #[arg(allow_hyphen_values = true)]
    points: Vec<String>,

    /// Print the raw level records instead of parsed fields
    #[arg(long)]
    raw: bool,
}

#[derive(Serialize)]
struct ReverseResponse {
    lon: f32,
    lat: f32,
    code: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    regions: Vec<AdminRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<String>,
    took_us: u128,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut geocoder = ReverseGeocoder::open(&args.index)
        .with_context(|| format!("Failed to open index {}", args.index.display()))?;
    info!("Loaded index with {} entries", geocoder.entry_count());

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.points.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            if line.trim().is_empty() {
                continue;
            }
            answer(&mut geocoder, &line, args.raw, &mut out)?;
        }
    } else {
        for point in &args.points {
            answer(&mut geocoder, point, args.raw, &mut out)?;
        }
    }

    geocoder.close();
    Ok(())
}

fn answer<W: Write>(
    geocoder: &mut ReverseGeocoder,
    point: &str,
    raw: bool,
    out: &mut W,
) -> Result<()> {
    let Some((lon, lat)) = parse_point(point) else {
        warn!("Ignoring malformed point {:?}", point);
        return Ok(());
    };

    let start = Instant::now();
    let code = geocoder.lookup_code(lon, lat)?;
    let chain = geocoder.lookup_metadata(code)?;
    let took_us = start.elapsed().as_micros();

    let response = ReverseResponse {
        lon,
        lat,
        code,
        regions: if raw {
            Vec::new()
        } else {
            AdminRecord::parse_chain(&chain[..])
        },
        records: if raw { chain.to_vec() } else { Vec::new() },
        took_us,
    };
    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    Ok(())
}

/// Parse a point string "lon,lat"
fn parse_point(point: &str) -> Option<(f32, f32)> {
    let (lon, lat) = point.split_once(',')?;
    Some((lon.trim().parse().ok()?, lat.trim().parse().ok()?))
}
