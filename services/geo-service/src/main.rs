//! Geo Service
//!
//! Processes one request against the configured datasets and writes the
//! artifact, prepares a project file from a plan, or converts a plan
//! upload to normalized GeoJSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geo_common::Srs;
use geo_service::{convert_plan, GeoService, ProcessingRequest, ServiceConfig};
use vector::{FeatureCollection, ProjectFile};

/// Geospatial processing service
#[derive(Parser, Debug)]
#[command(name = "geo-service")]
#[command(about = "Render tiles, extents and features from registered datasets")]
struct Args {
    /// Path to the YAML configuration
    #[arg(short, long, env = "GEO_CONFIG")]
    config: Option<PathBuf>,

    /// Request as JSON, or @file to read it from a file
    #[arg(short, long)]
    request: Option<String>,

    /// Where to write the artifact (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List registered datasets and exit
    #[arg(long)]
    list_datasets: bool,

    /// Build a project file from a plan GeoJSON
    #[arg(long, value_name = "PLAN")]
    project: Option<PathBuf>,

    /// Convert an uploaded plan (shapefile, zip or GeoJSON plus sidecars)
    #[arg(long, value_name = "FILES", num_args = 1..)]
    convert: Vec<PathBuf>,

    /// CRS of the upload when it names no EPSG CRS itself
    #[arg(long, default_value = "EPSG:4326")]
    input_crs: String,

    /// With --convert, write a project file instead of the converted plan
    #[arg(long, requires = "convert")]
    as_project: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(plan) = &args.project {
        return write_project(plan, args.output.as_ref());
    }

    if !args.convert.is_empty() {
        let input_crs: Srs = args.input_crs.parse()?;
        let converted = convert_plan(args.convert.clone(), input_crs).await?;
        let bytes = if args.as_project {
            serde_json::to_vec_pretty(&converted.into_project()?)?
        } else {
            serde_json::to_vec_pretty(&converted)?
        };
        return write_output(args.output.as_ref(), &bytes);
    }

    let config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::from_env()?,
    };
    let service = GeoService::from_config(&config)?;

    if args.list_datasets {
        for (id, info) in service.list_datasets() {
            println!(
                "{}\t{:?}\t{}\t{}\t{}",
                id,
                info.kind,
                info.srs,
                info.extent.cache_key(),
                info.original_crs.as_deref().unwrap_or("-")
            );
        }
        service.shutdown();
        return Ok(());
    }

    let Some(raw) = &args.request else {
        bail!("nothing to do: pass --request, --list-datasets, --project or --convert");
    };
    let body = match raw.strip_prefix('@') {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path))?,
        None => raw.clone().into_bytes(),
    };
    let request = ProcessingRequest::from_json(&body)?;

    let result = service.process(&request).await;
    service.shutdown();
    let artifact = match result {
        Ok(artifact) => artifact,
        Err(e) => bail!(
            "{} ({}, status {})",
            e,
            e.error_code(),
            e.http_status_code()
        ),
    };

    info!(
        dataset = %request.dataset,
        content_type = artifact.mime_type(),
        bytes = artifact.len(),
        "Artifact ready"
    );
    write_output(args.output.as_ref(), &artifact.bytes)
}

/// Normalize a plan's rates and derive its boundaries.
fn write_project(plan: &Path, output: Option<&PathBuf>) -> Result<()> {
    let bytes = std::fs::read(plan).with_context(|| format!("reading {}", plan.display()))?;
    let mut features = FeatureCollection::from_slice(&bytes)?;
    let summary = vector::normalize_rates(&mut features)?;
    info!(
        rate_key = %summary.rate_key,
        min_rate = summary.min_rate,
        max_rate = summary.max_rate,
        "Normalized plan"
    );

    let project = ProjectFile::from_plan(features).complete()?;
    write_output(output, &serde_json::to_vec_pretty(&project)?)
}

fn write_output(output: Option<&PathBuf>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(bytes)?;
        }
    }
    Ok(())
}
