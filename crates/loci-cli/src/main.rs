//! Loci: download Street View images for a CSV of coordinates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use loci_batch::{CsvRowSource, Downloader, LogSink};
use loci_core::{StreetViewConfig, ViewType};
use loci_streetview::StreetViewClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loci", version, about = "Download Street View images for a CSV of coordinates")]
struct Args {
    /// View type: RV (road view) or FV (footpath view). Anything else falls back to RV.
    view_type: Option<String>,

    /// CSV file with `latitude` and `longitude` columns
    #[arg(short, long, default_value = "Test1.csv")]
    input: PathBuf,

    /// Directory the `location_<n>.jpg` files are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

/// Lenient view type selection: unknown values warn and use the default.
fn resolve_view_type(arg: Option<&str>) -> ViewType {
    let default = ViewType::default();
    match arg {
        None => {
            info!("Using default view type: {}", default);
            default
        }
        Some(raw) => match ViewType::from_code(raw) {
            Some(view_type) => {
                info!("Using user-specified view type: {}", view_type);
                view_type
            }
            None => {
                warn!("Invalid view type '{}' provided. Using default view type: {}", raw, default);
                default
            }
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let view_type = resolve_view_type(args.view_type.as_deref());

    let config = StreetViewConfig::from_env()?;
    let footpath_offset = config.footpath_offset_deg;

    // Column problems abort before any request is made
    let source = CsvRowSource::from_path(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let client = StreetViewClient::new(config)?;
    let downloader = Downloader::new(Arc::new(client), &args.output_dir)
        .with_view_type(view_type)
        .with_footpath_offset(footpath_offset);

    let summary = downloader.run(source, &mut LogSink).await?;

    info!(
        "Done: {} of {} locations downloaded, {} skipped, {} notices",
        summary.downloaded.len(),
        summary.total,
        summary.skipped.len(),
        summary.notices.len()
    );
    Ok(())
}
