use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use midway_common::{Config, MidwayError, SourceDescriptor};
use midway_engine::center::SphericalMedian;
use midway_engine::listing::RenderedListFetcher;
use midway_engine::pipeline::{PipelineController, PipelineOptions};

#[derive(Parser, Debug)]
#[command(
    name = "midway",
    about = "Harvest shared place lists and compute a robust meeting point",
    version
)]
struct Cli {
    /// JSON file with the list sources to harvest.
    #[arg(long, default_value = "sources.json")]
    sources: PathBuf,

    /// Path of the persistent place registry.
    #[arg(long, default_value = "registry.json")]
    registry: PathBuf,

    /// Where to write the computed meeting point.
    #[arg(long, default_value = "meeting_point.json")]
    output: PathBuf,

    /// Maximum concurrent list fetches.
    #[arg(long, default_value_t = 4)]
    fetch_concurrency: usize,

    /// Maximum concurrent geocoding lookups.
    #[arg(long, default_value_t = 10)]
    geocode_concurrency: usize,

    /// Fetch attempts per source before degrading to an empty batch.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Region appended to forward-geocoding queries, e.g. "Berlin".
    #[arg(long, default_value = "")]
    region_hint: String,

    /// Leave permanently closed places out of the center computation.
    #[arg(long)]
    exclude_closed: bool,
}

fn load_sources(path: &PathBuf) -> Result<Vec<SourceDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| MidwayError::Config(format!("read {}: {e}", path.display())))?;
    let sources: Vec<SourceDescriptor> = serde_json::from_str(&raw)
        .map_err(|e| MidwayError::Config(format!("parse {}: {e}", path.display())))?;
    if sources.is_empty() {
        return Err(MidwayError::Config(format!("{} lists no sources", path.display())).into());
    }
    Ok(sources)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("midway_engine=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let sources = load_sources(&cli.sources)?;
    info!(sources = sources.len(), "Starting harvest");

    let fetcher = RenderedListFetcher::new(&config.browserless_url, config.browserless_token)
        .context("building list fetcher")?;
    let geocoder =
        geocode_client::GeocodeClient::new(&config.geocode_base_url, &config.geocode_user_agent);
    let solver = SphericalMedian;

    let controller = PipelineController::new(
        &fetcher,
        &geocoder,
        &solver,
        PipelineOptions {
            sources,
            registry_path: cli.registry,
            output_path: cli.output,
            fetch_concurrency: cli.fetch_concurrency,
            geocode_concurrency: cli.geocode_concurrency,
            max_attempts: cli.max_attempts,
            region_hint: cli.region_hint,
            exclude_closed: cli.exclude_closed,
        },
    );

    let point = controller.run().await?;
    info!(
        lat = point.lat,
        lng = point.lng,
        address = point.address.as_str(),
        "Meeting point ready"
    );
    Ok(())
}
