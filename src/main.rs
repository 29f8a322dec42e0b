use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use uuid::Uuid;

use flightmap::cache::TileCache;
use flightmap::{BoundingBox, FailurePolicy, Overlay, RenderConfig, RenderRequest, Renderer, Track};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the tile cache directory
    #[arg(short, long, default_value = ".cache")]
    cache_dir: PathBuf,

    /// Path to the output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// JSON file with render settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tile server URL template with {z}, {x} and {y} placeholders
    #[arg(long)]
    tile_url: Option<String>,

    /// Paint blank tiles instead of failing when downloads fail
    #[arg(long)]
    blank_missing: bool,

    /// Download tiles again even if they are cached
    #[arg(long)]
    refresh: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a bounding box, marking its two corners
    Bbox {
        #[arg(long, allow_negative_numbers = true)]
        min_lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        min_lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        max_lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        max_lat: f64,

        /// Prefix of the output file names
        #[arg(short, long)]
        prefix: String,
    },

    /// Render a flight track from a JSON file
    Track {
        /// Path to the track file
        #[arg(short, long)]
        input: PathBuf,

        /// Prefix of the output file names, defaults to the track id
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Clear the tile cache
    ClearCache,
}

fn load_config(cli: &Cli) -> Result<RenderConfig> {
    let mut config = match &cli.config {
        Some(path) => RenderConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RenderConfig::default(),
    };

    if let Some(url) = &cli.tile_url {
        config.fetch.url_template = url.clone();
    }
    if cli.blank_missing {
        config.failure_policy = FailurePolicy::BlankTile;
    }
    if cli.refresh {
        config.fetch.refresh = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let request = match &cli.command {
        Commands::Bbox { min_lon, min_lat, max_lon, max_lat, prefix } => {
            let bbox = BoundingBox::new(*min_lon, *min_lat, *max_lon, *max_lat)
                .context("Invalid bounding box")?;
            RenderRequest {
                prefix: prefix.clone(),
                overlay: Overlay::Corners(bbox),
                bbox: None,
            }
        }

        Commands::Track { input, prefix } => {
            info!("Loading track from {}", input.display());
            let track = Track::load(input).context("Failed to load track")?;
            let prefix = prefix
                .clone()
                .or(track.id)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            RenderRequest {
                prefix,
                overlay: Overlay::Path(track.path),
                bbox: track.bbox,
            }
        }

        Commands::ClearCache => {
            info!("Clearing cache");
            let cache = TileCache::new(&cli.cache_dir, &config.fetch.url_template)
                .context("Failed to open cache")?;
            cache.clear().context("Failed to clear cache")?;
            info!("Cache cleared");
            return Ok(());
        }
    };

    let renderer = Renderer::http(config, &cli.cache_dir, &cli.output_dir)
        .context("Failed to set up renderer")?;
    let output = renderer
        .render(request)
        .context("Failed to render map")?;

    info!(
        "Rendered {} tiles at zoom {} from root {}/{}/{}",
        renderer.config().tile_count(),
        output.tile_zoom,
        output.root.zoom,
        output.root.x,
        output.root.y
    );
    if output.blank_tiles > 0 {
        info!("{} tiles were left blank", output.blank_tiles);
    }
    info!("Done");

    Ok(())
}
