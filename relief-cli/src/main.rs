//! Relief command line tool.
//!
//! Renders real-world heightmaps from the SRTMGL1 elevation dataset and
//! manages the local copy of it.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Real-world heightmaps from SRTM elevation data.
#[derive(Parser)]
#[command(name = "relief")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dotenv file to load before reading the environment.
    #[arg(long, global = true)]
    env: Option<PathBuf>,

    /// Directory holding unpacked .hgt rasters.
    #[arg(long, env = "RELIEF_DEM_DIR", default_value = "data/dem", global = true)]
    dem_dir: PathBuf,

    /// Dataset coverage GeoJSON file.
    #[arg(
        long,
        env = "RELIEF_COVERAGE_FILE",
        default_value = "data/srtm_coverage.geojson",
        global = true
    )]
    coverage_file: PathBuf,

    /// SRTMGL1 archive base URL.
    #[arg(
        long,
        env = "RELIEF_ARCHIVE_URL",
        default_value = "https://e4ftl01.cr.usgs.gov/MEASURES/SRTMGL1.003/2000.02.11",
        global = true
    )]
    archive_url: String,

    /// Earthdata login API base URL.
    #[arg(
        long,
        env = "RELIEF_EARTHDATA_URL",
        default_value = "https://urs.earthdata.nasa.gov/api",
        global = true
    )]
    earthdata_url: String,

    /// Earthdata account name. Downloads are disabled without it.
    #[arg(long, env = "RELIEF_EARTHDATA_USERNAME", global = true)]
    earthdata_user: Option<String>,

    /// Earthdata account password.
    #[arg(long, env = "RELIEF_EARTHDATA_PASSWORD", global = true)]
    earthdata_password: Option<String>,

    /// Archive request timeout in seconds.
    #[arg(long, env = "RELIEF_HTTP_TIMEOUT", default_value = "60", global = true)]
    http_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a square heightmap anchored at a coordinate.
    Heightmap {
        /// Latitude of the north-west corner in decimal degrees.
        #[arg(long)]
        latitude: f64,

        /// Longitude of the north-west corner in decimal degrees.
        #[arg(long)]
        longitude: f64,

        /// Side of the square in meters.
        #[arg(long, default_value = "1000")]
        side: f64,

        /// Output resolution in pixels.
        #[arg(long, default_value = "256")]
        resolution: u32,

        /// Resize even when the sampled image is smaller than the
        /// requested resolution.
        #[arg(long)]
        interpolate: bool,

        /// PNG output path.
        #[arg(short, long, default_value = "heightmap.png")]
        output: PathBuf,
    },

    /// Download the full elevation dataset named by the coverage index.
    Download,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Flags fall back to environment variables at parse time, so after
    // loading a dotenv file the arguments are resolved again.
    if let Some(path) = &cli.env {
        dotenvy::from_path(path)?;
        cli = Cli::parse();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relief=info".into()),
        )
        .init();

    match &cli.command {
        Commands::Heightmap {
            latitude,
            longitude,
            side,
            resolution,
            interpolate,
            output,
        } => commands::heightmap::run(
            &cli,
            *latitude,
            *longitude,
            *side,
            *resolution,
            *interpolate,
            output,
        ),
        Commands::Download => commands::download::run(&cli),
    }
}
