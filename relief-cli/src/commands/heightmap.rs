//! `relief heightmap` - render one square region to a PNG file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use relief::{Generator, HgtDataset, ResolutionConfig, TileCache};

use crate::Cli;

#[allow(clippy::too_many_arguments)]
pub fn run(
    cli: &Cli,
    latitude: f64,
    longitude: f64,
    side: f64,
    resolution: u32,
    interpolate: bool,
    output: &Path,
) -> Result<()> {
    let dataset = Arc::new(HgtDataset::new(&cli.dem_dir, relief::hgt::DEFAULT_CACHE_SIZE));
    let dem = super::build_dem_store(cli)?;

    let generator = Generator::new(dataset, dem, TileCache::new("."));

    let config = ResolutionConfig {
        width: resolution,
        height: resolution,
        force_interpolation: interpolate,
        ignore_when_smaller: false,
    };

    let bytes = generator
        .heightmap_image(latitude, longitude, side, &config)
        .context("cannot render heightmap")?;

    std::fs::write(output, &bytes)
        .with_context(|| format!("cannot write {}", output.display()))?;

    println!("wrote {} ({} bytes)", output.display(), bytes.len());

    Ok(())
}
