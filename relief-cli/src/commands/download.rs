//! `relief download` - fetch the full elevation dataset.

use anyhow::{bail, Context, Result};

use crate::Cli;

pub fn run(cli: &Cli) -> Result<()> {
    let Some(store) = super::build_dem_store(cli)? else {
        bail!("Earthdata credentials are required to download the dataset");
    };

    store.ensure_all().context("dataset download failed")?;

    println!("elevation dataset is up to date in {}", cli.dem_dir.display());

    Ok(())
}
