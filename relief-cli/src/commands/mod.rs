pub mod download;
pub mod heightmap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relief::{CoverageIndex, DemStore, EarthdataApi, HttpClient, ReqwestClient};

use crate::Cli;

/// Build the archive-facing store from the global flags, or `None` when
/// credentials are missing.
pub fn build_dem_store(cli: &Cli) -> Result<Option<Arc<DemStore>>> {
    let (Some(user), Some(password)) = (&cli.earthdata_user, &cli.earthdata_password) else {
        tracing::warn!("Earthdata credentials are not configured, downloads are disabled");
        return Ok(None);
    };

    let http: Arc<dyn HttpClient> =
        Arc::new(ReqwestClient::with_timeout(Duration::from_secs(cli.http_timeout))
            .context("cannot build HTTP client")?);

    let credentials = EarthdataApi::new(
        cli.earthdata_url.clone(),
        user.clone(),
        password.clone(),
        Arc::clone(&http),
    )
    .with_token_listing();

    Ok(Some(Arc::new(DemStore::new(
        cli.dem_dir.clone(),
        cli.archive_url.clone(),
        http,
        credentials,
        CoverageIndex::new(&cli.coverage_file),
    ))))
}
