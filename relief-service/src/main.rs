//! Relief service - HTTP heightmap tiles from SRTMGL1 elevation data.
//!
//! ## Environment variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELIEF_PORT` | HTTP port | 8080 |
//! | `RELIEF_DEM_DIR` | Directory of unpacked `.hgt` rasters | `data/dem` |
//! | `RELIEF_TILE_DIR` | Rendered tile cache root | `data/tiles` |
//! | `RELIEF_COVERAGE_FILE` | Dataset coverage GeoJSON | `data/srtm_coverage.geojson` |
//! | `RELIEF_ARCHIVE_URL` | SRTMGL1 archive base URL | the USGS archive |
//! | `RELIEF_EARTHDATA_URL` | Earthdata login API base URL | `https://urs.earthdata.nasa.gov/api` |
//! | `RELIEF_EARTHDATA_USERNAME` | Earthdata account | unset, downloads disabled |
//! | `RELIEF_EARTHDATA_PASSWORD` | Earthdata password | unset, downloads disabled |
//! | `RELIEF_HTTP_TIMEOUT` | Archive request timeout, seconds | 60 |
//! | `RELIEF_CACHE_SIZE` | In-memory HGT tile cache capacity | 100 |
//! | `RELIEF_ALLOWED_ORIGINS` | CORS allow-list, comma separated | any origin |
//! | `RUST_LOG` | Log filter | `info` |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use relief::{
    CoverageIndex, DemStore, EarthdataApi, Generator, HgtDataset, HttpClient, ReqwestClient,
    TileCache,
};
use relief_service::{config::Config, handlers, router, AppState};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the relief service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relief Heightmap Service",
        description = "Heightmap tiles rendered from the SRTMGL1 elevation dataset.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    paths(
        handlers::get_tile,
        handlers::get_tile_at_resolution,
        handlers::get_heightmap,
        handlers::post_points,
        handlers::process_tiles,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(schemas(
        handlers::CoordinateDto,
        handlers::ErrorResponse,
        handlers::HealthResponse,
        handlers::StatsResponse,
    )),
    tags(
        (name = "tiles", description = "Slippy-map tile endpoints"),
        (name = "heightmaps", description = "Arbitrary-region heightmap endpoints"),
        (name = "system", description = "Health and statistics"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relief=info,relief_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let dataset = Arc::new(HgtDataset::new(&config.dem_dir, config.cache_size));
    let dem = build_dem_store(&config)?;

    tracing::info!(
        dem_dir = %config.dem_dir,
        tile_dir = %config.tile_dir,
        downloads_enabled = dem.is_some(),
        cache_size = config.cache_size,
        port = config.port,
        "starting relief service"
    );

    let generator = Arc::new(Generator::new(
        Arc::clone(&dataset),
        dem,
        TileCache::new(&config.tile_dir),
    ));

    let state = Arc::new(AppState { generator, dataset });

    let app = router(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(&config.allowed_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the archive-facing components, or none when credentials are
/// missing and the service can only render from local rasters.
fn build_dem_store(config: &Config) -> Result<Option<Arc<DemStore>>, Box<dyn std::error::Error>> {
    let (Some(username), Some(password)) = (
        config.earthdata_username.as_deref(),
        config.earthdata_password.as_deref(),
    ) else {
        tracing::warn!(
            "Earthdata credentials are not configured, elevation downloads are disabled"
        );
        return Ok(None);
    };

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::with_timeout(config.http_timeout)?);

    let credentials = EarthdataApi::new(
        config.earthdata_url.clone(),
        username,
        password,
        Arc::clone(&http),
    )
    .with_token_listing();

    Ok(Some(Arc::new(DemStore::new(
        config.dem_dir.clone(),
        config.archive_url.clone(),
        http,
        credentials,
        CoverageIndex::new(&config.coverage_file),
    ))))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        tracing::warn!("RELIEF_ALLOWED_ORIGINS is not set, accepting any origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
