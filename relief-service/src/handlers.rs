//! HTTP request handlers for the heightmap service.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use relief::{PointElevation, ResolutionConfig};

use crate::AppState;

/// Default tile and heightmap edge length in pixels.
const DEFAULT_RESOLUTION: u32 = 256;

/// Upper bound accepted for the `resolution` parameter.
const MAX_RESOLUTION: u32 = 2048;

/// Default square side in meters.
const DEFAULT_SIDE_M: f64 = 10_000.0;

/// Requests above this side length fall back to the default.
const MAX_SIDE_M: f64 = 50_000.0;

/// Query parameters for the square heightmap endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct HeightmapQuery {
    /// Latitude of the north-west corner in decimal degrees.
    #[param(example = 27.687397)]
    pub lat: f64,
    /// Longitude of the north-west corner in decimal degrees.
    #[param(example = 86.731814)]
    pub lon: f64,
    /// Square side in meters. Defaults to 10 km, capped at 50 km.
    pub side: Option<f64>,
    /// Output resolution in pixels, at most 2048. Defaults to 256.
    pub resolution: Option<u32>,
}

/// A coordinate in a batch elevation request. The response echoes the
/// array with `elevation` filled in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"latitude": 27.9881, "longitude": 86.925, "elevation": 8810}))]
pub struct CoordinateDto {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters. Ignored on input.
    #[serde(default)]
    pub elevation: i16,
}

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"error": "invalid tile coordinates"}))]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Elevation dataset cache statistics.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub cached_tiles: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
}

/// Tile heightmap at the default resolution.
///
/// The trailing path segment is `{y}.png`; anything else is a 400.
#[utoipa::path(
    get,
    path = "/{z}/{x}/{y}.png",
    params(
        ("z" = u32, Path, description = "Zoom level"),
        ("x" = u32, Path, description = "Tile column"),
        ("y" = u32, Path, description = "Tile row"),
    ),
    responses(
        (status = 200, description = "PNG heightmap", content_type = "image/png"),
        (status = 400, description = "Bad coordinates or generation failure", body = ErrorResponse),
    ),
    tag = "tiles"
)]
pub async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Response {
    serve_tile(state, &z, &x, &y, None).await
}

/// Tile heightmap at an explicit resolution.
#[utoipa::path(
    get,
    path = "/{resolution}/{z}/{x}/{y}.png",
    params(
        ("resolution" = u32, Path, description = "Edge length in pixels, at most 2048"),
        ("z" = u32, Path, description = "Zoom level"),
        ("x" = u32, Path, description = "Tile column"),
        ("y" = u32, Path, description = "Tile row"),
    ),
    responses(
        (status = 200, description = "PNG heightmap", content_type = "image/png"),
        (status = 400, description = "Bad coordinates or generation failure", body = ErrorResponse),
    ),
    tag = "tiles"
)]
pub async fn get_tile_at_resolution(
    State(state): State<Arc<AppState>>,
    Path((resolution, z, x, y)): Path<(String, String, String, String)>,
) -> Response {
    serve_tile(state, &z, &x, &y, Some(&resolution)).await
}

async fn serve_tile(
    state: Arc<AppState>,
    z: &str,
    x: &str,
    y: &str,
    resolution: Option<&str>,
) -> Response {
    let Some((z, x, y)) = parse_tile_coordinates(z, x, y) else {
        return bad_request("invalid tile coordinates".to_string());
    };
    let resolution = parse_resolution(resolution);

    tracing::debug!(z, x, y, resolution, "tile request");

    let generator = Arc::clone(&state.generator);
    let result =
        tokio::task::spawn_blocking(move || generator.tile_heightmap(z, x, y, resolution)).await;

    match result {
        Ok(Ok(bytes)) => png_response(bytes, &format!("{y}.png")),
        Ok(Err(e)) => {
            tracing::warn!(z, x, y, error = %e, "cannot generate tile heightmap");
            bad_request(format!("cannot generate heightmap: {e}"))
        }
        Err(e) => {
            tracing::error!(error = %e, "tile generation task failed");
            internal_error()
        }
    }
}

/// Heightmap of an arbitrary square region.
#[utoipa::path(
    get,
    path = "/heightmap",
    params(HeightmapQuery),
    responses(
        (status = 200, description = "PNG heightmap", content_type = "image/png"),
        (status = 400, description = "Bad coordinates or generation failure", body = ErrorResponse),
    ),
    tag = "heightmaps"
)]
pub async fn get_heightmap(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HeightmapQuery>,
) -> Response {
    let side = match query.side {
        Some(side) if side > 0.0 && side <= MAX_SIDE_M => side,
        _ => DEFAULT_SIDE_M,
    };
    let resolution = clamp_resolution(query.resolution);

    tracing::debug!(
        lat = query.lat,
        lon = query.lon,
        side,
        resolution,
        "square heightmap request"
    );

    let generator = Arc::clone(&state.generator);
    let config = ResolutionConfig::square(resolution);
    let result = tokio::task::spawn_blocking(move || {
        generator.heightmap_image(query.lat, query.lon, side, &config)
    })
    .await;

    match result {
        Ok(Ok(bytes)) => png_response(bytes, "heightmap.png"),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "cannot generate heightmap");
            bad_request(format!("cannot generate heightmap: {e}"))
        }
        Err(e) => {
            tracing::error!(error = %e, "heightmap task failed");
            internal_error()
        }
    }
}

/// Elevation lookup for a batch of coordinates.
#[utoipa::path(
    post,
    path = "/heightmap/points",
    request_body = Vec<CoordinateDto>,
    responses(
        (status = 200, description = "The input points with elevations filled in", body = Vec<CoordinateDto>),
        (status = 400, description = "Malformed body", body = ErrorResponse),
    ),
    tag = "heightmaps"
)]
pub async fn post_points(
    State(state): State<Arc<AppState>>,
    Json(coordinates): Json<Vec<CoordinateDto>>,
) -> Response {
    let mut points: Vec<PointElevation> = coordinates
        .iter()
        .map(|c| PointElevation {
            lat: c.latitude,
            lon: c.longitude,
            elevation: 0,
        })
        .collect();

    let generator = Arc::clone(&state.generator);
    let result = tokio::task::spawn_blocking(move || {
        generator.point_elevations(&mut points);
        points
    })
    .await;

    match result {
        Ok(points) => {
            let response: Vec<CoordinateDto> = points
                .into_iter()
                .map(|p| CoordinateDto {
                    latitude: p.lat,
                    longitude: p.lon,
                    elevation: p.elevation,
                })
                .collect();
            Json(response).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "point elevation task failed");
            internal_error()
        }
    }
}

/// Kick off bulk tile generation for a zoom level.
///
/// The sweep runs on a detached worker; the request returns immediately.
#[utoipa::path(
    post,
    path = "/processTiles/{z}",
    params(("z" = u32, Path, description = "Zoom level to enumerate")),
    responses(
        (status = 202, description = "Generation started"),
        (status = 400, description = "Invalid zoom level", body = ErrorResponse),
    ),
    tag = "tiles"
)]
pub async fn process_tiles(
    State(state): State<Arc<AppState>>,
    Path(z): Path<String>,
) -> Response {
    let Ok(z) = z.parse::<u32>() else {
        return bad_request("invalid zoom level".to_string());
    };

    let generator = Arc::clone(&state.generator);
    // Detached: the response does not wait for the sweep.
    let _ = tokio::task::spawn_blocking(move || {
        if let Err(e) = generator.generate_zoom_level(z) {
            tracing::error!(zoom = z, error = %e, "bulk tile generation failed");
        }
    });

    StatusCode::ACCEPTED.into_response()
}

/// Service liveness and version.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Elevation dataset cache statistics.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Cache statistics", body = StatsResponse)),
    tag = "system"
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.dataset.cache_stats();

    Json(StatsResponse {
        cached_tiles: stats.entry_count,
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        hit_rate: stats.hit_rate(),
    })
}

/// Parse `z/x/y` with the mandatory `.png` suffix on `y`. All three must
/// be non-negative integers.
fn parse_tile_coordinates(z: &str, x: &str, y: &str) -> Option<(u32, u32, u32)> {
    let y = y.strip_suffix(".png")?;

    let z = z.parse::<u32>().ok()?;
    let x = x.parse::<u32>().ok()?;
    let y = y.parse::<u32>().ok()?;

    Some((z, x, y))
}

/// Lenient resolution parsing: anything unusable becomes the default.
fn parse_resolution(raw: Option<&str>) -> u32 {
    clamp_resolution(raw.and_then(|r| r.parse::<u32>().ok()))
}

fn clamp_resolution(resolution: Option<u32>) -> u32 {
    match resolution {
        Some(r) if r > 0 && r <= MAX_RESOLUTION => r,
        _ => DEFAULT_RESOLUTION,
    }
}

fn png_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal error".to_string(),
        }),
    )
        .into_response()
}
