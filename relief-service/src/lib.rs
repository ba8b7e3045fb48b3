//! Relief service library.
//!
//! HTTP handlers, router assembly, and environment configuration for the
//! heightmap tile service. The binary and the integration tests both build
//! the router from here.

pub mod config;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use relief::{Generator, HgtDataset};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
pub struct AppState {
    /// Heightmap pipeline root.
    pub generator: Arc<Generator>,
    /// Elevation dataset, exposed for cache statistics.
    pub dataset: Arc<HgtDataset>,
}

/// Assemble the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/heightmap", get(handlers::get_heightmap))
        .route("/heightmap/points", post(handlers::post_points))
        .route("/processTiles/{z}", post(handlers::process_tiles))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .route("/{z}/{x}/{y}", get(handlers::get_tile))
        .route("/{resolution}/{z}/{x}/{y}", get(handlers::get_tile_at_resolution))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
