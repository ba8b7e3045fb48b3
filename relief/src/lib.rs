//! # relief - real-world heightmap generation
//!
//! Library behind the relief tile server: it turns a geographic query into
//! a PNG heightmap backed by the SRTMGL1 one-arc-second elevation dataset,
//! fetching the underlying HGT rasters from the authenticated archive on
//! demand.
//!
//! ## Pipeline
//!
//! A tile request flows through the components in this order:
//!
//! 1. [`cache::TileCache`] answers from disk when the tile was rendered
//!    before.
//! 2. [`slippy`] maps the tile id to its north-west corner and edge length.
//! 3. [`grid::GridSampler`] walks the square on the WGS84 ellipsoid in
//!    30 m steps; for every cell [`dem::DemStore`] guarantees the HGT
//!    raster is on disk (checking [`coverage::CoverageIndex`] first and
//!    authenticating through [`earthdata::EarthdataApi`]) and
//!    [`hgt::HgtDataset`] reads the elevation.
//! 4. [`render`] colors the samples with a fixed turbo gradient and
//!    encodes the PNG.
//! 5. [`generator::Generator`] ties it together and writes fresh tiles
//!    back to the cache from a detached thread.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use relief::{Generator, HgtDataset, TileCache};
//!
//! // Render from already-downloaded rasters, without archive access.
//! let dataset = Arc::new(HgtDataset::new("data/dem", 100));
//! let generator = Generator::new(dataset, None, TileCache::new("data/tiles"));
//!
//! let png = generator.tile_heightmap(14, 12140, 6867, 256)?;
//! ```

pub mod cache;
pub mod coverage;
pub mod dem;
pub mod earthdata;
pub mod error;
pub mod filename;
pub mod grid;
pub mod hgt;
pub mod http;
pub mod render;
pub mod slippy;

mod generator;

pub use cache::TileCache;
pub use coverage::CoverageIndex;
pub use dem::DemStore;
pub use earthdata::{BearerToken, EarthdataApi};
pub use error::{Error, Result};
pub use generator::{Generator, PointElevation};
pub use grid::{GridSampler, SamplePoint, SAMPLE_SPACING_M};
pub use hgt::{CacheStats, HgtDataset, HgtTile, VOID_ELEVATION};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use render::ResolutionConfig;
