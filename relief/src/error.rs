//! Error types for the relief library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the elevation pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The point lies outside the land area covered by the elevation dataset.
    #[error("point ({lat}, {lon}) is outside the elevation dataset coverage")]
    NotCovered { lat: f64, lon: f64 },

    /// The remote archive answered 404 for this file. Remembered for the
    /// lifetime of the process.
    #[error("elevation file {filename} does not exist on the remote archive")]
    NonExistentDemFile { filename: String },

    /// Credential endpoint rejected the request.
    #[error("received status {status} from the credential endpoint")]
    Auth { status: u16 },

    /// Network-level failure before any HTTP status was obtained.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The remote archive answered with an unexpected status.
    #[error("received status {status} while fetching {filename}")]
    Remote { filename: String, status: u16 },

    /// A response body could not be parsed.
    #[error("cannot decode response: {reason}")]
    Decode { reason: String },

    /// The downloaded archive produced no files.
    #[error("archive {path} contains no usable entries")]
    Corrupt { path: PathBuf },

    /// A downloaded archive could not be read.
    #[error("cannot unzip {path}: {reason}")]
    Unzip { path: PathBuf, reason: String },

    /// PNG encoding or another image operation failed.
    #[error("cannot encode heightmap image: {0}")]
    Encode(#[from] image::ImageError),

    /// The requested resample target is unusable.
    #[error("cannot resize heightmap image to {width}x{height}")]
    Resize { width: u32, height: u32 },

    /// Tile cache miss. Internal to the tile generator.
    #[error("tile ({z}, {x}, {y}) at resolution {resolution} is not cached")]
    TileNotCached {
        z: u32,
        x: u32,
        y: u32,
        resolution: u32,
    },

    /// The coverage GeoJSON could not be read or parsed.
    #[error("cannot load coverage index {path}: {reason}")]
    CoverageUnavailable { path: PathBuf, reason: String },

    /// An HGT file has a size matching neither raster layout.
    #[error("invalid HGT file size: {size} bytes in {path}")]
    InvalidHgtSize { path: PathBuf, size: usize },

    /// Missing or inconsistent component configuration.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
