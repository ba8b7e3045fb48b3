//! Disk-backed tile cache.
//!
//! Rendered tiles live at `{root}/{resolution}/{z}/{x}/{y}.png`. A file's
//! existence is the only metadata, and entries are immutable once written.

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Two-level disk index of rendered PNG tiles.
#[derive(Clone)]
pub struct TileCache {
    root: PathBuf,
}

impl TileCache {
    /// Create a cache rooted at `root`. Directories are created on first
    /// write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read a cached tile, failing with [`Error::TileNotCached`] when the
    /// file does not exist.
    pub fn read(&self, resolution: u32, z: u32, x: u32, y: u32) -> Result<Vec<u8>> {
        let path = self.tile_path(resolution, z, x, y);

        if !path.exists() {
            return Err(Error::TileNotCached { z, x, y, resolution });
        }

        Ok(fs::read(path)?)
    }

    /// Write a tile unless it already exists. Entries are immutable, so a
    /// second write to the same coordinates is a no-op.
    ///
    /// The bytes go to a sibling temp file first and are renamed into
    /// place. Racing writers produce identical bytes for a given key, so
    /// the last rename winning is harmless.
    pub fn write(&self, resolution: u32, z: u32, x: u32, y: u32, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.tile_path(resolution, z, x, y);

        if path.exists() {
            return Ok(path);
        }

        let dir = self.tile_dir(resolution, z, x);
        fs::create_dir_all(&dir)?;

        let staging = dir.join(format!("{y}.png.tmp"));
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &path)?;

        Ok(path)
    }

    fn tile_dir(&self, resolution: u32, z: u32, x: u32) -> PathBuf {
        self.root
            .join(resolution.to_string())
            .join(z.to_string())
            .join(x.to_string())
    }

    fn tile_path(&self, resolution: u32, z: u32, x: u32, y: u32) -> PathBuf {
        self.tile_dir(resolution, z, x).join(format!("{y}.png"))
    }
}
