//! HGT raster parsing and cached elevation lookups.
//!
//! An HGT file is a square grid of big-endian signed 16-bit samples
//! covering one degree of latitude and longitude. Row 0 is the north edge.
//! [`HgtTile`] memory-maps a single file; [`HgtDataset`] resolves arbitrary
//! coordinates to tiles in a directory, keeping recently used mappings in
//! an in-memory cache.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use memmap2::Mmap;
use moka::sync::Cache;

use crate::error::{Error, Result};
use crate::filename::hgt_filename;

/// One-arc-second raster: 3601 x 3601 samples, 25,934,402 bytes.
const SRTM1_SAMPLES: usize = 3601;
const SRTM1_SIZE: usize = SRTM1_SAMPLES * SRTM1_SAMPLES * 2;

/// Three-arc-second raster: 1201 x 1201 samples, 2,884,802 bytes.
const SRTM3_SAMPLES: usize = 1201;
const SRTM3_SIZE: usize = SRTM3_SAMPLES * SRTM3_SAMPLES * 2;

/// Sentinel sample meaning "no data".
pub const VOID_ELEVATION: i16 = -32768;

/// Default number of tiles kept mapped in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 100;

/// A memory-mapped HGT raster.
pub struct HgtTile {
    data: Mmap,
    samples: usize,
}

impl HgtTile {
    /// Map an HGT file. The grid size is detected from the file length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // SAFETY: the mapping is read-only and the store never rewrites an
        // unpacked raster in place.
        let data = unsafe { Mmap::map(&file)? };

        let samples = match data.len() {
            SRTM1_SIZE => SRTM1_SAMPLES,
            SRTM3_SIZE => SRTM3_SAMPLES,
            size => {
                return Err(Error::InvalidHgtSize {
                    path: path.to_path_buf(),
                    size,
                })
            }
        };

        Ok(Self { data, samples })
    }

    /// Samples per row and column (3601 or 1201).
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Elevation of the grid point nearest to the coordinate.
    ///
    /// Voids are returned as [`VOID_ELEVATION`], untranslated.
    pub fn elevation(&self, lat: f64, lon: f64) -> i16 {
        let lat_frac = lat - lat.floor();
        let lon_frac = lon - lon.floor();

        let span = (self.samples - 1) as f64;
        // Row 0 is the north edge, so the latitude fraction is inverted.
        let row = ((1.0 - lat_frac) * span).round() as usize;
        let col = (lon_frac * span).round() as usize;

        self.sample(row, col)
    }

    fn sample(&self, row: usize, col: usize) -> i16 {
        let row = row.min(self.samples - 1);
        let col = col.min(self.samples - 1);

        let offset = (row * self.samples + col) * 2;
        i16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }
}

/// Cache usage counters for a dataset.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Tiles currently mapped.
    pub entry_count: u64,
    /// Lookups served from the cache.
    pub hit_count: u64,
    /// Lookups that mapped a file.
    pub miss_count: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, 0.0 when idle.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Directory of unpacked HGT rasters with a bounded tile cache.
///
/// The dataset never downloads anything; it reads what is on disk and
/// reports a missing tile as `Ok(None)`. Pairing it with a
/// [`crate::dem::DemStore`] is the caller's concern.
pub struct HgtDataset {
    dir: PathBuf,
    tiles: Cache<(i32, i32), Arc<HgtTile>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl HgtDataset {
    /// Create a dataset over `dir` caching up to `cache_size` mapped tiles.
    pub fn new<P: AsRef<Path>>(dir: P, cache_size: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            tiles: Cache::builder().max_capacity(cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// Elevation at the coordinate, or `None` when the tile is not on disk.
    ///
    /// Void samples are passed through as raw [`VOID_ELEVATION`] values.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Result<Option<i16>> {
        let Some(tile) = self.tile_for(lat, lon)? else {
            return Ok(None);
        };

        Ok(Some(tile.elevation(lat, lon)))
    }

    /// The directory this dataset reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.tiles.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    fn tile_for(&self, lat: f64, lon: f64) -> Result<Option<Arc<HgtTile>>> {
        let key = (lat.floor() as i32, lon.floor() as i32);

        if let Some(tile) = self.tiles.get(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(tile));
        }

        let path = self.dir.join(hgt_filename(lat, lon));
        if !path.exists() {
            return Ok(None);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let tile = Arc::new(HgtTile::open(&path)?);
        self.tiles.insert(key, Arc::clone(&tile));

        Ok(Some(tile))
    }
}
