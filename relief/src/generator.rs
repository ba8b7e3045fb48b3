//! Tile generation.
//!
//! [`Generator`] is the root of the pipeline: it answers tile and square
//! heightmap requests by composing the DEM store, the elevation dataset,
//! the grid sampler, the rasterizer, and the disk tile cache, and it
//! drives the bulk zoom-level sweep.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::cache::TileCache;
use crate::dem::DemStore;
use crate::error::{Error, Result};
use crate::grid::GridSampler;
use crate::hgt::HgtDataset;
use crate::render::{render_heightmap, ResolutionConfig};
use crate::slippy;

/// Worker count for the bulk zoom-level sweep.
const BULK_WORKERS: usize = 100;

/// Pixel resolution used by the bulk sweep.
const BULK_RESOLUTION: u32 = 256;

/// A coordinate paired with its elevation, for batch lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointElevation {
    pub lat: f64,
    pub lon: f64,
    /// Raw dataset sample; 0 when the tile is unavailable.
    pub elevation: i16,
}

/// Produces heightmap PNGs for slippy-map tiles and arbitrary squares.
pub struct Generator {
    dataset: Arc<HgtDataset>,
    dem: Option<Arc<DemStore>>,
    sampler: GridSampler,
    tiles: TileCache,
}

impl Generator {
    /// Build a generator. Without a [`DemStore`] the generator renders
    /// from whatever rasters are already on disk.
    pub fn new(dataset: Arc<HgtDataset>, dem: Option<Arc<DemStore>>, tiles: TileCache) -> Self {
        let sampler = GridSampler::new(Arc::clone(&dataset), dem.clone());

        Self {
            dataset,
            dem,
            sampler,
            tiles,
        }
    }

    /// Heightmap for one slippy-map tile at the given pixel resolution.
    ///
    /// Served from the disk cache when possible. On a miss the tile is
    /// rendered, returned, and persisted from a detached thread so the
    /// caller never waits on the write.
    pub fn tile_heightmap(&self, z: u32, x: u32, y: u32, resolution: u32) -> Result<Vec<u8>> {
        if let Ok(bytes) = self.tiles.read(resolution, z, x, y) {
            return Ok(bytes);
        }

        let (lat, lon) = slippy::num2deg(z, x, y);
        let side = slippy::tile_side_meters(z);

        let config = ResolutionConfig {
            width: resolution,
            height: resolution,
            force_interpolation: true,
            ignore_when_smaller: false,
        };
        let bytes = self.heightmap_image(lat, lon, side, &config)?;

        let cache = self.tiles.clone();
        let persisted = bytes.clone();
        std::thread::spawn(move || {
            if let Err(e) = cache.write(resolution, z, x, y, &persisted) {
                tracing::error!(z, x, y, resolution, error = %e, "cannot save tile to disk");
            }
        });

        Ok(bytes)
    }

    /// Render the square anchored north-west at `(lat, lon)`.
    pub fn heightmap_image(
        &self,
        lat: f64,
        lon: f64,
        side_meters: f64,
        config: &ResolutionConfig,
    ) -> Result<Vec<u8>> {
        render_heightmap(&self.sampler, lat, lon, side_meters, config)
    }

    /// Fill in the elevation of each point.
    ///
    /// Rasters are fetched on demand when a DEM store is attached; fetch
    /// failures are logged and leave the elevation at 0 rather than
    /// failing the whole batch.
    pub fn point_elevations(&self, points: &mut [PointElevation]) {
        for point in points.iter_mut() {
            if let Some(dem) = &self.dem {
                if let Err(e) = dem.ensure(point.lat, point.lon) {
                    tracing::warn!(
                        lat = point.lat,
                        lon = point.lon,
                        error = %e,
                        "cannot fetch elevation file for point"
                    );
                }
            }

            point.elevation = self
                .dataset
                .elevation_at(point.lat, point.lon)
                .ok()
                .flatten()
                .unwrap_or(0);
        }
    }

    /// Render and cache every tile of a zoom level at 256 px, using a
    /// bounded worker pool. Failures are logged and skipped; there are no
    /// retries.
    pub fn generate_zoom_level(&self, z: u32) -> Result<()> {
        let per_side = slippy::tiles_per_side(z) as u64;
        let total = per_side * per_side;

        tracing::info!(zoom = z, tiles = total, "generating all tiles in zoom level");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(BULK_WORKERS)
            .build()
            .map_err(|e| Error::Config {
                reason: format!("cannot build tile worker pool: {e}"),
            })?;

        pool.install(|| {
            (0..total).into_par_iter().for_each(|i| {
                let x = (i / per_side) as u32;
                let y = (i % per_side) as u32;

                let start = Instant::now();

                match self.tile_heightmap(z, x, y, BULK_RESOLUTION) {
                    Ok(_) => {
                        tracing::info!(
                            zoom = z,
                            x,
                            y,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "tile generated"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(zoom = z, x, y, error = %e, "cannot generate tile");
                    }
                }
            });
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hgt::tests::write_test_tile;
    use crate::hgt::VOID_ELEVATION;
    use image::GenericImageView;
    use tempfile::TempDir;

    fn generator_over(dem_dir: &TempDir, tile_dir: &TempDir) -> Generator {
        Generator::new(
            Arc::new(HgtDataset::new(dem_dir.path(), 10)),
            None,
            TileCache::new(tile_dir.path()),
        )
    }

    #[test]
    fn test_tile_heightmap_has_requested_resolution() {
        let dem_dir = TempDir::new().unwrap();
        let tile_dir = TempDir::new().unwrap();
        let generator = generator_over(&dem_dir, &tile_dir);

        // Zoom 15 keeps the sampled grid small (about 41 cells per side).
        let bytes = generator.tile_heightmap(15, 0, 0, 256).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (256, 256));
    }

    #[test]
    fn test_tile_is_persisted_and_served_from_disk() {
        let dem_dir = TempDir::new().unwrap();
        let tile_dir = TempDir::new().unwrap();
        let generator = generator_over(&dem_dir, &tile_dir);

        let rendered = generator.tile_heightmap(15, 100, 200, 64).unwrap();

        // The write happens on a detached thread.
        let path = tile_dir.path().join("64/15/100/200.png");
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(path.exists());

        let cached = generator.tile_heightmap(15, 100, 200, 64).unwrap();
        assert_eq!(rendered, cached);
    }

    #[test]
    fn test_tile_generation_is_deterministic() {
        let dem_dir = TempDir::new().unwrap();
        write_test_tile(dem_dir.path(), "N27E086.hgt", &[(600, 600, 3000)]);

        let tile_a = TempDir::new().unwrap();
        let tile_b = TempDir::new().unwrap();

        let (x, y) = slippy::deg2num(27.5, 86.5, 15);

        let first = generator_over(&dem_dir, &tile_a)
            .tile_heightmap(15, x, y, 128)
            .unwrap();
        let second = generator_over(&dem_dir, &tile_b)
            .tile_heightmap(15, x, y, 128)
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_point_elevations() {
        let dem_dir = TempDir::new().unwrap();
        write_test_tile(
            dem_dir.path(),
            "N27E086.hgt",
            &[(600, 600, 1500), (0, 0, VOID_ELEVATION)],
        );
        let tile_dir = TempDir::new().unwrap();
        let generator = generator_over(&dem_dir, &tile_dir);

        let mut points = vec![
            PointElevation {
                lat: 27.5,
                lon: 86.5,
                elevation: 0,
            },
            // Void sample at the north-west corner of the raster.
            PointElevation {
                lat: 27.99999,
                lon: 86.00001,
                elevation: 0,
            },
            // No raster on disk for this cell.
            PointElevation {
                lat: 50.5,
                lon: 50.5,
                elevation: 0,
            },
        ];

        generator.point_elevations(&mut points);

        assert_eq!(points[0].elevation, 1500);
        // Raw void is preserved for direct point queries.
        assert_eq!(points[1].elevation, VOID_ELEVATION);
        assert_eq!(points[2].elevation, 0);
    }
}
