//! Geodesic sampling grid.
//!
//! A heightmap is sampled on a square grid anchored at its north-west
//! corner. Rows advance south and columns advance east in fixed 30 m
//! steps, each destination computed with the WGS84 direct problem rather
//! than by adding degree offsets, so the spacing stays metric at any
//! latitude.

use std::sync::Arc;

use geographiclib_rs::{DirectGeodesic, Geodesic};

use crate::dem::DemStore;
use crate::error::{Error, Result};
use crate::hgt::HgtDataset;

/// Grid spacing in meters, matching the one-arc-second dataset resolution.
pub const SAMPLE_SPACING_M: f64 = 30.0;

const SOUTH_AZIMUTH: f64 = 180.0;
const EAST_AZIMUTH: f64 = 90.0;

/// One sampled grid cell.
///
/// `x` is the column index counted eastward, `y` the row index counted
/// southward; both map one-to-one onto heightmap pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: u32,
    pub y: u32,
    pub lat: f64,
    pub lon: f64,
    /// Raw elevation sample. Voids are not translated here.
    pub elevation: i16,
}

/// Walks a square region of the ellipsoid and reads an elevation per cell.
pub struct GridSampler {
    geodesic: Geodesic,
    dataset: Arc<HgtDataset>,
    dem: Option<Arc<DemStore>>,
}

impl GridSampler {
    /// Create a sampler over the given dataset. With a [`DemStore`]
    /// attached, missing rasters are fetched on demand; without one, the
    /// sampler reads whatever is already on disk.
    pub fn new(dataset: Arc<HgtDataset>, dem: Option<Arc<DemStore>>) -> Self {
        Self {
            geodesic: Geodesic::wgs84(),
            dataset,
            dem,
        }
    }

    /// Number of cells per side for a region of the given extent.
    pub fn steps(side_meters: f64) -> u32 {
        (side_meters / SAMPLE_SPACING_M).ceil() as u32
    }

    /// Sample a `side_meters` x `side_meters` square whose north-west
    /// corner is `(lat, lon)`, invoking `visit` once per cell.
    ///
    /// Cells are visited row-major: each row is walked fully eastward
    /// before stepping south to the next. `visit` also receives a running
    /// cell index. Cells outside the dataset coverage are skipped without
    /// being visited; any other acquisition failure aborts the walk. A
    /// failing visitor is logged and does not abort.
    pub fn sample<F>(&self, lat: f64, lon: f64, side_meters: f64, mut visit: F) -> Result<()>
    where
        F: FnMut(&SamplePoint, usize) -> Result<()>,
    {
        let steps = Self::steps(side_meters);
        let mut index = 0usize;

        for row in 0..steps {
            let southing = f64::from(row) * SAMPLE_SPACING_M;
            let (row_lat, row_lon): (f64, f64) =
                self.geodesic.direct(lat, lon, SOUTH_AZIMUTH, southing);

            for col in 0..steps {
                let easting = f64::from(col) * SAMPLE_SPACING_M;
                let (p_lat, p_lon): (f64, f64) =
                    self.geodesic
                        .direct(row_lat, row_lon, EAST_AZIMUTH, easting);

                if let Some(dem) = &self.dem {
                    match dem.ensure(p_lat, p_lon) {
                        Ok(_) => {}
                        Err(Error::NotCovered { .. }) => continue,
                        Err(e) => return Err(e),
                    }
                }

                let elevation = self.dataset.elevation_at(p_lat, p_lon)?.unwrap_or(0);

                let point = SamplePoint {
                    x: col,
                    y: row,
                    lat: p_lat,
                    lon: p_lon,
                    elevation,
                };

                if let Err(e) = visit(&point, index) {
                    tracing::error!(x = col, y = row, error = %e, "cannot process grid cell");
                }

                index += 1;
            }
        }

        Ok(())
    }
}
