//! Slippy-map tile arithmetic.
//!
//! The standard web-map pyramid: zoom level `z` splits the world into
//! `2^z x 2^z` tiles, indexed from the north-west.

use std::f64::consts::PI;

/// Earth circumference along the equator, in meters.
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_000.0;

/// Geographic coordinate of the north-west corner of a tile.
pub fn num2deg(z: u32, x: u32, y: u32) -> (f64, f64) {
    let n = f64::powi(2.0, z as i32);

    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();

    (lat, lon)
}

/// Tile containing the given coordinate at zoom `z`.
pub fn deg2num(lat: f64, lon: f64, z: u32) -> (u32, u32) {
    let n = f64::powi(2.0, z as i32);

    let x = ((lon + 180.0) / 360.0 * n).floor() as u32;
    let y = ((1.0 - lat.to_radians().tan().asinh() / PI) / 2.0 * n).floor() as u32;

    (x.min(n as u32 - 1), y.min(n as u32 - 1))
}

/// Edge length of a zoom-`z` tile in meters, as the equatorial great
/// circle divided across the pyramid row.
pub fn tile_side_meters(z: u32) -> f64 {
    EARTH_CIRCUMFERENCE_M / f64::powi(2.0, z as i32)
}

/// Number of tiles per side at zoom `z`.
pub fn tiles_per_side(z: u32) -> u32 {
    1u32 << z
}
