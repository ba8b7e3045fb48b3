//! Heightmap rasterization.
//!
//! Sampled elevations become RGBA pixels through a fixed turbo gradient
//! whose domain runs from sea level to the highest terrestrial elevation.
//! The gradient is deterministic, so identical inputs produce byte
//! identical PNGs.

use std::io::Cursor;

use image::{imageops, ImageFormat, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::grid::GridSampler;
use crate::hgt::VOID_ELEVATION;

/// Upper end of the gradient domain in meters, just above Mount Everest.
const ELEVATION_DOMAIN_MAX: f64 = 8865.0;

/// Output sizing rules for a rendered heightmap.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Resample to the target even when the sampled image is smaller than
    /// it. The tile pyramid uses this so every cached tile has the
    /// requested edge length.
    pub force_interpolation: bool,
    /// Never resample when the sampled image is smaller than the target.
    pub ignore_when_smaller: bool,
}

impl ResolutionConfig {
    /// Square config with both resize escape hatches off.
    pub fn square(resolution: u32) -> Self {
        Self {
            width: resolution,
            height: resolution,
            force_interpolation: false,
            ignore_when_smaller: false,
        }
    }
}

/// Fixed elevation-to-color mapping over `[0, ELEVATION_DOMAIN_MAX]`.
struct ElevationGradient {
    gradient: colorgrad::Gradient,
}

impl ElevationGradient {
    fn new() -> Self {
        Self {
            gradient: colorgrad::turbo(),
        }
    }

    fn color(&self, elevation: i16) -> Rgba<u8> {
        // Voids render as sea level.
        let elevation = if elevation == VOID_ELEVATION {
            0
        } else {
            elevation
        };

        let t = f64::from(elevation).clamp(0.0, ELEVATION_DOMAIN_MAX) / ELEVATION_DOMAIN_MAX;
        Rgba(self.gradient.at(t).to_rgba8())
    }
}

/// Render the square region anchored north-west at `(lat, lon)` into PNG
/// bytes, sampling elevations through the given sampler.
///
/// Cells the sampler skips keep the zeroed RGBA default.
pub fn render_heightmap(
    sampler: &GridSampler,
    lat: f64,
    lon: f64,
    side_meters: f64,
    config: &ResolutionConfig,
) -> Result<Vec<u8>> {
    if config.width == 0 || config.height == 0 {
        return Err(Error::Resize {
            width: config.width,
            height: config.height,
        });
    }

    let step = GridSampler::steps(side_meters);
    let gradient = ElevationGradient::new();
    let mut image = RgbaImage::new(step, step);

    sampler.sample(lat, lon, side_meters, |point, _| {
        image.put_pixel(point.x, point.y, gradient.color(point.elevation));
        Ok(())
    })?;

    tracing::info!(lat, lon, side_meters, step, "height profile sampled");

    let image = apply_resolution(image, step, config);

    encode_png(&image)
}

fn apply_resolution(image: RgbaImage, step: u32, config: &ResolutionConfig) -> RgbaImage {
    let downscale =
        !config.ignore_when_smaller && config.width < step && config.height < step;
    let force = config.force_interpolation && (config.width, config.height) != (step, step);

    if downscale || force {
        tracing::debug!(
            from = step,
            width = config.width,
            height = config.height,
            "resampling heightmap"
        );
        imageops::resize(
            &image,
            config.width,
            config.height,
            imageops::FilterType::Lanczos3,
        )
    } else {
        image
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hgt::tests::write_test_tile;
    use crate::hgt::HgtDataset;
    use image::GenericImageView;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sampler_over(dir: &TempDir) -> GridSampler {
        GridSampler::new(Arc::new(HgtDataset::new(dir.path(), 10)), None)
    }

    fn decode_dimensions(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn test_output_keeps_sampled_size_when_target_is_larger() {
        let dir = TempDir::new().unwrap();
        write_test_tile(dir.path(), "N27E086.hgt", &[]);
        let sampler = sampler_over(&dir);

        // 2250 m / 30 m = 75 samples per side, target 256 is larger.
        let png = render_heightmap(
            &sampler,
            27.687397,
            86.731814,
            2250.0,
            &ResolutionConfig::square(256),
        )
        .unwrap();

        assert_eq!(decode_dimensions(&png), (75, 75));
    }

    #[test]
    fn test_output_downscales_when_target_is_smaller() {
        let dir = TempDir::new().unwrap();
        write_test_tile(dir.path(), "N27E086.hgt", &[]);
        let sampler = sampler_over(&dir);

        // 9000 m / 30 m = 300 samples per side, downscaled to 64.
        let png = render_heightmap(
            &sampler,
            27.9,
            86.1,
            9000.0,
            &ResolutionConfig::square(64),
        )
        .unwrap();

        assert_eq!(decode_dimensions(&png), (64, 64));
    }

    #[test]
    fn test_ignore_when_smaller_suppresses_downscale() {
        let dir = TempDir::new().unwrap();
        write_test_tile(dir.path(), "N27E086.hgt", &[]);
        let sampler = sampler_over(&dir);

        let config = ResolutionConfig {
            width: 64,
            height: 64,
            force_interpolation: false,
            ignore_when_smaller: true,
        };
        let png = render_heightmap(&sampler, 27.9, 86.1, 9000.0, &config).unwrap();

        assert_eq!(decode_dimensions(&png), (300, 300));
    }

    #[test]
    fn test_force_interpolation_upscales() {
        let dir = TempDir::new().unwrap();
        write_test_tile(dir.path(), "N27E086.hgt", &[]);
        let sampler = sampler_over(&dir);

        let config = ResolutionConfig {
            width: 256,
            height: 256,
            force_interpolation: true,
            ignore_when_smaller: false,
        };
        let png = render_heightmap(&sampler, 27.687397, 86.731814, 2250.0, &config).unwrap();

        assert_eq!(decode_dimensions(&png), (256, 256));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write_test_tile(dir.path(), "N27E086.hgt", &[(600, 600, 4000), (601, 600, 250)]);
        let sampler = sampler_over(&dir);

        let config = ResolutionConfig::square(256);
        let first = render_heightmap(&sampler, 27.5002, 86.4998, 300.0, &config).unwrap();
        let second = render_heightmap(&sampler, 27.5002, 86.4998, 300.0, &config).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_resolution_is_rejected() {
        let dir = TempDir::new().unwrap();
        let sampler = sampler_over(&dir);

        let config = ResolutionConfig {
            width: 0,
            height: 0,
            force_interpolation: false,
            ignore_when_smaller: false,
        };

        assert!(matches!(
            render_heightmap(&sampler, 27.9, 86.1, 300.0, &config),
            Err(Error::Resize { .. })
        ));
    }

    #[test]
    fn test_uncached_region_renders_blank_but_valid() {
        let dir = TempDir::new().unwrap();
        let sampler = sampler_over(&dir);

        let png = render_heightmap(
            &sampler,
            10.5,
            10.5,
            300.0,
            &ResolutionConfig::square(256),
        )
        .unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (10, 10));
        // Every sampled cell read elevation 0, which is the gradient floor.
        let first = decoded.get_pixel(0, 0);
        assert!(decoded.pixels().all(|p| p == first));
    }
}
