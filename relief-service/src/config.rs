//! Service configuration from environment variables.
//!
//! Every setting has a default; missing variables are logged as warnings
//! so a bare startup is loud about what it fell back to.

use std::time::Duration;

/// Default SRTMGL1 archive location.
const DEFAULT_ARCHIVE_URL: &str = "https://e4ftl01.cr.usgs.gov/MEASURES/SRTMGL1.003/2000.02.11";

/// Default Earthdata login API.
const DEFAULT_EARTHDATA_URL: &str = "https://urs.earthdata.nasa.gov/api";

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub dem_dir: String,
    pub tile_dir: String,
    pub coverage_file: String,
    pub archive_url: String,
    pub earthdata_url: String,
    pub earthdata_username: Option<String>,
    pub earthdata_password: Option<String>,
    pub http_timeout: Duration,
    pub cache_size: u64,
    /// CORS allow-list. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Read the configuration from `RELIEF_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            port: parsed_var("RELIEF_PORT", 8080),
            dem_dir: string_var("RELIEF_DEM_DIR", "data/dem"),
            tile_dir: string_var("RELIEF_TILE_DIR", "data/tiles"),
            coverage_file: string_var("RELIEF_COVERAGE_FILE", "data/srtm_coverage.geojson"),
            archive_url: string_var("RELIEF_ARCHIVE_URL", DEFAULT_ARCHIVE_URL),
            earthdata_url: string_var("RELIEF_EARTHDATA_URL", DEFAULT_EARTHDATA_URL),
            earthdata_username: optional_var("RELIEF_EARTHDATA_USERNAME"),
            earthdata_password: optional_var("RELIEF_EARTHDATA_PASSWORD"),
            http_timeout: Duration::from_secs(parsed_var("RELIEF_HTTP_TIMEOUT", 60)),
            cache_size: parsed_var("RELIEF_CACHE_SIZE", 100),
            allowed_origins: list_var("RELIEF_ALLOWED_ORIGINS"),
        }
    }

    /// Whether archive credentials were supplied.
    pub fn has_credentials(&self) -> bool {
        self.earthdata_username.is_some() && self.earthdata_password.is_some()
    }
}

fn string_var(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            tracing::warn!("{name} is not set, using {default}");
            default.to_string()
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!("cannot parse {name}, using {default}");
            default
        }),
        Err(_) => default,
    }
}

fn list_var(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        // Tests run without RELIEF_* variables set.
        let config = Config::from_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.dem_dir, "data/dem");
        assert_eq!(config.cache_size, 100);
        assert!(!config.has_credentials());
        assert!(config.allowed_origins.is_empty());
    }
}
