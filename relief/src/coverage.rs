//! Land coverage index for the elevation dataset.
//!
//! The SRTMGL1 archive only holds files for 1° cells that contain land.
//! The index is a GeoJSON `FeatureCollection` of cell footprints, each
//! feature carrying a `dataFile` property with the archive filename for
//! that cell. Checking a point against the index avoids a network round
//! trip for the common ocean case.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use geo::{Contains, Geometry, Point};
use geojson::FeatureCollection;

use crate::error::{Error, Result};

/// Name of the feature property holding the archive filename.
const DATA_FILE_PROPERTY: &str = "dataFile";

/// Lazily loaded set of dataset cell footprints.
///
/// The GeoJSON file is parsed on first use and kept for the lifetime of the
/// process. Loading is idempotent; concurrent readers share one parsed copy.
pub struct CoverageIndex {
    path: PathBuf,
    features: Mutex<Option<Arc<Vec<CoverageFeature>>>>,
}

struct CoverageFeature {
    footprint: Geometry<f64>,
    data_file: Option<String>,
}

impl CoverageIndex {
    /// Create an index backed by the given GeoJSON file. The file is not
    /// touched until the first query.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            features: Mutex::new(None),
        }
    }

    /// Whether the dataset holds a cell containing the given point.
    ///
    /// Containment is planar, which is exact enough here: footprints are 1°
    /// squares or small unions of them.
    pub fn contains(&self, lat: f64, lon: f64) -> Result<bool> {
        let features = self.load()?;
        let point = Point::new(lon, lat);

        Ok(features.iter().any(|f| f.footprint.contains(&point)))
    }

    /// Archive filenames of every cell in the dataset, for bulk download.
    pub fn all_files(&self) -> Result<Vec<String>> {
        let features = self.load()?;

        Ok(features
            .iter()
            .filter_map(|f| f.data_file.clone())
            .collect())
    }

    fn load(&self) -> Result<Arc<Vec<CoverageFeature>>> {
        let mut guard = self.features.lock().unwrap();

        if let Some(features) = guard.as_ref() {
            return Ok(Arc::clone(features));
        }

        let features = Arc::new(self.parse()?);
        tracing::info!(
            path = %self.path.display(),
            features = features.len(),
            "coverage index loaded"
        );
        *guard = Some(Arc::clone(&features));

        Ok(features)
    }

    fn parse(&self) -> Result<Vec<CoverageFeature>> {
        let unavailable = |reason: String| Error::CoverageUnavailable {
            path: self.path.clone(),
            reason,
        };

        let raw = std::fs::read_to_string(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let collection: FeatureCollection =
            raw.parse().map_err(|e: geojson::Error| unavailable(e.to_string()))?;

        let mut features = Vec::with_capacity(collection.features.len());

        for feature in collection.features {
            let data_file = feature
                .property(DATA_FILE_PROPERTY)
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let geometry = feature
                .geometry
                .ok_or_else(|| unavailable("feature without geometry".to_string()))?;
            let footprint: Geometry<f64> = geometry
                .value
                .try_into()
                .map_err(|e: geojson::Error| unavailable(e.to_string()))?;

            features.push(CoverageFeature {
                footprint,
                data_file,
            });
        }

        Ok(features)
    }
}
