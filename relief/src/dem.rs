//! On-demand DEM file store.
//!
//! Given a coordinate, [`DemStore::ensure`] produces a local path to the
//! unpacked HGT raster for that 1° cell, downloading and extracting the
//! zipped archive entry the first time it is needed. Guarantees:
//!
//! - at most one in-flight download per archive filename, process-wide;
//! - a filename the archive answered 404 for is never requested again in
//!   this process;
//! - a zip left behind by an interrupted extraction is resumed, not
//!   re-downloaded.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::coverage::CoverageIndex;
use crate::earthdata::EarthdataApi;
use crate::error::{Error, Result};
use crate::filename::{hgt_from_zip_name, zip_filename};
use crate::http::HttpClient;

/// How many files are fetched concurrently by [`DemStore::ensure_all`].
const BULK_DOWNLOAD_CHUNK: usize = 100;

/// Downloads and unpacks SRTMGL1 archive entries into a local directory.
pub struct DemStore {
    dir: PathBuf,
    base_url: String,
    http: Arc<dyn HttpClient>,
    credentials: EarthdataApi,
    coverage: CoverageIndex,
    // Outer mutex guards the registry only; the per-filename mutex is held
    // for the duration of a download so concurrent callers coalesce.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    // Filenames the archive reported missing. Never persisted: an outage
    // must not poison the cache across restarts.
    negative: Mutex<HashSet<String>>,
}

impl DemStore {
    /// Create a store rooted at `dir`, fetching from `base_url`.
    pub fn new(
        dir: impl Into<PathBuf>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
        credentials: EarthdataApi,
        coverage: CoverageIndex,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            credentials,
            coverage,
            in_flight: Mutex::new(HashMap::new()),
            negative: Mutex::new(HashSet::new()),
        }
    }

    /// Make sure the HGT raster covering the given point is on disk and
    /// return its path.
    ///
    /// Fails with [`Error::NotCovered`] without touching the network when
    /// the point is outside the dataset, and with
    /// [`Error::NonExistentDemFile`] when the archive has answered 404 for
    /// this cell before.
    pub fn ensure(&self, lat: f64, lon: f64) -> Result<PathBuf> {
        if !self.coverage.contains(lat, lon)? {
            return Err(Error::NotCovered { lat, lon });
        }

        self.ensure_named(&zip_filename(lat, lon))
    }

    /// [`Self::ensure`] by archive filename, used by the bulk path.
    pub fn ensure_named(&self, zip_name: &str) -> Result<PathBuf> {
        let hgt_path = self.dir.join(hgt_from_zip_name(zip_name));

        if hgt_path.exists() {
            return Ok(hgt_path);
        }

        let file_lock = {
            let mut registry = self.in_flight.lock().unwrap();
            Arc::clone(registry.entry(zip_name.to_string()).or_default())
        };
        let _guard = file_lock.lock().unwrap();

        // Another caller may have won the race while we waited.
        if hgt_path.exists() {
            return Ok(hgt_path);
        }

        if self.negative.lock().unwrap().contains(zip_name) {
            return Err(Error::NonExistentDemFile {
                filename: zip_name.to_string(),
            });
        }

        let zip_path = self.dir.join(zip_name);

        // A zip without its raster means a previous extraction was
        // interrupted; unzip in place instead of re-downloading.
        if !zip_path.exists() {
            self.download_zip(zip_name, &zip_path)?;
        }

        let extracted = self.unzip(&zip_path)?;

        let Some(first) = extracted.into_iter().next() else {
            return Err(Error::Corrupt { path: zip_path });
        };

        if let Err(e) = fs::remove_file(&zip_path) {
            tracing::warn!(path = %zip_path.display(), error = %e, "cannot remove archive");
        }

        tracing::info!(file = zip_name, "elevation file unpacked");

        Ok(first)
    }

    /// Fetch every file named by the coverage index, [`BULK_DOWNLOAD_CHUNK`]
    /// at a time. Failures are logged and do not stop the sweep.
    pub fn ensure_all(&self) -> Result<()> {
        use rayon::prelude::*;

        let files = self.coverage.all_files()?;
        tracing::info!(files = files.len(), "downloading the elevation dataset");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(BULK_DOWNLOAD_CHUNK)
            .build()
            .map_err(|e| Error::Config {
                reason: format!("cannot build download pool: {e}"),
            })?;

        for chunk in files.chunks(BULK_DOWNLOAD_CHUNK) {
            pool.install(|| {
                chunk.par_iter().for_each(|zip_name| {
                    match self.ensure_named(zip_name) {
                        Ok(_) => {}
                        Err(Error::NonExistentDemFile { .. }) => {}
                        Err(e) => {
                            tracing::warn!(file = %zip_name, error = %e, "cannot fetch elevation file");
                        }
                    }
                });
            });
        }

        Ok(())
    }

    fn download_zip(&self, zip_name: &str, zip_path: &Path) -> Result<()> {
        let token = self.credentials.token()?;
        let url = format!("{}/{}", self.base_url, zip_name);

        tracing::info!(file = zip_name, "downloading elevation file");

        let response = self.http.get_with_bearer(&url, &token.access_token)?;

        if response.status == 404 {
            self.negative.lock().unwrap().insert(zip_name.to_string());
            return Err(Error::NonExistentDemFile {
                filename: zip_name.to_string(),
            });
        }

        if !response.is_success() {
            return Err(Error::Remote {
                filename: zip_name.to_string(),
                status: response.status,
            });
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(zip_path, &response.body)?;

        Ok(())
    }

    /// Extract every entry of the archive into the store directory and
    /// return the written paths.
    fn unzip(&self, zip_path: &Path) -> Result<Vec<PathBuf>> {
        let invalid = |reason: String| Error::Unzip {
            path: zip_path.to_path_buf(),
            reason,
        };

        let file = fs::File::open(zip_path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;

        let mut written = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| invalid(e.to_string()))?;

            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let out_path = self.dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out_file = fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out_file)?;
            written.push(out_path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockHttpClient;
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    const TOKEN_BODY: &str = r#"{"access_token": "T", "expiration_date": "2099-01-01"}"#;

    const EVEREST_COVERAGE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"dataFile": "N27E086.SRTMGL1.hgt.zip"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[86, 27], [87, 27], [87, 28], [86, 28], [86, 27]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"dataFile": "N00E000.SRTMGL1.hgt.zip"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
                }
            }
        ]
    }"#;

    fn coverage_file(dir: &Path) -> PathBuf {
        let path = dir.join("coverage.geojson");
        fs::write(&path, EVEREST_COVERAGE).unwrap();
        path
    }

    fn zipped_hgt(entry_name: &str) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            writer.start_file(entry_name, options).unwrap();
            writer.write_all(&[0u8; 128]).unwrap();
            writer.finish().unwrap();
        }
        buffer
    }

    fn store_with(http: Arc<MockHttpClient>, dir: &TempDir) -> DemStore {
        let credentials = EarthdataApi::new(
            "http://earthdata.test/api",
            "user",
            "pass",
            http.clone() as Arc<dyn HttpClient>,
        );
        DemStore::new(
            dir.path().join("dem"),
            "http://archive.test",
            http,
            credentials,
            CoverageIndex::new(coverage_file(dir.path())),
        )
    }

    #[test]
    fn test_ensure_downloads_unzips_and_removes_archive() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/token", 200, TOKEN_BODY)
                .route("N27E086.SRTMGL1.hgt.zip", 200, zipped_hgt("N27E086.hgt")),
        );
        let store = store_with(http, &dir);

        let path = store.ensure(27.687619, 86.731679).unwrap();

        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "N27E086.hgt");
        assert!(!dir.path().join("dem/N27E086.SRTMGL1.hgt.zip").exists());
    }

    #[test]
    fn test_ensure_is_idempotent_without_network() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/token", 200, TOKEN_BODY)
                .route("N27E086.SRTMGL1.hgt.zip", 200, zipped_hgt("N27E086.hgt")),
        );
        let store = store_with(http.clone(), &dir);

        store.ensure(27.5, 86.5).unwrap();
        store.ensure(27.9, 86.1).unwrap();

        assert_eq!(http.get_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_uncovered_point_fails_without_network() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttpClient::new());
        let store = store_with(http.clone(), &dir);

        // Middle of the Pacific, not in the coverage fixture.
        let err = store.ensure(0.5, -150.5).unwrap_err();

        assert!(matches!(err, Error::NotCovered { .. }));
        assert_eq!(http.get_count.load(Ordering::SeqCst), 0);
        assert_eq!(http.post_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_404_is_cached_for_the_process() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/token", 200, TOKEN_BODY)
                .route("N00E000.SRTMGL1.hgt.zip", 404, Vec::new()),
        );
        let store = store_with(http.clone(), &dir);

        let first = store.ensure(0.5, 0.5).unwrap_err();
        assert!(matches!(first, Error::NonExistentDemFile { .. }));
        assert_eq!(http.get_count.load(Ordering::SeqCst), 1);

        let second = store.ensure(0.5, 0.5).unwrap_err();
        assert!(matches!(second, Error::NonExistentDemFile { .. }));
        // No second archive request.
        assert_eq!(http.get_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remote_failure_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/token", 200, TOKEN_BODY)
                .route("N00E000.SRTMGL1.hgt.zip", 503, Vec::new()),
        );
        let store = store_with(http.clone(), &dir);

        assert!(matches!(
            store.ensure(0.5, 0.5),
            Err(Error::Remote { status: 503, .. })
        ));
        assert!(matches!(
            store.ensure(0.5, 0.5),
            Err(Error::Remote { status: 503, .. })
        ));
        // Retried on the next call, unlike a 404.
        assert_eq!(http.get_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_ensure_issues_one_request() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockHttpClient::new()
            .route("/users/token", 200, TOKEN_BODY)
            .route("N27E086.SRTMGL1.hgt.zip", 200, zipped_hgt("N27E086.hgt"));
        mock.get_delay = Some(Duration::from_millis(50));
        let http = Arc::new(mock);
        let store = Arc::new(store_with(http.clone(), &dir));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    store.ensure(27.687619, 86.731679).unwrap();
                });
            }
        });

        assert_eq!(http.get_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_leftover_zip_is_resumed_without_download() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttpClient::new().route("/users/token", 200, TOKEN_BODY));
        let store = store_with(http.clone(), &dir);

        // Simulate a crash after download but before extraction.
        let dem_dir = dir.path().join("dem");
        fs::create_dir_all(&dem_dir).unwrap();
        fs::write(
            dem_dir.join("N27E086.SRTMGL1.hgt.zip"),
            zipped_hgt("N27E086.hgt"),
        )
        .unwrap();

        let path = store.ensure(27.5, 86.5).unwrap();

        assert!(path.exists());
        assert_eq!(http.get_count.load(Ordering::SeqCst), 0);
        assert!(!dem_dir.join("N27E086.SRTMGL1.hgt.zip").exists());
    }

    #[test]
    fn test_empty_archive_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let empty_zip = {
            let mut buffer = Vec::new();
            let writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
            writer.finish().unwrap();
            buffer
        };
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/token", 200, TOKEN_BODY)
                .route("N27E086.SRTMGL1.hgt.zip", 200, empty_zip),
        );
        let store = store_with(http, &dir);

        assert!(matches!(
            store.ensure(27.5, 86.5),
            Err(Error::Corrupt { .. })
        ));
    }
}
