//! Camera dataset cache: local file, conditional remote refresh and the grid index
//!
//! The cache starts `Unloaded`. The first query loads the local file (or falls back to an
//! empty dataset) so callers never block on the network. Refreshes build a complete new
//! [`GridIndex`] before swapping it in, so readers never see a half-built index.

mod envelope;
mod http;

pub use envelope::{DatasetEnvelope, EnvelopeRecord, SUPPORTED_SCHEMA_VERSION};
pub use http::{DatasetFetcher, FetchResponse, ReqwestFetcher};

use crate::config::DatasetConfig;
use crate::grid::{GridIndex, HazardRecord};
use crate::route::Coordinate;
use crate::runtime::{self, recover};
use crate::{GuideError, Result};
use geo::Rect;
use instant::Instant;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Longest response body excerpt kept in a fetch error
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Result of a refresh attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nothing fetched, or the server answered 304
    Unchanged,
    /// A new dataset was installed
    Changed { records: usize },
}

/// Bookkeeping for conditional requests
#[derive(Debug, Default)]
struct FetchMeta {
    etag: Option<String>,
    last_fetch_at: Option<Instant>,
}

/// Process-wide owner of the camera dataset
pub struct DatasetCache {
    config: DatasetConfig,
    fetcher: Arc<dyn DatasetFetcher>,
    /// `None` while unloaded
    index: RwLock<Option<Arc<GridIndex>>>,
    meta: Mutex<FetchMeta>,
    /// Serialises refreshes so concurrent callers share one network round-trip
    refresh_lock: tokio::sync::Mutex<()>,
}

impl DatasetCache {
    pub fn new(config: DatasetConfig, fetcher: Arc<dyn DatasetFetcher>) -> Self {
        Self {
            config,
            fetcher,
            index: RwLock::new(None),
            meta: Mutex::new(FetchMeta::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a cache that fetches with `reqwest` using the configured timeouts
    pub fn with_reqwest(config: DatasetConfig) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(config.connect_timeout, config.request_timeout)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Load the local cache file on first use.
    ///
    /// Any failure (missing file, malformed payload) installs an empty dataset instead,
    /// so this never fails and never touches the network.
    pub fn ensure_loaded(&self) -> Arc<GridIndex> {
        if let Some(index) = recover(self.index.read()).as_ref() {
            return index.clone();
        }

        let mut guard = recover(self.index.write());
        // Another caller may have loaded it while we waited for the write lock
        if let Some(index) = guard.as_ref() {
            return index.clone();
        }

        profiling::scope!("DatasetCache::ensure_loaded");
        let records = match self.read_cache_file() {
            Ok(records) => {
                info!(
                    path = %self.config.cache_path.display(),
                    records = records.len(),
                    "Loaded camera dataset from cache file"
                );
                records
            }
            Err(e) => {
                warn!(
                    path = %self.config.cache_path.display(),
                    error = %e,
                    "Camera dataset cache unavailable; starting empty"
                );
                Vec::new()
            }
        };

        if let Some(etag) = read_etag(&self.config.etag_path()) {
            recover(self.meta.lock()).etag = Some(etag);
        }

        let index = Arc::new(GridIndex::build(records, self.config.cell_size_deg));
        *guard = Some(index.clone());
        index
    }

    fn read_cache_file(&self) -> Result<Vec<HazardRecord>> {
        let bytes = std::fs::read(&self.config.cache_path).map_err(|e| {
            GuideError::DatasetUnavailable(format!("cannot read cache file: {e}"))
        })?;
        let envelope = DatasetEnvelope::parse(&bytes)
            .map_err(|e| GuideError::DatasetUnavailable(format!("malformed cache file: {e}")))?;
        Ok(envelope.into_records())
    }

    /// Whether the dataset has been loaded (possibly empty)
    pub fn is_loaded(&self) -> bool {
        recover(self.index.read()).is_some()
    }

    /// Number of records currently installed; zero while unloaded
    pub fn record_count(&self) -> usize {
        recover(self.index.read())
            .as_ref()
            .map_or(0, |index| index.len())
    }

    /// ETag of the installed dataset, if known
    pub fn etag(&self) -> Option<String> {
        recover(self.meta.lock()).etag.clone()
    }

    /// Conditionally refresh from the remote endpoint.
    ///
    /// Without `force`, a successful fetch within the refresh interval short-circuits to
    /// [`RefreshOutcome::Unchanged`]. On any failure the installed dataset is kept.
    pub async fn refresh_from_backend_if_needed(&self, force: bool) -> Result<RefreshOutcome> {
        let _refresh = self.refresh_lock.lock().await;

        let etag = {
            let meta = recover(self.meta.lock());
            if !force
                && let Some(last) = meta.last_fetch_at
                && last.elapsed() < self.config.refresh_interval
            {
                debug!("Camera dataset is fresh; skipping refresh");
                return Ok(RefreshOutcome::Unchanged);
            }
            meta.etag.clone()
        };

        // Make sure the sidecar ETag has been read before sending a conditional request
        let etag = if self.is_loaded() {
            etag
        } else {
            self.ensure_loaded();
            self.etag()
        };

        let response = self.fetcher.fetch(&self.config.url, etag.as_deref()).await?;

        match response.status {
            304 => {
                recover(self.meta.lock()).last_fetch_at = Some(Instant::now());
                debug!("Camera dataset not modified");
                Ok(RefreshOutcome::Unchanged)
            }
            200..=299 => self.install(response),
            status => {
                let excerpt = truncate_body(&response.body);
                warn!(status, body = %excerpt, "Camera dataset refresh failed");
                Err(GuideError::RemoteFetchFailed {
                    status: Some(status),
                    reason: excerpt,
                })
            }
        }
    }

    /// Parse a successful response, swap in the new index and persist the raw payload
    fn install(&self, response: FetchResponse) -> Result<RefreshOutcome> {
        profiling::scope!("DatasetCache::install");

        let envelope =
            DatasetEnvelope::parse(&response.body).map_err(|e| GuideError::RemoteFetchFailed {
                status: Some(response.status),
                reason: format!("malformed dataset payload: {e}"),
            })?;
        let source = envelope.source.clone();
        let updated_at = envelope.updated_at.clone();

        // Build fully before taking the write lock
        let index = Arc::new(GridIndex::build(
            envelope.into_records(),
            self.config.cell_size_deg,
        ));
        let records = index.len();
        *recover(self.index.write()) = Some(index);

        {
            let mut meta = recover(self.meta.lock());
            meta.etag = response.etag.clone();
            meta.last_fetch_at = Some(Instant::now());
        }

        if let Err(e) = self.persist(&response.body, response.etag.as_deref()) {
            warn!(
                path = %self.config.cache_path.display(),
                error = %e,
                "Failed to persist camera dataset"
            );
        }

        info!(records, %source, %updated_at, "Installed refreshed camera dataset");
        Ok(RefreshOutcome::Changed { records })
    }

    /// Write payload and ETag atomically via temp file + rename
    fn persist(&self, body: &[u8], etag: Option<&str>) -> Result<()> {
        if let Some(parent) = self.config.cache_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        write_atomically(&self.config.cache_path, body)?;

        let etag_path = self.config.etag_path();
        match etag {
            Some(etag) => write_atomically(&etag_path, etag.as_bytes())?,
            None => match std::fs::remove_file(&etag_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// Speed limit of the camera nearest to `coordinate` within `within_meters`
    pub fn lookup_limit(&self, coordinate: Coordinate, within_meters: f64) -> Option<u32> {
        let index = self.ensure_loaded();
        index
            .nearest(coordinate, within_meters)
            .and_then(|record| record.speed_limit_kph)
    }

    /// All cameras inside `bounds` (x = longitude, y = latitude)
    pub fn cameras(&self, bounds: &Rect<f64>) -> Vec<HazardRecord> {
        let index = self.ensure_loaded();
        index.range_query(bounds).into_iter().cloned().collect()
    }

    /// Load synchronously and schedule a non-forced refresh without waiting for it.
    ///
    /// Callers get immediate (possibly stale or empty) data and eventual freshness.
    pub fn prewarm(self: &Arc<Self>) {
        self.ensure_loaded();

        if !runtime::in_runtime_context() {
            debug!("No async runtime; skipping background dataset refresh");
            return;
        }

        let cache = self.clone();
        runtime::spawn(async move {
            if let Err(e) = cache.refresh_from_backend_if_needed(false).await {
                warn!(error = %e, "Background camera dataset refresh failed");
            }
        });
    }
}

fn read_etag(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    std::fs::write(&temp, bytes)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    if text.chars().nth(MAX_ERROR_BODY_CHARS).is_some() {
        excerpt.push('…');
    }
    excerpt
}
