//! Conditional GET of the remote dataset
//!
//! The cache only needs one operation from the network: "GET this URL, unless it still
//! matches this ETag". [`DatasetFetcher`] captures that so tests can inject fakes with
//! scripted statuses and delays, while [`ReqwestFetcher`] is the real client.

use crate::providers::BoxFuture;
use crate::{GuideError, Result};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default User-Agent string for dataset requests
const DEFAULT_USER_AGENT: &str = concat!("hazard-guide/", env!("CARGO_PKG_VERSION"));

/// Raw outcome of a dataset request. Status interpretation is up to the cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub body: Vec<u8>,
}

/// Conditional HTTP GET
pub trait DatasetFetcher: Send + Sync {
    /// GET `url`, sending `If-None-Match: <etag>` when an ETag is known.
    ///
    /// Transport failures (connect errors, timeouts) are errors; any HTTP status,
    /// including 304 and 5xx, is a successful [`FetchResponse`].
    fn fetch<'a>(&'a self, url: &'a str, etag: Option<&'a str>)
    -> BoxFuture<'a, Result<FetchResponse>>;
}

/// Dataset fetcher backed by `reqwest`
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with bounded connect and request timeouts
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| GuideError::RemoteFetchFailed {
                status: None,
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

impl DatasetFetcher for ReqwestFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        etag: Option<&'a str>,
    ) -> BoxFuture<'a, Result<FetchResponse>> {
        Box::pin(async move {
            trace!(url, etag, "Dataset GET starting");

            let mut request = self.client.get(url);
            if let Some(etag) = etag {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }

            let response = request.send().await.map_err(|e| {
                warn!(
                    url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "Dataset request failed"
                );
                GuideError::RemoteFetchFailed {
                    status: None,
                    reason: format!("Request failed: {e}"),
                }
            })?;

            let status = response.status().as_u16();
            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            debug!(url, status, etag = etag.as_deref(), "Dataset response received");

            let body = response
                .bytes()
                .await
                .map_err(|e| GuideError::RemoteFetchFailed {
                    status: Some(status),
                    reason: format!("Failed to read response: {e}"),
                })?
                .to_vec();

            Ok(FetchResponse { status, etag, body })
        })
    }
}
