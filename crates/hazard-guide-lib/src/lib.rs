//! Hazard Guide Library - Route Guidance Fusion Engine
//!
//! This library augments a turn-by-turn route with live speed-camera guidance. A large,
//! rarely-changing national camera dataset is indexed for fast proximity queries, vehicle
//! position and camera points are projected onto the route polyline, and three guide
//! sources are fused into one deduplicated, precedence-ordered stream.
//!
//! # Architecture
//!
//! - **[`utils`]**: Geometric primitives (haversine distance, segment projection, bounds)
//! - **[`GridIndex`]**: Grid-bucketed spatial index over [`HazardRecord`]s
//! - **[`polyline`]**: Nearest-vertex and corridor queries against a route polyline
//! - **[`DatasetCache`]**: On-disk cache + conditional remote refresh of the camera dataset
//! - **[`GuideEngine`]**: Route/vehicle state, guide fusion and the async indexing pipeline
//!
//! # Concurrency
//!
//! Engine state is single-writer: every mutation happens under one short-lived write
//! lock. Background work (indexing pipeline, dataset refresh, speed-limit lookups) runs
//! on spawned tasks that capture the route revision at launch and only publish when the
//! revision is still live.

mod config;
pub mod dataset;
pub mod engine;
mod grid;
pub mod polyline;
mod providers;
mod route;
pub mod runtime;
pub mod utils;

// Public API exports
pub use config::{Config, DatasetConfig};
pub use dataset::{DatasetCache, DatasetFetcher, FetchResponse, RefreshOutcome, ReqwestFetcher};
pub use engine::{GuideEngine, HazardClassifier};
pub use grid::{GridIndex, HazardRecord};
pub use providers::{BoxFuture, PlaceCandidate, PlaceSearch, RouteProvider};
pub use route::{Coordinate, Guide, GuideSource, RoutePlan, VehicleState};

/// Error types for the guidance engine
#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("Geometry undefined: {0}")]
    GeometryUndefined(String),

    #[error("Hazard dataset unavailable: {0}")]
    DatasetUnavailable(String),

    #[error("Remote fetch failed{}: {}", status_suffix(.status), .reason)]
    RemoteFetchFailed { status: Option<u16>, reason: String },

    #[error("Route provider failed: {0}")]
    RouteProviderFailed(String),

    #[error("Place search failed: {0}")]
    PlaceSearchFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GuideError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteFetchFailed { .. } | Self::PlaceSearchFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that the main entry points are accessible
        let _: fn() -> Config = Config::default;
        let _: fn(&[Guide]) -> Vec<Guide> = |g| HazardClassifier::default().hazard_guides(g);
    }

    #[test]
    fn test_remote_fetch_error_display() {
        let err = GuideError::RemoteFetchFailed {
            status: Some(503),
            reason: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "Remote fetch failed (HTTP 503): maintenance");
        assert!(err.is_retryable());

        let err = GuideError::RemoteFetchFailed {
            status: None,
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Remote fetch failed: timeout");
        assert!(!GuideError::DatasetUnavailable("missing".into()).is_retryable());
    }
}
