//! Tunable thresholds for the guidance engine and the camera dataset cache

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the guide fusion engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum combined |Δlat|+|Δlon| in degrees for a vehicle update to count
    pub min_move_deg: f64,
    /// Minimum speed change in km/h for a vehicle update to count
    pub min_speed_delta_kph: f64,
    /// Turn guides closer than this are treated as already passed
    pub turn_passed_radius_m: f64,
    /// Hazard guides closer than this are treated as already passed (fallback heuristic)
    pub hazard_passed_radius_m: f64,
    /// Hazards from different sources closer than this are the same hazard
    pub fusion_radius_m: f64,
    /// Margin added around the route polyline before querying the dataset
    pub bbox_margin_m: f64,
    /// Maximum perpendicular distance from the route for a camera to be "on route"
    pub corridor_width_m: f64,
    /// Cameras closer than this to the previously accepted one are duplicates
    pub dedup_radius_m: f64,
    /// Vertices a hazard may lag behind the vehicle and still count as ahead (GPS jitter)
    pub vertex_slack: usize,
    /// Search radius used when resolving a hazard's speed limit from the dataset
    pub limit_lookup_radius_m: f64,
    /// Place-search queries used to discover extra hazards; empty disables POI refresh
    pub poi_queries: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_move_deg: 2e-5,
            min_speed_delta_kph: 0.3,
            turn_passed_radius_m: 25.0,
            hazard_passed_radius_m: 20.0,
            fusion_radius_m: 35.0,
            bbox_margin_m: 320.0,
            corridor_width_m: 180.0,
            dedup_radius_m: 28.0,
            vertex_slack: 2,
            limit_lookup_radius_m: 85.0,
            poi_queries: Vec::new(),
        }
    }
}

/// Configuration for the camera dataset cache
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Remote endpoint serving the dataset envelope
    pub url: String,
    /// Local copy of the last successfully fetched envelope
    pub cache_path: PathBuf,
    /// Successful fetches younger than this are not repeated unless forced
    pub refresh_interval: Duration,
    /// Grid cell size in degrees
    pub cell_size_deg: f64,
    /// TCP connect timeout for dataset requests
    pub connect_timeout: Duration,
    /// Whole-request timeout for dataset requests
    pub request_timeout: Duration,
}

impl DatasetConfig {
    pub fn new(url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            cache_path: cache_path.into(),
            ..Self::default()
        }
    }

    /// Sidecar file holding the ETag of the cached payload
    pub fn etag_path(&self) -> PathBuf {
        let mut name = self.cache_path.clone().into_os_string();
        name.push(".etag");
        PathBuf::from(name)
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            cache_path: PathBuf::from("speed-cameras.json"),
            refresh_interval: Duration::from_secs(12 * 60 * 60),
            cell_size_deg: 0.01,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}
