use clap::Parser;
use hazard_guide_lib::{Config, DatasetConfig, HazardClassifier};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Hazard Guide - Replays a GPS track against a route and reports live speed-camera guidance
pub struct Settings {
    /// Route plan JSON file (polyline + guides)
    #[clap(short, long, value_name = "FILE")]
    pub route: PathBuf,

    /// GPX track to replay as vehicle updates; defaults to driving the route polyline
    #[clap(short, long, value_name = "FILE")]
    pub track: Option<PathBuf>,

    /// Remote endpoint of the speed camera dataset
    #[clap(long, default_value = "")]
    pub dataset_url: String,

    /// Local copy of the camera dataset (defaults to a per-user config directory)
    #[clap(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// Refresh the dataset from the remote endpoint before replaying, ignoring its age
    #[clap(long, default_value = "false")]
    pub force_refresh: bool,

    /// Hours a fetched dataset stays fresh before the next conditional request
    #[clap(long, default_value = "12")]
    pub refresh_interval_hours: u64,

    /// Speed in km/h used when the track carries no timestamps
    #[clap(long, default_value = "50.0")]
    pub speed_kph: f64,

    /// Extra keywords marking a route guide as a camera (repeatable)
    #[clap(long = "keyword", value_name = "TEXT")]
    pub keywords: Vec<String>,

    /// Provider maneuver codes that always denote a camera (repeatable)
    #[clap(long = "maneuver-type", value_name = "CODE")]
    pub maneuver_types: Vec<i32>,

    /// Place search query used to find extra cameras near the route (repeatable)
    #[clap(long = "poi-query", value_name = "TEXT")]
    pub poi_queries: Vec<String>,

    /// JSON list of places answering POI queries
    #[clap(long, value_name = "FILE")]
    pub places: Option<PathBuf>,

    /// Seconds to wait for route indexing before replaying anyway
    #[clap(long, default_value = "30")]
    pub indexing_timeout_secs: u64,
}

impl Settings {
    pub fn from_cli() -> Self {
        Settings::parse()
    }

    pub fn engine_config(&self) -> Config {
        Config {
            poi_queries: self.poi_queries.clone(),
            ..Config::default()
        }
    }

    pub fn dataset_config(&self) -> DatasetConfig {
        let cache_path = self.cache_file.clone().unwrap_or_else(default_cache_path);
        DatasetConfig {
            refresh_interval: Duration::from_secs(
                self.refresh_interval_hours.saturating_mul(60 * 60),
            ),
            ..DatasetConfig::new(self.dataset_url.clone(), cache_path)
        }
    }

    pub fn classifier(&self) -> HazardClassifier {
        HazardClassifier::default()
            .with_keywords(&self.keywords)
            .with_maneuver_types(self.maneuver_types.iter().copied())
    }

    pub fn indexing_timeout(&self) -> Duration {
        Duration::from_secs(self.indexing_timeout_secs)
    }
}

/// Determine a good default dataset cache path for the current user.
/// - On Windows: %APPDATA%/HazardGuide/speed-cameras.json
/// - Else: $HOME/.config/hazard-guide/speed-cameras.json
fn default_cache_path() -> PathBuf {
    if cfg!(windows)
        && let Ok(appdata) = std::env::var("APPDATA")
    {
        return Path::new(&appdata)
            .join("HazardGuide")
            .join("speed-cameras.json");
    }

    if let Ok(home) = std::env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("hazard-guide")
            .join("speed-cameras.json");
    }

    // Fallback to current directory
    Path::new(".").join("hazard-guide-speed-cameras.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::parse_from([
            "hazard-guide",
            "--route",
            "route.json",
            "--cache-file",
            "/tmp/cams.json",
            "--keyword",
            "Blitzer",
            "--maneuver-type",
            "1001",
        ]);

        assert_eq!(settings.route, PathBuf::from("route.json"));
        assert!(settings.track.is_none());
        assert_eq!(settings.speed_kph, 50.0);
        assert_eq!(
            settings.dataset_config().cache_path,
            PathBuf::from("/tmp/cams.json")
        );
        assert!(settings.classifier().matches_text("blitzer ahead"));
        assert!(settings.classifier().matches_text("speed camera"));
        assert!(settings.engine_config().poi_queries.is_empty());
        assert_eq!(
            settings.dataset_config().refresh_interval,
            Duration::from_secs(12 * 60 * 60)
        );
    }

    #[test]
    fn test_poi_and_refresh_flags() {
        let settings = Settings::parse_from([
            "hazard-guide",
            "--route",
            "route.json",
            "--poi-query",
            "speed camera",
            "--poi-query",
            "enforcement",
            "--places",
            "places.json",
            "--refresh-interval-hours",
            "2",
        ]);

        assert_eq!(
            settings.engine_config().poi_queries,
            vec!["speed camera".to_string(), "enforcement".to_string()]
        );
        assert_eq!(settings.places, Some(PathBuf::from("places.json")));
        assert_eq!(
            settings.dataset_config().refresh_interval,
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn test_default_cache_path_is_json() {
        let path = default_cache_path();
        assert_eq!(
            path.extension().and_then(|e| e.to_str()),
            Some("json")
        );
    }
}
