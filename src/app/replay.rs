//! Drive a [`GuideEngine`] with a recorded track and log the guidance it produces

use super::places::PlacesFile;
use super::{AppError, Settings};
use hazard_guide_lib::{Coordinate, DatasetCache, GuideEngine, PlaceSearch, RoutePlan, utils};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One vehicle update
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub coordinate: Coordinate,
    pub speed_kph: f64,
}

/// What a replay saw
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplaySummary {
    pub samples: usize,
    /// Samples past the engine's significance thresholds
    pub accepted: usize,
    /// Hazard guides known after indexing
    pub hazards: usize,
    /// Distinct hazards that became "next" during the replay, in order
    pub announced: Vec<String>,
}

pub async fn run(settings: Settings) -> Result<ReplaySummary, AppError> {
    let plan = RoutePlan::from_json(&std::fs::read(&settings.route)?)?;
    let samples = match &settings.track {
        Some(path) => read_track(path, settings.speed_kph)?,
        None => route_samples(&plan, settings.speed_kph),
    };
    if samples.is_empty() {
        return Err(AppError::EmptyTrack);
    }

    let dataset = Arc::new(DatasetCache::with_reqwest(settings.dataset_config())?);
    if settings.force_refresh {
        match dataset.refresh_from_backend_if_needed(true).await {
            Ok(outcome) => info!(?outcome, "Camera dataset refreshed"),
            Err(e) => warn!(error = %e, "Forced dataset refresh failed; using cached data"),
        }
    }
    dataset.prewarm();

    let place_search: Option<Arc<dyn PlaceSearch>> = match &settings.places {
        Some(path) => Some(Arc::new(PlacesFile::load(path)?)),
        None => None,
    };
    let has_queries = !settings.poi_queries.is_empty();
    let poi_enabled = place_search.is_some() && has_queries;
    if !poi_enabled && (place_search.is_some() || has_queries) {
        warn!("POI hazards need both --poi-query and --places; skipping them");
    }

    let engine = GuideEngine::with_collaborators(
        settings.engine_config(),
        dataset,
        settings.classifier(),
        place_search,
    );
    let revision = engine.set_route(plan);
    wait_for_indexing(&engine, settings.indexing_timeout()).await;
    if poi_enabled {
        // The refresh started by set_route may still be searching
        match engine.refresh_poi().await {
            Ok(count) => debug!(count, "POI hazards ready"),
            Err(e) => warn!(error = %e, "POI hazard refresh failed"),
        }
    }

    let hazards = engine.merged_hazard_guides();
    info!(
        revision,
        hazards = hazards.len(),
        cameras_in_dataset = engine.dataset().record_count(),
        "Route indexed"
    );

    let mut summary = ReplaySummary {
        samples: samples.len(),
        hazards: hazards.len(),
        ..ReplaySummary::default()
    };

    for sample in samples {
        if !engine.update_vehicle(Some(sample.coordinate), sample.speed_kph) {
            continue;
        }
        summary.accepted += 1;
        // Let the speed limit lookup run
        tokio::task::yield_now().await;

        let next_guide = engine.next_guide();
        let next_hazard = engine.next_hazard_guide();
        if let Some(hazard) = &next_hazard
            && summary.announced.last() != Some(&hazard.id)
        {
            summary.announced.push(hazard.id.clone());
        }

        info!(
            lat = sample.coordinate.lat,
            lon = sample.coordinate.lon,
            speed_kph = sample.speed_kph,
            next_guide = next_guide.as_ref().map(|g| g.label.as_str()),
            guide_m = engine.distance_to_next_guide_meters(),
            next_hazard = next_hazard.as_ref().map(|g| g.id.as_str()),
            hazard_m = engine.distance_to_next_hazard_meters(),
            limit_kph = engine.next_hazard_speed_limit_kph(),
            "Guidance"
        );
    }

    info!(
        samples = summary.samples,
        accepted = summary.accepted,
        hazards = summary.hazards,
        announced = summary.announced.len(),
        "Replay finished"
    );
    Ok(summary)
}

async fn wait_for_indexing(engine: &GuideEngine, timeout: Duration) {
    let mut hazards = engine.subscribe_hazard_revision();
    let waited = tokio::time::timeout(timeout, async {
        while engine.is_indexing() {
            // Wake on publication, with a poll as backstop for discarded runs
            let _ = tokio::time::timeout(Duration::from_millis(50), hazards.changed()).await;
        }
    })
    .await;

    if waited.is_err() {
        warn!(?timeout, "Route indexing still running; replaying with partial hazards");
    }
}

/// Vehicle samples from a GPX file.
///
/// Speed comes from the timestamps of consecutive points when both carry one, otherwise
/// the last known speed is kept (starting at `default_speed_kph`).
pub fn read_track(path: &Path, default_speed_kph: f64) -> Result<Vec<Sample>, AppError> {
    profiling::scope!("read_track");
    let reader = BufReader::new(std::fs::File::open(path)?);
    let gpx = gpx::read(reader)?;

    let mut samples = Vec::new();
    let mut previous: Option<(Coordinate, Option<time::OffsetDateTime>)> = None;
    let mut speed_kph = default_speed_kph;

    let waypoints = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points);

    for waypoint in waypoints {
        let coordinate = Coordinate::from(waypoint.point());
        if !coordinate.is_usable() {
            warn!(lat = coordinate.lat, lon = coordinate.lon, "Skipping invalid track point");
            continue;
        }
        let timestamp = waypoint.time.clone().map(time::OffsetDateTime::from);

        if let Some((last, Some(last_time))) = previous
            && let Some(now) = timestamp
        {
            let seconds = (now - last_time).as_seconds_f64();
            if seconds > 0.0 {
                speed_kph = utils::distance_meters(last, coordinate) / seconds * 3.6;
            }
        }

        samples.push(Sample {
            coordinate,
            speed_kph,
        });
        previous = Some((coordinate, timestamp));
    }

    debug!(path = %path.display(), samples = samples.len(), "Track loaded");
    Ok(samples)
}

/// Drive the route polyline vertex by vertex at a constant speed
pub fn route_samples(plan: &RoutePlan, speed_kph: f64) -> Vec<Sample> {
    plan.polyline
        .iter()
        .filter(|c| c.is_usable())
        .map(|&coordinate| Sample {
            coordinate,
            speed_kph,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="37.500" lon="127.0"><time>2026-10-01T08:00:00Z</time></trkpt>
    <trkpt lat="37.501" lon="127.0"><time>2026-10-01T08:00:10Z</time></trkpt>
    <trkpt lat="37.502" lon="127.0"></trkpt>
  </trkseg></trk>
</gpx>"#;

    fn write_route(dir: &TempDir) -> std::path::PathBuf {
        let route = serde_json::json!({
            "polyline": (0..10)
                .map(|i| serde_json::json!({"lat": 37.5 + i as f64 * 0.001, "lon": 127.0}))
                .collect::<Vec<_>>(),
            "guides": [
                {"id": "1", "label": "Turn right", "coordinate": {"lat": 37.509, "lon": 127.0}}
            ]
        });
        let path = dir.path().join("route.json");
        std::fs::write(&path, serde_json::to_vec(&route).unwrap()).unwrap();
        path
    }

    fn write_dataset(dir: &TempDir) -> std::path::PathBuf {
        let dataset = serde_json::json!({
            "schemaVersion": 1,
            "source": "test",
            "updatedAt": "2026-10-01",
            "count": 1,
            "records": [{"id": "cam-1", "lat": 37.5045, "lon": 127.0001, "limitKph": 60}]
        });
        let path = dir.path().join("cameras.json");
        std::fs::write(&path, serde_json::to_vec(&dataset).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_read_track_derives_speed_from_timestamps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.gpx");
        std::fs::write(&path, TRACK).unwrap();

        let samples = read_track(&path, 50.0).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].speed_kph, 50.0);
        // ~111 m in 10 s
        assert!((samples[1].speed_kph - 40.0).abs() < 0.5);
        // No timestamp: keep the last speed
        assert_eq!(samples[2].speed_kph, samples[1].speed_kph);
    }

    #[test]
    fn test_route_samples_follow_polyline() {
        let plan = RoutePlan {
            polyline: vec![Coordinate::new(37.5, 127.0), Coordinate::new(37.51, 127.0)],
            ..RoutePlan::default()
        };
        let samples = route_samples(&plan, 30.0);
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.speed_kph == 30.0));
    }

    #[tokio::test]
    async fn test_replay_announces_cached_camera() {
        let dir = TempDir::new().unwrap();
        let route = write_route(&dir);
        let cache = write_dataset(&dir);

        let settings = Settings::parse_from([
            "hazard-guide".to_string(),
            "--route".to_string(),
            route.display().to_string(),
            "--cache-file".to_string(),
            cache.display().to_string(),
            // Nothing listens on the discard port; the cached copy is used
            "--dataset-url".to_string(),
            "http://127.0.0.1:9/cameras.json".to_string(),
            "--indexing-timeout-secs".to_string(),
            "5".to_string(),
        ]);

        let summary = run(settings).await.unwrap();
        assert_eq!(summary.samples, 10);
        assert_eq!(summary.accepted, 10);
        assert_eq!(summary.hazards, 1);
        assert_eq!(summary.announced, vec!["public:cam-1".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_announces_poi_camera() {
        let dir = TempDir::new().unwrap();
        let route = write_route(&dir);
        let cache = dir.path().join("cameras.json");
        let places = dir.path().join("places.json");
        let candidates = serde_json::json!([
            {"id": "p1", "name": "Speed camera", "coordinate": {"lat": 37.506, "lon": 127.0001}},
            {"id": "p2", "name": "Gas station", "coordinate": {"lat": 37.503, "lon": 127.0}}
        ]);
        std::fs::write(&places, serde_json::to_vec(&candidates).unwrap()).unwrap();

        let settings = Settings::parse_from([
            "hazard-guide".to_string(),
            "--route".to_string(),
            route.display().to_string(),
            "--cache-file".to_string(),
            cache.display().to_string(),
            "--dataset-url".to_string(),
            "http://127.0.0.1:9/cameras.json".to_string(),
            "--poi-query".to_string(),
            "speed".to_string(),
            "--places".to_string(),
            places.display().to_string(),
            "--indexing-timeout-secs".to_string(),
            "5".to_string(),
        ]);

        let summary = run(settings).await.unwrap();
        assert_eq!(summary.hazards, 1);
        assert_eq!(summary.announced, vec!["poi:p1".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_rejects_missing_route() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::parse_from([
            "hazard-guide".to_string(),
            "--route".to_string(),
            dir.path().join("missing.json").display().to_string(),
        ]);

        assert!(matches!(run(settings).await, Err(AppError::Io(_))));
    }
}
