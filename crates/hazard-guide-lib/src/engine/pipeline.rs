//! Background work launched by route changes
//!
//! The indexing pipeline matches public dataset cameras to the route; the POI refresh
//! turns place-search hits into hazards. Both capture the route revision when they start
//! and publish only if it is still live, all-or-nothing.

use super::{GuideEngine, IndexingGuard, State};
use crate::grid::HazardRecord;
use crate::polyline;
use crate::providers::PlaceCandidate;
use crate::route::{Coordinate, Guide, GuideSource, RoutePlan};
use crate::runtime::{self, recover};
use crate::utils;
use crate::{GuideError, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A dataset camera matched to the route
#[derive(Clone, Debug, PartialEq)]
pub struct RouteCamera {
    pub record: HazardRecord,
    /// Route-progress index (nearest polyline vertex)
    pub vertex_index: usize,
}

/// Keep the cameras that lie inside the route corridor, ordered along the route.
///
/// Survivors are sorted by `(vertex_index, id)`. A camera within `dedup_radius_m` of the
/// previously accepted one is a duplicate of it and is dropped.
pub fn route_cameras(
    candidates: Vec<HazardRecord>,
    polyline: &[Coordinate],
    corridor_width_m: f64,
    dedup_radius_m: f64,
) -> Vec<RouteCamera> {
    profiling::scope!("route_cameras");

    let mut survivors: Vec<RouteCamera> = candidates
        .into_par_iter()
        .filter_map(|record| {
            let distance = polyline::distance_to_route(record.coordinate, polyline)?;
            if distance > corridor_width_m {
                return None;
            }
            let vertex_index = polyline::nearest_vertex_index(record.coordinate, polyline)?;
            Some(RouteCamera {
                record,
                vertex_index,
            })
        })
        .collect();

    survivors.sort_by(|a, b| {
        a.vertex_index
            .cmp(&b.vertex_index)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    let mut accepted: Vec<RouteCamera> = Vec::with_capacity(survivors.len());
    for camera in survivors {
        if let Some(last) = accepted.last()
            && utils::distance_meters(last.record.coordinate, camera.record.coordinate)
                <= dedup_radius_m
        {
            continue;
        }
        accepted.push(camera);
    }
    accepted
}

fn public_guide(camera: &RouteCamera) -> Guide {
    let narrative = match camera.record.speed_limit_kph {
        Some(limit) => format!("Speed camera ahead, limit {limit} km/h"),
        None => "Speed camera ahead".to_string(),
    };
    Guide {
        id: GuideSource::Public.qualify(&camera.record.id),
        label: "Speed camera".to_string(),
        narrative,
        coordinate: camera.record.coordinate,
        distance_meters: None,
        duration_seconds: None,
        maneuver_type: None,
    }
}

fn poi_guide(candidate: &PlaceCandidate) -> Guide {
    Guide {
        id: GuideSource::Poi.qualify(&candidate.id),
        label: candidate.name.clone(),
        narrative: "Enforcement point reported by place search".to_string(),
        coordinate: candidate.coordinate,
        distance_meters: None,
        duration_seconds: None,
        maneuver_type: None,
    }
}

impl GuideEngine {
    /// Spawn the indexing pipeline for `plan` at `revision`
    pub(super) fn launch_indexing(&self, revision: u64, plan: Arc<RoutePlan>) {
        if !runtime::in_runtime_context() {
            warn!(revision, "No async runtime; public cameras will not be indexed");
            return;
        }

        let guard = IndexingGuard::new(self.inner.clone());
        let engine = self.clone();
        runtime::spawn(async move {
            let _guard = guard;
            engine.run_indexing(revision, plan).await;
        });
    }

    async fn run_indexing(&self, revision: u64, plan: Arc<RoutePlan>) {
        let dataset = self.inner.dataset.clone();
        let config = &self.inner.config;

        dataset.prewarm();
        if dataset.record_count() == 0
            && let Err(e) = dataset.refresh_from_backend_if_needed(true).await
        {
            warn!(revision, error = %e, "Camera dataset refresh failed; indexing with cached data");
        }

        let Some(bounds) = polyline::bounding_box(&plan.polyline, config.bbox_margin_m) else {
            debug!(revision, "Route has no polyline; publishing no public cameras");
            self.publish_public(revision, Vec::new(), Vec::new());
            return;
        };

        let candidates = dataset.cameras(&bounds);
        let candidate_count = candidates.len();
        let corridor_width_m = config.corridor_width_m;
        let dedup_radius_m = config.dedup_radius_m;
        let task_plan = plan.clone();
        let cameras = match runtime::spawn_blocking(move || {
            route_cameras(
                candidates,
                &task_plan.polyline,
                corridor_width_m,
                dedup_radius_m,
            )
        })
        .await
        {
            Ok(cameras) => cameras,
            Err(e) => {
                warn!(revision, error = %e, "Route camera indexing task failed");
                return;
            }
        };

        debug!(
            revision,
            candidates = candidate_count,
            on_route = cameras.len(),
            "Matched dataset cameras to route"
        );

        let indices = cameras
            .iter()
            .map(|c| (GuideSource::Public.qualify(&c.record.id), c.vertex_index))
            .collect();
        let guides = cameras.iter().map(public_guide).collect();
        self.publish_public(revision, guides, indices);
    }

    /// Install pipeline results if `revision` is still live
    fn publish_public(
        &self,
        revision: u64,
        guides: Vec<Guide>,
        indices: Vec<(String, usize)>,
    ) -> bool {
        let mut state = recover(self.inner.state.write());
        if state.revision != revision {
            debug!(
                revision,
                live = state.revision,
                "Discarding stale indexing results"
            );
            return false;
        }

        let count = guides.len();
        state.public_hazards = guides;
        state.route_index.extend(indices);
        self.hazards_changed(&mut state);
        info!(revision, cameras = count, "Published public dataset cameras");
        true
    }

    /// Spawn a POI refresh when place search is configured
    pub(super) fn launch_poi_refresh(&self) {
        if !self.poi_enabled() || !runtime::in_runtime_context() {
            return;
        }
        let engine = self.clone();
        runtime::spawn(async move {
            if let Err(e) = engine.refresh_poi().await {
                warn!(error = %e, "POI hazard refresh failed");
            }
        });
    }

    fn poi_enabled(&self) -> bool {
        self.inner.place_search.is_some() && !self.inner.config.poi_queries.is_empty()
    }

    /// Search for enforcement points along the active route and publish them as `poi:`
    /// hazards.
    ///
    /// Candidates must match the hazard keywords by name and lie inside the route
    /// corridor. Searches are biased towards the vehicle, or the route start when the
    /// position is unknown. Returns the number of hazards published; zero when nothing is
    /// configured, no route is active, or the route changed during the search.
    pub async fn refresh_poi(&self) -> Result<usize> {
        let Some(search) = self.inner.place_search.clone() else {
            return Ok(0);
        };
        let config = &self.inner.config;
        if config.poi_queries.is_empty() {
            return Ok(0);
        }

        let (revision, plan, vehicle) = {
            let state = recover(self.inner.state.read());
            match &state.plan {
                Some(plan) => (state.revision, plan.clone(), state.vehicle.coordinate),
                None => return Ok(0),
            }
        };
        let near = vehicle.or_else(|| plan.polyline.first().copied());

        let mut seen = HashSet::new();
        let mut guides = Vec::new();
        for query in &config.poi_queries {
            let candidates = search.search_places(query, near).await.map_err(|e| {
                warn!(query = %query, error = %e, "Place search failed");
                match e {
                    GuideError::PlaceSearchFailed(_) => e,
                    other => GuideError::PlaceSearchFailed(other.to_string()),
                }
            })?;

            for candidate in candidates {
                if !candidate.coordinate.is_usable()
                    || !self.inner.classifier.matches_text(&candidate.name)
                {
                    continue;
                }
                let on_route = polyline::distance_to_route(candidate.coordinate, &plan.polyline)
                    .is_some_and(|d| d <= config.corridor_width_m);
                if on_route && seen.insert(candidate.id.clone()) {
                    guides.push(poi_guide(&candidate));
                }
            }
        }

        let count = guides.len();
        let mut state = recover(self.inner.state.write());
        if state.revision != revision {
            debug!(revision, live = state.revision, "Discarding stale POI results");
            return Ok(0);
        }
        state.poi_hazards = guides;
        self.hazards_changed(&mut state);
        info!(revision, hazards = count, "Published POI hazards");
        Ok(count)
    }

    /// Bump the hazard revision, notify subscribers and re-select the next hazard
    pub(super) fn hazards_changed(&self, state: &mut State) {
        state.hazard_revision += 1;
        self.inner.hazard_tx.send_replace(state.hazard_revision);
        self.refresh_next_hazard(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, lat: f64, lon: f64) -> HazardRecord {
        HazardRecord {
            id: id.to_string(),
            coordinate: Coordinate::new(lat, lon),
            speed_limit_kph: Some(60),
        }
    }

    fn diagonal_route() -> Vec<Coordinate> {
        vec![
            Coordinate::new(37.50, 127.00),
            Coordinate::new(37.501, 127.001),
            Coordinate::new(37.502, 127.002),
        ]
    }

    #[test]
    fn test_clustered_cameras_keep_first_in_order() {
        let candidates = vec![
            record("b", 37.50002, 127.00002),
            record("a", 37.50000, 127.00000),
        ];

        let cameras = route_cameras(candidates, &diagonal_route(), 180.0, 28.0);
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].record.id, "a");
        assert_eq!(cameras[0].vertex_index, 0);
    }

    #[test]
    fn test_corridor_filter_and_route_order() {
        let candidates = vec![
            record("late", 37.5019, 127.0021),
            record("off-route", 37.51, 127.0),      // ~1 km away
            record("early", 37.5002, 127.0001),
            record("mid", 37.501, 127.0012),
        ];

        let cameras = route_cameras(candidates, &diagonal_route(), 180.0, 28.0);
        let ids: Vec<_> = cameras.iter().map(|c| c.record.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "mid", "late"]);
        let indices: Vec<_> = cameras.iter().map(|c| c.vertex_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_no_cameras_without_polyline() {
        let cameras = route_cameras(vec![record("a", 37.5, 127.0)], &[], 180.0, 28.0);
        assert!(cameras.is_empty());
    }

    #[test]
    fn test_public_guide_mapping() {
        let camera = RouteCamera {
            record: record("11-0001", 37.5, 127.0),
            vertex_index: 3,
        };
        let guide = public_guide(&camera);
        assert_eq!(guide.id, "public:11-0001");
        assert_eq!(guide.source(), GuideSource::Public);
        assert!(guide.narrative.contains("60 km/h"));
    }
}
