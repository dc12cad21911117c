//! Guide fusion engine: route and vehicle state, "what's next" queries and the
//! background work that keeps hazard guidance current
//!
//! [`GuideEngine`] is a cheap, clonable handle. All state lives behind one `RwLock` that
//! is only ever held for short synchronous sections. Every `set_route`/`clear_route`
//! bumps the route revision; background tasks capture it at launch and publish only if
//! it is still live, so the last route change always wins.

mod classify;
mod fusion;
mod pipeline;

pub use classify::HazardClassifier;
pub use fusion::{merge_hazard_guides, nearest_ahead, next_hazard_guide};
pub use pipeline::{RouteCamera, route_cameras};

use crate::config::Config;
use crate::dataset::DatasetCache;
use crate::providers::{PlaceSearch, RouteProvider};
use crate::route::{Coordinate, Guide, RoutePlan, VehicleState};
use crate::runtime::{self, recover};
use crate::{GuideError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Single-writer engine state
#[derive(Default)]
struct State {
    plan: Option<Arc<RoutePlan>>,
    /// Camera-flagged subset of the plan's own guides
    route_hazards: Vec<Guide>,
    public_hazards: Vec<Guide>,
    poi_hazards: Vec<Guide>,
    /// Guide id -> nearest polyline vertex, cached per route
    route_index: HashMap<String, usize>,
    vehicle: VehicleState,
    revision: u64,
    hazard_revision: u64,
    next_hazard_id: Option<String>,
    next_hazard_limit: Option<u32>,
    limit_task: Option<tokio::task::AbortHandle>,
    recompute_count: u64,
}

impl State {
    fn cancel_limit_lookup(&mut self) {
        if let Some(task) = self.limit_task.take() {
            task.abort();
        }
    }

    fn reset_next_hazard(&mut self) {
        self.cancel_limit_lookup();
        self.next_hazard_id = None;
        self.next_hazard_limit = None;
    }
}

struct Inner {
    config: Config,
    classifier: HazardClassifier,
    dataset: Arc<DatasetCache>,
    place_search: Option<Arc<dyn PlaceSearch>>,
    state: RwLock<State>,
    /// Indexing pipelines in flight
    indexing: AtomicUsize,
    hazard_tx: watch::Sender<u64>,
}

/// Counts an indexing pipeline as in flight for as long as it lives
struct IndexingGuard {
    inner: Arc<Inner>,
}

impl IndexingGuard {
    fn new(inner: Arc<Inner>) -> Self {
        inner.indexing.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for IndexingGuard {
    fn drop(&mut self) {
        self.inner.indexing.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Route guidance fusion engine
#[derive(Clone)]
pub struct GuideEngine {
    inner: Arc<Inner>,
}

impl GuideEngine {
    /// Engine with the default hazard classifier and no place search
    pub fn new(config: Config, dataset: Arc<DatasetCache>) -> Self {
        Self::with_collaborators(config, dataset, HazardClassifier::default(), None)
    }

    pub fn with_collaborators(
        config: Config,
        dataset: Arc<DatasetCache>,
        classifier: HazardClassifier,
        place_search: Option<Arc<dyn PlaceSearch>>,
    ) -> Self {
        let (hazard_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                classifier,
                dataset,
                place_search,
                state: RwLock::new(State::default()),
                indexing: AtomicUsize::new(0),
                hazard_tx,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn dataset(&self) -> &Arc<DatasetCache> {
        &self.inner.dataset
    }

    // === Route lifecycle ===

    /// Install a new route plan and start indexing it. Returns the new route revision.
    ///
    /// Route-native hazards are available immediately; public dataset cameras and POI
    /// hazards arrive once the background work for this revision completes.
    pub fn set_route(&self, plan: RoutePlan) -> u64 {
        let route_hazards = self.inner.classifier.hazard_guides(&plan.guides);
        let plan = Arc::new(plan);

        let revision = {
            let mut state = recover(self.inner.state.write());
            state.revision += 1;
            state.plan = Some(plan.clone());
            state.route_hazards = route_hazards;
            state.public_hazards.clear();
            state.poi_hazards.clear();
            state.route_index.clear();
            // Route guide ids are provider-local and repeat across plans
            state.reset_next_hazard();
            self.hazards_changed(&mut state);
            state.revision
        };

        info!(
            revision,
            vertices = plan.polyline.len(),
            guides = plan.guides.len(),
            "Route set"
        );

        self.launch_indexing(revision, plan);
        self.launch_poi_refresh();
        revision
    }

    /// Drop the active route and everything derived from it
    pub fn clear_route(&self) -> u64 {
        let mut state = recover(self.inner.state.write());
        state.revision += 1;
        state.plan = None;
        state.route_hazards.clear();
        state.public_hazards.clear();
        state.poi_hazards.clear();
        state.route_index.clear();
        state.reset_next_hazard();
        state.hazard_revision += 1;
        self.inner.hazard_tx.send_replace(state.hazard_revision);

        info!(revision = state.revision, "Route cleared");
        state.revision
    }

    /// Fetch a route from `provider` and install it.
    ///
    /// A failed request clears any active route so stale guidance is never shown for a
    /// destination the driver no longer heads to.
    pub async fn request_route(
        &self,
        provider: &dyn RouteProvider,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<u64> {
        let result = provider
            .fetch_route(origin, destination)
            .await
            .and_then(|plan| plan.validate().map(|()| plan));

        match result {
            Ok(plan) => Ok(self.set_route(plan)),
            Err(e) => {
                warn!(error = %e, "Route request failed");
                self.clear_route();
                Err(match e {
                    GuideError::RouteProviderFailed(_) => e,
                    other => GuideError::RouteProviderFailed(other.to_string()),
                })
            }
        }
    }

    // === Vehicle ===

    /// Apply a vehicle update. Returns `false` when the change is below the significance
    /// thresholds and nothing was recomputed.
    ///
    /// Positions near (0, 0) are sensor placeholders and count as unknown.
    pub fn update_vehicle(&self, coordinate: Option<Coordinate>, speed_kph: f64) -> bool {
        let next = VehicleState {
            coordinate: coordinate.filter(Coordinate::is_usable),
            speed_kph,
        };

        let mut state = recover(self.inner.state.write());
        let config = &self.inner.config;
        if !state.vehicle.is_significant_change(
            &next,
            config.min_move_deg,
            config.min_speed_delta_kph,
        ) {
            return false;
        }

        state.vehicle = next;
        state.recompute_count += 1;
        self.refresh_next_hazard(&mut state);
        true
    }

    pub fn vehicle(&self) -> VehicleState {
        recover(self.inner.state.read()).vehicle
    }

    // === Queries ===

    pub fn route_plan(&self) -> Option<Arc<RoutePlan>> {
        recover(self.inner.state.read()).plan.clone()
    }

    /// All hazard guides, deduplicated across sources with route-native guides winning
    pub fn merged_hazard_guides(&self) -> Vec<Guide> {
        let state = recover(self.inner.state.read());
        merge_hazard_guides(
            &state.route_hazards,
            &state.public_hazards,
            &state.poi_hazards,
            self.inner.config.fusion_radius_m,
        )
    }

    /// The turn guide the driver should see next
    pub fn next_guide(&self) -> Option<Guide> {
        let state = recover(self.inner.state.read());
        self.select_next_guide(&state).cloned()
    }

    /// The next hazard along the route
    pub fn next_hazard_guide(&self) -> Option<Guide> {
        // Write lock: selection fills the route-progress cache
        let mut state = recover(self.inner.state.write());
        self.select_next_hazard(&mut state)
    }

    /// Straight-line distance to [`Self::next_guide`], rounded to the meter
    pub fn distance_to_next_guide_meters(&self) -> Option<u32> {
        let state = recover(self.inner.state.read());
        fusion::rounded_distance(state.vehicle.coordinate, self.select_next_guide(&state))
    }

    /// Straight-line distance to [`Self::next_hazard_guide`], rounded to the meter
    pub fn distance_to_next_hazard_meters(&self) -> Option<u32> {
        let mut state = recover(self.inner.state.write());
        let guide = self.select_next_hazard(&mut state);
        fusion::rounded_distance(state.vehicle.coordinate, guide.as_ref())
    }

    /// Speed limit at the next hazard; `None` while the lookup is in flight or unknown
    pub fn next_hazard_speed_limit_kph(&self) -> Option<u32> {
        recover(self.inner.state.read()).next_hazard_limit
    }

    // === Observability ===

    /// Route revision, bumped by every route change
    pub fn revision(&self) -> u64 {
        recover(self.inner.state.read()).revision
    }

    /// Bumped whenever the set of hazard guides changes
    pub fn hazard_revision(&self) -> u64 {
        recover(self.inner.state.read()).hazard_revision
    }

    pub fn subscribe_hazard_revision(&self) -> watch::Receiver<u64> {
        self.inner.hazard_tx.subscribe()
    }

    /// Whether an indexing pipeline is running
    pub fn is_indexing(&self) -> bool {
        self.inner.indexing.load(Ordering::SeqCst) > 0
    }

    /// Number of vehicle updates that passed the significance thresholds
    pub fn recompute_count(&self) -> u64 {
        recover(self.inner.state.read()).recompute_count
    }

    // === Internals ===

    fn select_next_guide<'a>(&self, state: &'a State) -> Option<&'a Guide> {
        let plan = state.plan.as_ref()?;
        nearest_ahead(
            &plan.guides,
            state.vehicle.coordinate,
            self.inner.config.turn_passed_radius_m,
        )
    }

    fn select_next_hazard(&self, state: &mut State) -> Option<Guide> {
        let config = &self.inner.config;
        let merged = merge_hazard_guides(
            &state.route_hazards,
            &state.public_hazards,
            &state.poi_hazards,
            config.fusion_radius_m,
        );
        let polyline = state
            .plan
            .as_ref()
            .map(|plan| plan.polyline.as_slice())
            .unwrap_or_default();

        next_hazard_guide(
            &merged,
            polyline,
            state.vehicle.coordinate,
            &mut state.route_index,
            config.vertex_slack,
            config.hazard_passed_radius_m,
        )
        .cloned()
    }

    /// Re-select the next hazard and, if it changed, restart the speed limit lookup
    fn refresh_next_hazard(&self, state: &mut State) {
        let next = self.select_next_hazard(state);
        let next_id = next.as_ref().map(|guide| guide.id.clone());
        if next_id == state.next_hazard_id {
            return;
        }

        state.cancel_limit_lookup();
        state.next_hazard_id = next_id;
        state.next_hazard_limit = None;

        let Some(guide) = next else {
            return;
        };
        if !runtime::in_runtime_context() {
            debug!(hazard = %guide.id, "No async runtime; skipping speed limit lookup");
            return;
        }

        debug!(hazard = %guide.id, "Next hazard changed; looking up speed limit");
        let engine = self.clone();
        let revision = state.revision;
        let task = runtime::spawn(async move {
            engine.resolve_speed_limit(revision, guide).await;
        });
        state.limit_task = Some(task.abort_handle());
    }

    async fn resolve_speed_limit(&self, revision: u64, guide: Guide) {
        let dataset = self.inner.dataset.clone();
        let coordinate = guide.coordinate;
        let radius = self.inner.config.limit_lookup_radius_m;

        let limit =
            match runtime::spawn_blocking(move || dataset.lookup_limit(coordinate, radius)).await
            {
                Ok(limit) => limit,
                Err(e) => {
                    warn!(hazard = %guide.id, error = %e, "Speed limit lookup failed");
                    return;
                }
            };

        let mut state = recover(self.inner.state.write());
        if state.revision != revision || state.next_hazard_id.as_deref() != Some(guide.id.as_str())
        {
            debug!(hazard = %guide.id, "Next hazard moved on; dropping speed limit");
            return;
        }
        state.next_hazard_limit = limit;
        state.limit_task = None;
        debug!(hazard = %guide.id, limit, "Resolved next hazard speed limit");
    }
}
