//! Contracts of the external collaborators the engine talks to
//!
//! The routing provider and the place search service are black boxes owned by the host
//! application. They are consumed through object-safe traits so the engine can hold them
//! behind `Arc<dyn ...>` and tests can substitute in-memory fakes.

use crate::Result;
use crate::route::{Coordinate, RoutePlan};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by collaborator traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turn-by-turn routing provider
pub trait RouteProvider: Send + Sync {
    /// Fetch a route between two points. Polylines are expected to be simplified to a
    /// bounded number of vertices by the provider.
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> BoxFuture<'_, Result<RoutePlan>>;
}

/// A place returned by the search service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
}

/// Free-text place search
pub trait PlaceSearch: Send + Sync {
    /// Search for places matching `query`, optionally biased towards `near`
    fn search_places<'a>(
        &'a self,
        query: &'a str,
        near: Option<Coordinate>,
    ) -> BoxFuture<'a, Result<Vec<PlaceCandidate>>>;
}
