//! Offline place search backed by a JSON file of candidates

use super::AppError;
use hazard_guide_lib::{BoxFuture, Coordinate, PlaceCandidate, PlaceSearch, utils};
use std::path::Path;

/// Answers place searches from a fixed list, e.g. an export of a POI database
#[derive(Debug, Default)]
pub struct PlacesFile {
    places: Vec<PlaceCandidate>,
}

impl PlacesFile {
    /// Load a JSON array of `{id, name, coordinate: {lat, lon}}` objects
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let places: Vec<PlaceCandidate> = serde_json::from_slice(&std::fs::read(path)?)?;
        tracing::debug!(path = %path.display(), places = places.len(), "Places loaded");
        Ok(Self { places })
    }

    /// Places whose name contains `query` (case-insensitive), nearest to `near` first
    pub fn matching(&self, query: &str, near: Option<Coordinate>) -> Vec<PlaceCandidate> {
        let query = query.to_lowercase();
        let mut hits: Vec<PlaceCandidate> = self
            .places
            .iter()
            .filter(|place| place.name.to_lowercase().contains(&query))
            .cloned()
            .collect();

        if let Some(near) = near {
            hits.sort_by(|a, b| {
                utils::distance_meters(near, a.coordinate)
                    .total_cmp(&utils::distance_meters(near, b.coordinate))
            });
        }
        hits
    }
}

impl PlaceSearch for PlacesFile {
    fn search_places<'a>(
        &'a self,
        query: &'a str,
        near: Option<Coordinate>,
    ) -> BoxFuture<'a, hazard_guide_lib::Result<Vec<PlaceCandidate>>> {
        Box::pin(async move { Ok(self.matching(query, near)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_matching_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "far", "name": "Speed Camera (north)", "coordinate": {"lat": 37.6, "lon": 127.0}},
                {"id": "cafe", "name": "Cafe", "coordinate": {"lat": 37.5, "lon": 127.0}},
                {"id": "near", "name": "speed camera", "coordinate": {"lat": 37.51, "lon": 127.0}}
            ]"#,
        )
        .unwrap();

        let places = PlacesFile::load(&path).unwrap();
        let ids = |hits: Vec<PlaceCandidate>| hits.into_iter().map(|p| p.id).collect::<Vec<_>>();

        assert_eq!(ids(places.matching("SPEED", None)), vec!["far", "near"]);
        assert_eq!(
            ids(places.matching("speed", Some(Coordinate::new(37.5, 127.0)))),
            vec!["near", "far"]
        );
        assert!(places.matching("fuel", None).is_empty());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(PlacesFile::load(&path), Err(AppError::Json(_))));
    }
}
