//! Route plan, guide and vehicle data model

use crate::{GuideError, Result};
use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Coordinates within this many degrees of (0, 0) are sensor placeholders (~1 m)
const UNKNOWN_EPSILON_DEG: f64 = 1e-5;

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and inside the WGS84 latitude/longitude ranges
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }

    /// A fix at (0, 0) is what most GPS stacks report before they have a position
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.lat.abs() < UNKNOWN_EPSILON_DEG && self.lon.abs() < UNKNOWN_EPSILON_DEG
    }

    /// Valid and not a placeholder
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.is_valid() && !self.is_unknown()
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.lon, c.lat)
    }
}

impl From<geo::Point<f64>> for Coordinate {
    fn from(p: geo::Point<f64>) -> Self {
        Coordinate::new(p.y(), p.x())
    }
}

/// Where a guide came from. Ordering is precedence: `Route` wins over `Public`, which
/// wins over `Poi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GuideSource {
    Poi,
    Public,
    Route,
}

impl GuideSource {
    pub const PUBLIC_PREFIX: &'static str = "public:";
    pub const POI_PREFIX: &'static str = "poi:";

    /// Provenance is encoded in the guide id prefix
    pub fn from_id(id: &str) -> Self {
        if id.starts_with(Self::PUBLIC_PREFIX) {
            Self::Public
        } else if id.starts_with(Self::POI_PREFIX) {
            Self::Poi
        } else {
            Self::Route
        }
    }

    /// Build a source-qualified id from a raw id
    pub fn qualify(&self, raw_id: &str) -> String {
        match self {
            Self::Route => raw_id.to_string(),
            Self::Public => format!("{}{raw_id}", Self::PUBLIC_PREFIX),
            Self::Poi => format!("{}{raw_id}", Self::POI_PREFIX),
        }
    }
}

/// A single annotation along a route: a turn instruction or a hazard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub narrative: String,
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maneuver_type: Option<i32>,
}

impl Guide {
    pub fn source(&self) -> GuideSource {
        GuideSource::from_id(&self.id)
    }
}

/// A fetched route. Immutable once built; a new request replaces it wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    #[serde(default)]
    pub polyline: Vec<Coordinate>,
    #[serde(default)]
    pub guides: Vec<Guide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance_meters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_seconds: Option<u32>,
}

impl RoutePlan {
    /// Parse a route plan from JSON, rejecting out-of-range geometry
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let plan: RoutePlan = serde_json::from_slice(bytes)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check that every polyline vertex and guide position is a valid coordinate
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.polyline.iter().position(|c| !c.is_valid()) {
            return Err(GuideError::GeometryUndefined(format!(
                "polyline vertex {index} is out of range"
            )));
        }
        if let Some(guide) = self.guides.iter().find(|g| !g.coordinate.is_valid()) {
            return Err(GuideError::GeometryUndefined(format!(
                "guide {} has an out-of-range coordinate",
                guide.id
            )));
        }
        Ok(())
    }
}

/// Latest known vehicle position and speed
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleState {
    pub coordinate: Option<Coordinate>,
    pub speed_kph: f64,
}

impl VehicleState {
    /// Whether moving to `next` is worth a recomputation.
    ///
    /// A move counts when the combined lat+lon delta reaches `min_move_deg`, when the
    /// position appears or disappears, or when the speed changes by `min_speed_delta_kph`.
    pub fn is_significant_change(
        &self,
        next: &VehicleState,
        min_move_deg: f64,
        min_speed_delta_kph: f64,
    ) -> bool {
        let moved = match (self.coordinate, next.coordinate) {
            (Some(a), Some(b)) => (a.lat - b.lat).abs() + (a.lon - b.lon).abs() >= min_move_deg,
            (None, None) => false,
            _ => true,
        };
        moved || (self.speed_kph - next.speed_kph).abs() >= min_speed_delta_kph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(37.5, 127.0).is_usable());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 10.0).is_valid());

        let placeholder = Coordinate::new(0.000001, -0.000002);
        assert!(placeholder.is_valid());
        assert!(placeholder.is_unknown());
        assert!(!placeholder.is_usable());
    }

    #[test]
    fn test_guide_source_precedence() {
        assert_eq!(GuideSource::from_id("12"), GuideSource::Route);
        assert_eq!(GuideSource::from_id("public:12"), GuideSource::Public);
        assert_eq!(GuideSource::from_id("poi:abc"), GuideSource::Poi);

        assert!(GuideSource::Route > GuideSource::Public);
        assert!(GuideSource::Public > GuideSource::Poi);
        assert_eq!(GuideSource::Public.qualify("7"), "public:7");
    }

    #[test]
    fn test_route_plan_from_json() {
        let json = br#"{
            "polyline": [{"lat": 37.5, "lon": 127.0}, {"lat": 37.501, "lon": 127.001}],
            "guides": [{
                "id": "g1",
                "label": "Turn right",
                "narrative": "Turn right onto Teheran-ro",
                "coordinate": {"lat": 37.501, "lon": 127.001},
                "maneuverType": 13
            }],
            "totalDistanceMeters": 140
        }"#;

        let plan = RoutePlan::from_json(json).unwrap();
        assert_eq!(plan.polyline.len(), 2);
        assert_eq!(plan.guides[0].maneuver_type, Some(13));
        assert_eq!(plan.total_distance_meters, Some(140));
        assert_eq!(plan.total_duration_seconds, None);
    }

    #[test]
    fn test_route_plan_rejects_invalid_geometry() {
        let json = br#"{"polyline": [{"lat": 137.5, "lon": 127.0}]}"#;
        let result = RoutePlan::from_json(json);
        assert!(matches!(result, Err(GuideError::GeometryUndefined(_))));
    }

    #[test]
    fn test_vehicle_significance() {
        let base = VehicleState {
            coordinate: Some(Coordinate::new(37.5, 127.0)),
            speed_kph: 50.0,
        };

        let tiny_move = VehicleState {
            coordinate: Some(Coordinate::new(37.50001, 127.0)),
            speed_kph: 50.1,
        };
        assert!(!base.is_significant_change(&tiny_move, 2e-5, 0.3));

        let real_move = VehicleState {
            coordinate: Some(Coordinate::new(37.50002, 127.00001)),
            speed_kph: 50.0,
        };
        assert!(base.is_significant_change(&real_move, 2e-5, 0.3));

        let speed_change = VehicleState {
            coordinate: base.coordinate,
            speed_kph: 50.5,
        };
        assert!(base.is_significant_change(&speed_change, 2e-5, 0.3));

        let lost_fix = VehicleState {
            coordinate: None,
            speed_kph: 50.0,
        };
        assert!(base.is_significant_change(&lost_fix, 2e-5, 0.3));
    }
}
