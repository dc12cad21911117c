//! Geometric primitives for distances, segment projection and bounding boxes
//!
//! All functions are pure. Bounds are expressed as a [`Rect`] whose `x` axis is longitude
//! and `y` axis is latitude, both in degrees.

use crate::route::Coordinate;
use geo::{Coord, Rect};

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Approximate meters per degree of latitude
pub const METERS_PER_DEGREE_LAT: f64 = 111_000.0;

/// Great-circle distance between two coordinates in meters (haversine formula)
#[inline]
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Perpendicular distance in meters from `point` to the segment `[start, end]`.
///
/// Uses a local equirectangular projection centred on the segment start, which is
/// accurate at sub-100km scale. The projection parameter is clamped to `[0, 1]` so the
/// result is the distance to the nearest point of the segment, never of its extension.
pub fn project_onto_segment(point: Coordinate, start: Coordinate, end: Coordinate) -> f64 {
    let meters_per_lon = METERS_PER_DEGREE_LAT * start.lat.to_radians().cos();

    let px = (point.lon - start.lon) * meters_per_lon;
    let py = (point.lat - start.lat) * METERS_PER_DEGREE_LAT;
    let ex = (end.lon - start.lon) * meters_per_lon;
    let ey = (end.lat - start.lat) * METERS_PER_DEGREE_LAT;

    let length_sq = ex * ex + ey * ey;
    if length_sq <= f64::EPSILON {
        // Degenerate segment
        return (px * px + py * py).sqrt();
    }

    let t = ((px * ex + py * ey) / length_sq).clamp(0.0, 1.0);
    let dx = px - t * ex;
    let dy = py - t * ey;
    (dx * dx + dy * dy).sqrt()
}

/// Bounding box of `points` expanded by `margin_meters` on every side.
///
/// Returns `None` for an empty point set.
pub fn bounding_box(points: &[Coordinate], margin_meters: f64) -> Option<Rect<f64>> {
    let first = points.first()?;

    let mut min_lat = first.lat;
    let mut max_lat = first.lat;
    let mut min_lon = first.lon;
    let mut max_lon = first.lon;

    for point in &points[1..] {
        min_lat = min_lat.min(point.lat);
        max_lat = max_lat.max(point.lat);
        min_lon = min_lon.min(point.lon);
        max_lon = max_lon.max(point.lon);
    }

    let center_lat = (min_lat + max_lat) / 2.0;
    let lat_margin = margin_meters / METERS_PER_DEGREE_LAT;
    // Clamp the cosine so a box touching a pole does not explode
    let meters_per_lon = METERS_PER_DEGREE_LAT * center_lat.to_radians().cos().max(1e-6);
    let lon_margin = margin_meters / meters_per_lon;

    Some(Rect::new(
        Coord {
            x: min_lon - lon_margin,
            y: min_lat - lat_margin,
        },
        Coord {
            x: max_lon + lon_margin,
            y: max_lat + lat_margin,
        },
    ))
}

/// Check whether `bounds` contains `coordinate`, edges included
#[inline]
pub fn bounds_contains(bounds: &Rect<f64>, coordinate: Coordinate) -> bool {
    let min = bounds.min();
    let max = bounds.max();
    coordinate.lon >= min.x
        && coordinate.lon <= max.x
        && coordinate.lat >= min.y
        && coordinate.lat <= max.y
}
