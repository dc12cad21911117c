//! Projection of points onto a route polyline
//!
//! The route-progress index of a point is the index of the polyline vertex nearest to
//! it. It is a coarse "how far along the route" measure, good enough to order hazards
//! and to tell whether one is still ahead of the vehicle.

use crate::route::Coordinate;
use crate::utils;
use geo::Rect;

/// Index of the vertex nearest to `point`; ties keep the smallest index.
///
/// Returns `None` for an empty polyline.
pub fn nearest_vertex_index(point: Coordinate, polyline: &[Coordinate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, vertex) in polyline.iter().enumerate() {
        let distance = utils::distance_meters(point, *vertex);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

/// Minimum distance from `point` to any segment of the polyline.
///
/// Returns `None` when the polyline has fewer than two vertices.
pub fn min_distance_to_segments(point: Coordinate, polyline: &[Coordinate]) -> Option<f64> {
    polyline
        .windows(2)
        .map(|pair| utils::project_onto_segment(point, pair[0], pair[1]))
        .reduce(f64::min)
}

/// Distance from `point` to the polyline: segment distance when there are segments,
/// otherwise the distance to the single vertex.
pub fn distance_to_route(point: Coordinate, polyline: &[Coordinate]) -> Option<f64> {
    match polyline {
        [] => None,
        [only] => Some(utils::distance_meters(point, *only)),
        _ => min_distance_to_segments(point, polyline),
    }
}

/// Bounding box of the polyline expanded by `margin_meters`; `None` when empty
pub fn bounding_box(polyline: &[Coordinate], margin_meters: f64) -> Option<Rect<f64>> {
    utils::bounding_box(polyline, margin_meters)
}
