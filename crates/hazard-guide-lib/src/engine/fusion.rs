//! Guide fusion and "what's next" selection
//!
//! These are pure functions over snapshots of engine state so they can be tested without
//! a runtime.

use crate::polyline;
use crate::route::{Coordinate, Guide};
use crate::utils;
use std::collections::HashMap;

/// Fuse hazard guides from all sources into one deduplicated list.
///
/// Sources are walked in order route-native, public dataset, POI. A guide within
/// `radius_m` of an already accepted guide replaces it only when it has higher
/// precedence; otherwise it is dropped. Output keeps first-accepted order.
pub fn merge_hazard_guides(
    route_native: &[Guide],
    public: &[Guide],
    poi: &[Guide],
    radius_m: f64,
) -> Vec<Guide> {
    let mut merged: Vec<Guide> =
        Vec::with_capacity(route_native.len() + public.len() + poi.len());

    for guide in route_native.iter().chain(public).chain(poi) {
        let duplicate = merged.iter().position(|accepted| {
            utils::distance_meters(accepted.coordinate, guide.coordinate) <= radius_m
        });

        match duplicate {
            Some(i) => {
                if guide.source() > merged[i].source() {
                    merged[i] = guide.clone();
                }
            }
            None => merged.push(guide.clone()),
        }
    }

    merged
}

/// Nearest guide farther than `passed_radius_m` from the vehicle, else the nearest overall.
///
/// Guides just behind or under the vehicle are skipped so the answer moves on as soon as
/// the driver passes one. With an unknown vehicle position the first guide is returned.
pub fn nearest_ahead<'a>(
    guides: impl IntoIterator<Item = &'a Guide>,
    vehicle: Option<Coordinate>,
    passed_radius_m: f64,
) -> Option<&'a Guide> {
    let mut guides = guides.into_iter();
    let Some(vehicle) = vehicle else {
        return guides.next();
    };

    let mut ahead: Option<(&Guide, f64)> = None;
    let mut nearest: Option<(&Guide, f64)> = None;

    for guide in guides {
        let distance = utils::distance_meters(vehicle, guide.coordinate);
        if nearest.is_none_or(|(_, d)| distance < d) {
            nearest = Some((guide, distance));
        }
        if distance > passed_radius_m && ahead.is_none_or(|(_, d)| distance < d) {
            ahead = Some((guide, distance));
        }
    }

    ahead.or(nearest).map(|(guide, _)| guide)
}

/// Next hazard along the route.
///
/// With a polyline and a vehicle position, every hazard is mapped to its route-progress
/// index (cached in `route_index`). Hazards more than `vertex_slack` vertices behind the
/// vehicle are ignored; of the rest the one with the smallest index wins, ties broken by
/// distance to the vehicle. Without a projection, or when no hazard survives, falls back
/// to [`nearest_ahead`].
pub fn next_hazard_guide<'a>(
    hazards: &'a [Guide],
    polyline: &[Coordinate],
    vehicle: Option<Coordinate>,
    route_index: &mut HashMap<String, usize>,
    vertex_slack: usize,
    passed_radius_m: f64,
) -> Option<&'a Guide> {
    if hazards.is_empty() {
        return None;
    }

    let projected = vehicle.and_then(|v| Some((v, polyline::nearest_vertex_index(v, polyline)?)));

    if let Some((vehicle, vehicle_index)) = projected {
        let mut best: Option<(&Guide, usize, f64)> = None;

        for guide in hazards {
            let index = match route_index.get(&guide.id) {
                Some(&index) => index,
                None => {
                    let Some(index) = polyline::nearest_vertex_index(guide.coordinate, polyline)
                    else {
                        continue;
                    };
                    route_index.insert(guide.id.clone(), index);
                    index
                }
            };

            if index + vertex_slack < vehicle_index {
                continue;
            }

            let distance = utils::distance_meters(vehicle, guide.coordinate);
            let better = match best {
                None => true,
                Some((_, best_index, best_distance)) => {
                    index < best_index || (index == best_index && distance < best_distance)
                }
            };
            if better {
                best = Some((guide, index, distance));
            }
        }

        if let Some((guide, _, _)) = best {
            return Some(guide);
        }
    }

    nearest_ahead(hazards, vehicle, passed_radius_m)
}

/// Straight-line distance rounded to the meter
pub fn rounded_distance(vehicle: Option<Coordinate>, guide: Option<&Guide>) -> Option<u32> {
    let vehicle = vehicle?;
    let guide = guide?;
    Some(utils::distance_meters(vehicle, guide.coordinate).round() as u32)
}
