//! Grid spatial index for proximity queries over the camera dataset
//!
//! The dataset is large (thousands of records) but static between refreshes, so a flat
//! hash of fixed-size lat/lon cells beats a tree: building is a single pass and a
//! nearest query only touches the handful of cells around the query point.

use crate::route::Coordinate;
use crate::utils::{self, METERS_PER_DEGREE_LAT};
use geo::Rect;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// A single camera from the bulk dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardRecord {
    pub id: String,
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit_kph: Option<u32>,
}

/// Records per cell are few; most cells hold one or two cameras
type Bucket = SmallVec<[u32; 4]>;

/// Grid-bucketed index over a static record set
#[derive(Debug, Default)]
pub struct GridIndex {
    cell_size_deg: f64,
    records: Vec<HazardRecord>,
    cells: HashMap<u64, Bucket>,
}

impl GridIndex {
    /// Bucket `records` into cells of `cell_size_deg` degrees.
    ///
    /// Records with invalid coordinates are dropped. An empty input yields an empty index.
    pub fn build(records: Vec<HazardRecord>, cell_size_deg: f64) -> Self {
        profiling::scope!("GridIndex::build");

        let records: Vec<HazardRecord> = records
            .into_iter()
            .filter(|record| {
                let usable = record.coordinate.is_usable();
                if !usable {
                    tracing::warn!(
                        id = %record.id,
                        lat = record.coordinate.lat,
                        lon = record.coordinate.lon,
                        "Skipping camera with unusable coordinate"
                    );
                }
                usable
            })
            .collect();

        let mut cells: HashMap<u64, Bucket> = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let (row, col) = Self::cell_of(record.coordinate, cell_size_deg);
            cells.entry(Self::cell_key(row, col)).or_default().push(i as u32);
        }

        tracing::debug!(
            records = records.len(),
            cells = cells.len(),
            "Built camera grid index"
        );

        Self {
            cell_size_deg,
            records,
            cells,
        }
    }

    /// Integer cell coordinates of a position
    #[inline]
    fn cell_of(coordinate: Coordinate, cell_size_deg: f64) -> (i32, i32) {
        (
            (coordinate.lat / cell_size_deg).floor() as i32,
            (coordinate.lon / cell_size_deg).floor() as i32,
        )
    }

    /// Pack (row, col) into one 64-bit key
    #[inline]
    fn cell_key(row: i32, col: i32) -> u64 {
        ((row as u32 as u64) << 32) | (col as u32 as u64)
    }

    /// Closest record within `within_meters` of `point`, if any.
    ///
    /// Scans a square of cells around the point. Candidates are compared by haversine
    /// distance; ties keep the first candidate in scan order. When the square would
    /// cover more cells than there are records, every record is scanned in build order
    /// instead.
    pub fn nearest(&self, point: Coordinate, within_meters: f64) -> Option<&HazardRecord> {
        profiling::scope!("GridIndex::nearest");

        if self.records.is_empty()
            || !point.is_valid()
            || within_meters.is_nan()
            || within_meters < 0.0
        {
            return None;
        }

        // Radii in cells, computed in f64 and capped to the whole globe
        let cell_meters = self.cell_size_deg * METERS_PER_DEGREE_LAT;
        let max_row_radius = (90.0 / self.cell_size_deg).ceil() + 1.0;
        let row_radius = ((within_meters / cell_meters).ceil() + 1.0).min(max_row_radius);
        // Longitude cells shrink towards the poles, so widen the scan to keep the radius covered
        let lon_scale = point.lat.to_radians().cos().max(0.01);
        let max_col_radius = (180.0 / self.cell_size_deg).ceil();
        let col_radius =
            ((within_meters / (cell_meters * lon_scale)).ceil() + 1.0).min(max_col_radius);

        let scanned_cells = (2.0 * row_radius + 1.0) * (2.0 * col_radius + 1.0);
        if scanned_cells > self.records.len() as f64 {
            return Self::closest(point, within_meters, self.records.iter());
        }

        let (row, col) = Self::cell_of(point, self.cell_size_deg);
        let (row_radius, col_radius) = (row_radius as i32, col_radius as i32);

        let candidates = ((row.saturating_sub(row_radius))..=(row.saturating_add(row_radius)))
            .flat_map(|r| {
                ((col.saturating_sub(col_radius))..=(col.saturating_add(col_radius)))
                    .map(move |c| Self::cell_key(r, c))
            })
            .filter_map(|key| self.cells.get(&key))
            .flatten()
            .map(|&i| &self.records[i as usize]);

        Self::closest(point, within_meters, candidates)
    }

    /// First candidate with the smallest distance not exceeding `within_meters`
    fn closest<'a>(
        point: Coordinate,
        within_meters: f64,
        candidates: impl Iterator<Item = &'a HazardRecord>,
    ) -> Option<&'a HazardRecord> {
        let mut best: Option<(&HazardRecord, f64)> = None;
        for record in candidates {
            let distance = utils::distance_meters(point, record.coordinate);
            if distance > within_meters {
                continue;
            }
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((record, distance));
            }
        }
        best.map(|(record, _)| record)
    }

    /// Every record inside `bounds` (x = longitude, y = latitude), in build order
    pub fn range_query(&self, bounds: &Rect<f64>) -> Vec<&HazardRecord> {
        profiling::scope!("GridIndex::range_query");

        self.records
            .iter()
            .filter(|record| utils::bounds_contains(bounds, record.coordinate))
            .collect()
    }

    /// All indexed records
    pub fn records(&self) -> &[HazardRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
