//! Performance benchmarks for hazard-guide-lib
//!
//! Run with: cargo bench --package hazard-guide-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::{Coord, Rect};
use hazard_guide_lib::engine::route_cameras;
use hazard_guide_lib::{Coordinate, GridIndex, HazardRecord, polyline};

/// Cameras scattered over a ~1°x1° area around Seoul
fn generate_cameras(count: usize) -> Vec<HazardRecord> {
    (0..count)
        .map(|i| {
            let t = i as f64 / count as f64;
            let lat = 37.0 + (t * 7919.0).fract();
            let lon = 126.5 + (t * 104_729.0).fract();
            HazardRecord {
                id: format!("cam-{i}"),
                coordinate: Coordinate::new(lat, lon),
                speed_limit_kph: Some(if i % 3 == 0 { 50 } else { 80 }),
            }
        })
        .collect()
}

/// A wiggly route heading north-east with the given number of vertices
fn generate_route(num_points: usize) -> Vec<Coordinate> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 / num_points as f64;
            Coordinate::new(
                37.2 + t * 0.5 + (t * 40.0).sin() * 0.002,
                126.8 + t * 0.5 + (t * 25.0).cos() * 0.002,
            )
        })
        .collect()
}

// ============================================================================
// Grid index
// ============================================================================

fn bench_grid_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_build");
    group.sample_size(20);

    for count in [1_000, 10_000] {
        let cameras = generate_cameras(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &cameras, |b, cameras| {
            b.iter(|| GridIndex::build(cameras.clone(), 0.01));
        });
    }

    group.finish();
}

fn bench_grid_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_query");

    let index = GridIndex::build(generate_cameras(10_000), 0.01);
    let point = Coordinate::new(37.55, 127.0);

    group.bench_function("nearest_85m", |b| {
        b.iter(|| index.nearest(point, 85.0));
    });
    group.bench_function("nearest_1km", |b| {
        b.iter(|| index.nearest(point, 1_000.0));
    });

    let bounds = Rect::new(Coord { x: 126.9, y: 37.4 }, Coord { x: 127.1, y: 37.6 });
    group.bench_function("range_query", |b| {
        b.iter(|| index.range_query(&bounds));
    });

    group.finish();
}

// ============================================================================
// Route matching
// ============================================================================

fn bench_route_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_matching");
    group.sample_size(20);

    let index = GridIndex::build(generate_cameras(10_000), 0.01);

    for vertices in [200, 1_000] {
        let route = generate_route(vertices);
        let Some(bounds) = polyline::bounding_box(&route, 320.0) else {
            continue;
        };
        let candidates: Vec<HazardRecord> =
            index.range_query(&bounds).into_iter().cloned().collect();

        group.throughput(Throughput::Elements(candidates.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("corridor_filter", vertices),
            &candidates,
            |b, candidates| {
                b.iter(|| route_cameras(candidates.clone(), &route, 180.0, 28.0));
            },
        );
    }

    let route = generate_route(1_000);
    let point = Coordinate::new(37.45, 127.05);
    group.bench_function("nearest_vertex_1k", |b| {
        b.iter(|| polyline::nearest_vertex_index(point, &route));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_grid_build,
    bench_grid_queries,
    bench_route_matching
);
criterion_main!(benches);
