use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use geo::line_string;
use greenpaths_core::exposure::{
    ExposureAggregator, ExposureSource, ExposureTable, TravelTimes, ValueRange,
};
use greenpaths_core::model::{RawNetwork, RawWay, RouteRecord, SegmentId};
use greenpaths_core::loading::osm::segment_network;
use greenpaths_core::sampling::{
    AggregationMethod, GridTransform, RasterGrid, SampleCount, SamplingOptions,
    sample_geometry_value,
};
use greenpaths_core::store::SegmentValueStore;
use hashbrown::HashMap;

const SEGMENTS: i64 = 20_000;
const ROUTES: usize = 5_000;

fn value_store() -> SegmentValueStore {
    let aqi: HashMap<SegmentId, f64> = (0..SEGMENTS)
        .map(|id| (id, 1.0 + (id % 40) as f64 / 10.0))
        .collect();
    let mut store = SegmentValueStore::new();
    store.save_segment_values(&aqi, "aqi");
    store
}

fn routes() -> Vec<RouteRecord> {
    (0..ROUTES)
        .map(|i| {
            let start = (i as i64 * 7) % (SEGMENTS - 50);
            RouteRecord::new(&i.to_string(), "dest", (start..start + 40).collect())
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let store = value_store();
    let routes = routes();
    let times: HashMap<SegmentId, f64> = (0..SEGMENTS).map(|id| (id, 12.0)).collect();

    let mut group = c.benchmark_group("aggregation");
    group.sample_size(10);
    group.bench_function("batched_routes", |b| {
        b.iter(|| {
            let sources = vec![ExposureSource::new("aqi").with_ranges(vec![
                ValueRange::new(1.0, 2.0),
                ValueRange::new(2.0, 4.0),
            ])];
            let mut aggregator =
                ExposureAggregator::new(sources, TravelTimes::new(times.clone(), 1.33))
                    .with_batching(1000, 0.1);
            let mut table = ExposureTable::new();
            black_box(aggregator.run(&routes, &store, &mut table).unwrap())
        });
    });
    group.finish();
}

fn bench_segmentation(c: &mut Criterion) {
    // Grid of 100 horizontal and 100 vertical streets crossing at every node
    let size = 100_i64;
    let mut network = RawNetwork::default();
    for row in 0..size {
        for col in 0..size {
            network.node_coords.insert(
                row * size + col,
                geo::Coord {
                    x: col as f64 * 50.0,
                    y: row as f64 * 50.0,
                },
            );
        }
    }
    for i in 0..size {
        network.ways.push(RawWay {
            id: i + 1,
            nodes: (0..size).map(|col| i * size + col).collect(),
            ..RawWay::default()
        });
        network.ways.push(RawWay {
            id: size + i + 1,
            nodes: (0..size).map(|row| row * size + i).collect(),
            ..RawWay::default()
        });
    }

    c.bench_function("segment_grid_network", |b| {
        b.iter(|| black_box(segment_network(black_box(&network), 1_000_000_000_000).unwrap()));
    });
}

fn bench_sampling(c: &mut Criterion) {
    let grid = RasterGrid::new(
        GridTransform {
            left: 0.0,
            top: 1000.0,
            cell_size: 10.0,
        },
        100,
        100,
        (0..10_000).map(f64::from).collect(),
    )
    .unwrap();
    let lines = geo::MultiLineString::new(vec![
        line_string![(x: 5.0, y: 5.0), (x: 500.0, y: 700.0), (x: 990.0, y: 20.0)],
    ]);
    let options = SamplingOptions {
        count: SampleCount::Resolution(10.0),
        method: AggregationMethod::Mean,
    };

    c.bench_function("sample_long_segment", |b| {
        b.iter(|| black_box(sample_geometry_value(black_box(&lines), &grid, options)));
    });
}

criterion_group!(benches, bench_aggregation, bench_segmentation, bench_sampling);
criterion_main!(benches);
