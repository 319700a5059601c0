use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use stream_cube::{CubeEngine, EngineConfig, Event, EventBuilder, Measure};

const CATEGORIES: [&str; 4] = [
    "electronics.smartphone",
    "appliances.kitchen.washer",
    "apparel.shoes",
    "computers.notebook",
];
const BRANDS: [&str; 5] = ["apple", "samsung", "xiaomi", "lg", "nike"];

fn events(count: usize, per_second: usize) -> Vec<Event> {
    let start = Utc.with_ymd_and_hms(2019, 11, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            EventBuilder::new()
                .timestamp(start + Duration::seconds((i / per_second) as i64))
                .category(CATEGORIES[i % CATEGORIES.len()])
                .brand(BRANDS[i % BRANDS.len()])
                .user((i % 5_000) as i64)
                .product((i % 800) as i64)
                .price((i % 1_000) as f64 + 0.99)
                .build()
                .unwrap()
        })
        .collect()
}

fn engine(dimensions: &[&str]) -> CubeEngine {
    let config = EngineConfig::new(
        dimensions.iter().copied(),
        Measure::all().iter().map(ToString::to_string),
        std::time::Duration::from_secs(60),
    );
    CubeEngine::configure(&config).unwrap()
}

fn benchmark_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    let batch = events(50_000, 200);
    group.throughput(Throughput::Elements(batch.len() as u64));

    for dims in [&["category_code"][..], &["event_type", "category_code", "user_id"][..]] {
        group.bench_with_input(
            BenchmarkId::from_parameter(dims.join("+")),
            &batch,
            |b, batch| {
                b.iter(|| {
                    let mut engine = engine(dims);
                    for event in batch {
                        engine.ingest(black_box(event)).unwrap();
                    }
                    black_box(engine.stats());
                });
            },
        );
    }
    group.finish();
}

fn benchmark_snapshot(c: &mut Criterion) {
    let batch = events(20_000, 50);
    let mut engine = engine(&["category_code", "user_id"]);
    for event in &batch {
        engine.ingest(event).unwrap();
    }
    let now = batch.last().map(Event::timestamp).unwrap();

    c.bench_function("snapshot_many_cells", |b| {
        b.iter(|| black_box(engine.snapshot(black_box(now))));
    });
}

criterion_group!(benches, benchmark_ingest, benchmark_snapshot);
criterion_main!(benches);
