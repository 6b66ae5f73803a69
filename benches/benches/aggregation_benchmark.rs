//! Aggregation and persistence benchmarks.
//!
//! Run with: `cargo bench --package candela-bench`

use candela_bench::{Workload, engine};
use candela_lib::{
    CandleKey, CandleStore, CandleUpserter, Interval, PriceOrdering, SqliteCandleRepository,
};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn store_benchmark(c: &mut Criterion) {
    let ticks = Workload::default().ticks();
    let mut group = c.benchmark_group("store_apply");
    group.throughput(Throughput::Elements(ticks.len() as u64));

    for ordering in [PriceOrdering::Arrival, PriceOrdering::EventTime] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{ordering:?}")),
            &ordering,
            |b, &ordering| {
                b.iter(|| {
                    let store = CandleStore::new();
                    for tick in &ticks {
                        let open_time = Interval::Minute1.floor(tick.timestamp);
                        let key = CandleKey::new(tick.symbol.as_str(), Interval::Minute1, open_time);
                        store.apply(key, tick.mid(), tick.timestamp, ordering);
                    }
                    store.len()
                });
            },
        );
    }

    group.finish();
}

fn ingest_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ticks = Workload {
        ticks: 2_000,
        ..Workload::default()
    }
    .ticks();

    let mut group = c.benchmark_group("engine_ingest");
    group.sample_size(20);
    group.throughput(Throughput::Elements(ticks.len() as u64));

    let interval_sets: [(&str, &[Interval]); 3] = [
        ("1-interval", &[Interval::Minute1]),
        ("2-intervals", &[Interval::Second1, Interval::Minute1]),
        ("all-intervals", Interval::all()),
    ];

    for (name, intervals) in interval_sets {
        group.bench_with_input(BenchmarkId::from_parameter(name), &intervals, |b, intervals| {
            b.to_async(&rt).iter(|| {
                let ticks = ticks.clone();
                let (engine, store) = engine(intervals.to_vec(), 10);
                async move {
                    for tick in ticks {
                        engine.ingest(tick).await.unwrap();
                    }
                    store.len()
                }
            });
        });
    }

    group.finish();
}

fn persist_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sqlite_persist");
    group.sample_size(10);

    for symbols in [8, 64] {
        let workload = Workload {
            symbols,
            ticks: 20_000,
            span_secs: 3_600,
            ..Workload::default()
        };
        let (engine, store) = engine(vec![Interval::Second1, Interval::Minute1], 10);
        rt.block_on(async {
            for tick in workload.ticks() {
                engine.ingest(tick).await.unwrap();
            }
        });
        let snapshot = store.take_snapshot();
        group.throughput(Throughput::Elements(snapshot.len() as u64));

        group.bench_with_input(BenchmarkId::new("symbols", symbols), &snapshot, |b, snapshot| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let repo =
                        SqliteCandleRepository::open(dir.path().join("candles.sqlite")).unwrap();
                    (dir, CandleUpserter::new(Arc::new(repo)))
                },
                |(_dir, upserter)| upserter.persist(snapshot).unwrap(),
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, store_benchmark, ingest_benchmark, persist_benchmark);
criterion_main!(benches);
