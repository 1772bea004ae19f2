//! Throughput benchmarks for the hot ingestion and read paths.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rng, Rng};

use tsbuf_core::core::config::{AggregationConfig, Retention, SeriesStoreConfig};
use tsbuf_core::core::metrics::Metrics;
use tsbuf_core::storage::cache::NullCachePusher;
use tsbuf_core::storage::cluster::StaticClusterRole;
use tsbuf_core::storage::store::ChannelStore;
use tsbuf_core::{SeriesKey, SeriesStore};

fn build_store(reorder_window: u32) -> Arc<SeriesStore> {
    let store = Arc::new(ChannelStore::no_op(1024, 2));
    let cache = Arc::new(NullCachePusher);
    let cluster = Arc::new(StaticClusterRole::new(false));
    let metrics = Arc::new(Metrics::new().expect("metrics registry"));

    SeriesStore::new(
        SeriesKey::raw("bench.metric"),
        SeriesStoreConfig {
            retention: Retention::new(600, 5, 0),
            reorder_window,
            drop_first_chunk: false,
            aggregation: AggregationConfig::default(),
        },
        store,
        cache,
        cluster,
        metrics,
    )
}

fn bench_sequential_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_sequential");
    for &n in &[1_000usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || build_store(0),
                |series| {
                    for i in 0..n {
                        series.add(1_000 + i as u32, i as f64);
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_reordered_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_reordered");
    for &n in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let mut rand = rng();
                    let mut timestamps: Vec<u32> = (0..n as u32).map(|i| 1_000 + i).collect();
                    // Shuffle within a small window to stay inside the reorder buffer.
                    for chunk in timestamps.chunks_mut(8) {
                        for i in (1..chunk.len()).rev() {
                            let j = rand.random_range(0..=i);
                            chunk.swap(i, j);
                        }
                    }
                    (build_store(60), timestamps)
                },
                |(series, timestamps)| {
                    for (i, ts) in timestamps.iter().enumerate() {
                        series.add(*ts, i as f64);
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let series = build_store(0);
    for i in 0..20_000u32 {
        series.add(1_000 + i, i as f64);
    }

    c.bench_function("get_full_range", |b| {
        b.iter(|| series.get(0, u32::MAX).expect("range query"));
    });
}

criterion_group!(benches, bench_sequential_add, bench_reordered_add, bench_get);
criterion_main!(benches);
