//! TTL cache benchmarks
//!
//! Measures the lock-protected hot paths: hits, misses, inserts that evict,
//! and `get_or_compute` on a warm key.
//!
//! Run: cargo bench --bench ttl_cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use routing_cache::ConcurrentTtlCache;

fn warm_cache(size: usize) -> ConcurrentTtlCache<String, u64> {
    let cache = ConcurrentTtlCache::new(3600.0, size).unwrap();
    for i in 0..size {
        cache.set(format!("conv-{}::task-{i}", i % 16), i as u64);
    }
    cache
}

/// Benchmark get() on a present key at several cache sizes.
fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");
    for size in [100usize, 1_000, 10_000] {
        let cache = warm_cache(size);
        let key = format!("conv-{}::task-{}", (size / 2) % 16, size / 2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &key, |b, key| {
            b.iter(|| black_box(cache.get(key.as_str())))
        });
    }
    group.finish();
}

fn bench_get_miss(c: &mut Criterion) {
    let cache = warm_cache(1_000);
    c.bench_function("get_miss", |b| {
        b.iter(|| black_box(cache.get("conv-404::missing")))
    });
}

/// Benchmark set() into a full cache, so every insert evicts.
///
/// Per-insert cost should stay flat as the capacity grows.
fn bench_set_evicting(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_evicting");
    for size in [1_000usize, 100_000] {
        let cache = warm_cache(size);
        let mut counter = 0u64;
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                counter += 1;
                cache.set(format!("fresh-{counter}"), black_box(counter));
            })
        });
    }
    group.finish();
}

fn bench_invalidate_scope(c: &mut Criterion) {
    c.bench_function("invalidate_scope_1000", |b| {
        b.iter_batched(
            || {
                let cache = ConcurrentTtlCache::with_scope_extractor(3600.0, 1_000, |key: &String| {
                    routing_cache::services::conversation_scope(key)
                })
                .unwrap();
                for i in 0..1_000u64 {
                    cache.set(format!("conv-{}::task-{i}", i % 16), i);
                }
                cache
            },
            |cache| black_box(cache.invalidate_scope("conv-3").unwrap()),
            criterion::BatchSize::SmallInput,
        )
    });
}

/// Benchmark get_or_compute() when the key is already cached.
fn bench_get_or_compute_warm(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = warm_cache(1_000);
    let key = "conv-0::task-0".to_string();

    c.bench_function("get_or_compute_warm", |b| {
        b.to_async(&runtime).iter(|| {
            let cache = cache.clone();
            let key = key.clone();
            async move {
                black_box(
                    cache
                        .get_or_compute(key, || async { Ok::<u64, anyhow::Error>(0) })
                        .await
                        .unwrap(),
                )
            }
        })
    });
}

criterion_group!(
    benches,
    bench_get_hit,
    bench_get_miss,
    bench_set_evicting,
    bench_invalidate_scope,
    bench_get_or_compute_warm
);
criterion_main!(benches);
