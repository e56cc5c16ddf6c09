use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use tagcache::{Cache, CacheBuilder, MemoryAdapter, ReadOptions, WriteOptions};

fn setup_cache() -> Cache {
    CacheBuilder::new(Arc::new(MemoryAdapter::default()))
        .with_expires_in(60_000)
        .build()
        .expect("cache assembly failed")
}

/// Benchmark 1: Hot cache (all hits, pure read path)
fn bench_hot_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hot_get");

    // Storage spawns its reconnect listener, so assembly needs the
    // runtime context.
    let cache = rt.block_on(async { setup_cache() });
    rt.block_on(async {
        for i in 0..1_000 {
            cache
                .set(&format!("key:{i}"), &format!("value:{i}"), WriteOptions::default())
                .await
                .unwrap();
        }
    });

    group.throughput(Throughput::Elements(1_000));
    group.bench_function("sequential_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                for i in 0..1_000 {
                    let value: String = cache
                        .get(
                            &format!("key:{i}"),
                            |_key| async move { Ok(None) },
                            ReadOptions::default(),
                        )
                        .await
                        .unwrap();
                    black_box(value);
                }
            })
        })
    });

    group.finish();
}

/// Benchmark 2: Cold cache (all misses, executor + write-back path)
fn bench_cold_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cold_get");

    group.throughput(Throughput::Elements(100));
    group.bench_function("miss_100", |b| {
        b.iter(|| {
            let cache = rt.block_on(async { setup_cache() });
            rt.block_on(async {
                for i in 0..100 {
                    let value: String = cache
                        .get(
                            &format!("key:{i}"),
                            move |key| async move { Ok(Some(format!("loaded:{key}"))) },
                            ReadOptions::default(),
                        )
                        .await
                        .unwrap();
                    black_box(value);
                }
            })
        })
    });

    group.finish();
}

/// Benchmark 3: Write throughput, tagged vs untagged
fn bench_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("set");

    for tagged in [false, true] {
        let label = if tagged { "tagged" } else { "untagged" };
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::from_parameter(label), &tagged, |b, &tagged| {
            let cache = rt.block_on(async { setup_cache() });
            b.iter(|| {
                rt.block_on(async {
                    for i in 0..100 {
                        let options = if tagged {
                            WriteOptions::default().with_tags(["bench"])
                        } else {
                            WriteOptions::default()
                        };
                        let record = cache
                            .set(&format!("key:{i}"), &format!("value:{i}"), options)
                            .await
                            .unwrap();
                        black_box(record);
                    }
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hot_get, bench_cold_get, bench_set);
criterion_main!(benches);
