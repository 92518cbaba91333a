use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lineage_di::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn registry() -> ScopeRegistry {
    let mut registry = ScopeRegistry::new();
    registry.singleton("Config").request_scoped("RequestState");
    registry
}

fn bench_global_hit(c: &mut Criterion) {
    let container = Container::new(registry(), ScopedStorage::new());
    let unit = container.storage().enter();

    // Prime the global
    let _ = container.make(&unit, "Config", || Ok(42u64)).unwrap();

    c.bench_function("global_hit_u64", |b| {
        b.iter(|| {
            let v = container.make(&unit, "Config", || Ok(0u64)).unwrap();
            black_box(v);
        })
    });
}

fn bench_request_hit(c: &mut Criterion) {
    let container = Container::new(registry(), ScopedStorage::new());
    let request = container.storage().enter();
    container.begin_request(&request);
    let _ = container.make(&request, "RequestState", || Ok(1u64)).unwrap();

    c.bench_function("request_hit_u64", |b| {
        b.iter(|| {
            let v = container.make(&request, "RequestState", || Ok(0u64)).unwrap();
            black_box(v);
        })
    });
}

fn bench_request_cold(c: &mut Criterion) {
    let container = Container::new(registry(), ScopedStorage::new());

    c.bench_function("request_cold_new_lineage", |b| {
        b.iter(|| {
            let request = container.storage().enter();
            container.begin_request(&request);
            let v = container
                .make(&request, "RequestState", || Ok(vec![0u8; 64]))
                .unwrap();
            black_box(v.len());
        })
    });
}

fn bench_fork(c: &mut Criterion) {
    let mut group = c.benchmark_group("fork");

    for &entries in &[1usize, 16, 256] {
        let storage = ScopedStorage::new();
        let parent = storage.enter();
        for i in 0..entries {
            parent.set(format!("k{}", i), Arc::new(i));
        }

        group.bench_with_input(BenchmarkId::new("context_entries", entries), &entries, |b, _| {
            b.iter(|| {
                let child = parent.fork();
                black_box(child.len());
            })
        });
    }

    group.finish();
}

fn bench_alias_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_chain");

    for &depth in &[1usize, 4, 16] {
        let container = Container::new(registry(), ScopedStorage::new());
        for i in 0..depth {
            container.bind(format!("a{}", i), format!("a{}", i + 1));
        }
        container.bind(format!("a{}", depth), "Config");

        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, _| {
            b.iter(|| black_box(container.resolve_alias("a0").unwrap()))
        });
    }

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");

    let container = Container::new(registry(), ScopedStorage::new());
    {
        let unit = container.storage().enter();
        let _ = container.make(&unit, "Config", || Ok(42u64)).unwrap();
    }

    for &thread_count in &[1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("global_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    crossbeam_utils::thread::scope(|s| {
                        for _ in 0..threads {
                            let container = &container;
                            s.spawn(move |_| {
                                let unit = container.storage().enter();
                                for _ in 0..iters / threads as u64 {
                                    let v = container.make(&unit, "Config", || Ok(0u64)).unwrap();
                                    black_box(v);
                                }
                            });
                        }
                    })
                    .unwrap();
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_global_hit,
    bench_request_hit,
    bench_request_cold,
    bench_fork,
    bench_alias_chain,
    bench_contention
);
criterion_main!(benches);
