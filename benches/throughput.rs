//! Throughput Benchmark for linekv
//!
//! Measures the storage engine and the command layer under common workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use linekv::commands::{glob_to_regex, CommandHandler};
use linekv::protocol::Request;
use linekv::storage::StorageEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(format!("key:{}", i), Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            engine.set(format!("key:{}", i), value.clone());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        engine.set(format!("key:{}", i), Bytes::from(format!("value:{}", i)));
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(&key).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(&key).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..10_000 {
        engine.set(format!("key:{}", i), Bytes::from(format!("value:{}", i)));
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                engine.set(format!("new:{}", i), Bytes::from("value"));
            } else {
                let key = format!("key:{}", i % 10_000);
                black_box(engine.get(&key).unwrap());
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark sorted set operations
fn bench_sorted_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("sorted_set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("zadd", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let entry = [((i % 1000) as f64, Bytes::from(format!("member:{}", i)))];
            black_box(engine.zadd("board", &entry).unwrap());
            i += 1;
        });
    });

    let ranked = Arc::new(StorageEngine::new());
    let entries: Vec<(f64, Bytes)> = (0..10_000)
        .map(|i| (i as f64, Bytes::from(format!("member:{}", i))))
        .collect();
    ranked.zadd("ranked", &entries).unwrap();

    group.bench_function("zrange_by_score_100", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let start = (i % 9_900) as f64;
            black_box(ranked.zrange_by_score("ranked", start, start + 99.0).unwrap());
            i += 1;
        });
    });

    group.bench_function("zrange_by_rank_tail", |b| {
        b.iter(|| {
            black_box(ranked.zrange_by_rank("ranked", -10, -1).unwrap());
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            engine.set(key.as_str(), Bytes::from("value"));
                            let _ = engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Benchmark expiry operations
fn bench_expiry(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..10_000 {
        engine.set(format!("expire:{}", i), Bytes::from("value"));
    }

    let mut group = c.benchmark_group("expiry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("expire_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("expire:{}", i % 10_000);
            engine.expire(&key, Duration::from_secs(3600));
            i += 1;
        });
    });

    group.bench_function("fire_due_timers", |b| {
        b.iter_custom(|iters| {
            let engine = StorageEngine::new();
            for i in 0..iters {
                let key = format!("due:{}", i);
                engine.set(key.as_str(), Bytes::from("value"));
                engine.expire(&key, Duration::ZERO);
            }

            let start = Instant::now();
            black_box(engine.fire_due_timers(Instant::now(), usize::MAX));
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmark KEYS pattern matching
fn bench_keys(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..1_000 {
        engine.set(format!("user:{}", i), Bytes::from("user_data"));
        engine.set(format!("session:{}", i), Bytes::from("session_data"));
        engine.set(format!("cache:{}", i), Bytes::from("cache_data"));
    }

    let mut group = c.benchmark_group("keys");

    group.bench_function("keys_pattern", |b| {
        let pattern = glob_to_regex("user:*");
        b.iter(|| {
            black_box(engine.keys(&pattern).unwrap());
        });
    });

    group.bench_function("keys_all", |b| {
        let pattern = glob_to_regex("*");
        b.iter(|| {
            black_box(engine.keys(&pattern).unwrap());
        });
    });

    group.finish();
}

/// Benchmark the full parse-and-dispatch path for one line
fn bench_dispatch(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
    handler.execute(&Request::parse(b"SET greeting hello").unwrap());

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_line", |b| {
        b.iter(|| {
            let request = Request::parse(black_box(b"GET greeting")).unwrap();
            black_box(handler.execute(&request).serialize());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_sorted_set,
    bench_concurrent,
    bench_expiry,
    bench_keys,
    bench_dispatch,
);

criterion_main!(benches);
