//! Benchmarks for pipeline throughput
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use streamable_rs::{CatchSpec, Concurrency, Stream};

fn busy(x: u64) -> u64 {
    (0..64).fold(x, |acc, i| acc.wrapping_mul(31).wrapping_add(i))
}

fn bench_sequential_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_stages");

    for size in [1_000u64, 10_000, 100_000].iter() {
        let stream = Stream::new(0..*size)
            .map(|x| x * 3)
            .filter(|x| x % 2 == 0)
            .skip(10)
            .group_by_size(64)
            .unwrap()
            .flatten();

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::new("map_filter_group", size), &stream, |b, stream| {
            b.iter(|| black_box(stream.count().unwrap()));
        });
    }

    group.finish();
}

fn bench_concurrent_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_map");
    let size = 10_000u64;
    group.throughput(Throughput::Elements(size));

    for workers in [1usize, 2, 4, 8].iter() {
        let ordered = Stream::new(0..size).par_map(*workers, busy).unwrap();
        group.bench_with_input(BenchmarkId::new("ordered", workers), &ordered, |b, stream| {
            b.iter(|| black_box(stream.count().unwrap()));
        });

        let unordered = Stream::new(0..size)
            .par_map(Concurrency::new(*workers).unordered(), busy)
            .unwrap();
        group.bench_with_input(
            BenchmarkId::new("unordered", workers),
            &unordered,
            |b, stream| {
                b.iter(|| black_box(stream.count().unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_map_async(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_async");
    group.sample_size(20);

    for workers in [1usize, 16, 64].iter() {
        let stream = Stream::new(0..200u64)
            .map_async(*workers, |x| async move {
                tokio::time::sleep(Duration::from_micros(200)).await;
                x
            })
            .unwrap();
        group.bench_with_input(BenchmarkId::new("sleeping_tasks", workers), &stream, |b, stream| {
            b.iter(|| black_box(stream.count().unwrap()));
        });
    }

    group.finish();
}

fn bench_error_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("error_path");
    let size = 10_000u64;
    group.throughput(Throughput::Elements(size));

    let stream = Stream::new(0..size)
        .try_map(|x| if x % 10 == 0 { Err("tenth") } else { Ok(x) })
        .catch_with(CatchSpec::any().replacement(0));
    group.bench_function("catch_every_tenth", |b| {
        b.iter(|| black_box(stream.count().unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_stages,
    bench_concurrent_map,
    bench_map_async,
    bench_error_path,
);

criterion_main!(benches);
