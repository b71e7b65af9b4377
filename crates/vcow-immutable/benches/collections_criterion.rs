//! Versioned collection benchmarks using criterion.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use vcow_immutable::{Registry, Value, VersionedList, VersionedMap};

fn filled_list(count: u64) -> VersionedList {
    (0..count).fold(VersionedList::new(), |list, i| {
        list.append(Value::Long(i as i64), i as i64)
    })
}

fn filled_map(count: u64) -> VersionedMap {
    let mut map = VersionedMap::new();
    for i in 0..count {
        if let Ok(next) = map.add(&format!("key-{i:08}"), Value::Long(i as i64), i as i64) {
            map = next;
        }
    }
    map
}

fn list_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("append", count), &count, |b, &count| {
            b.iter(|| black_box(filled_list(count)));
        });

        let list = filled_list(count);
        group.bench_with_input(BenchmarkId::new("value_at", count), &count, |b, &count| {
            b.iter(|| {
                for i in 0..count as usize {
                    black_box(list.value_at(i, count as i64));
                }
            });
        });

        let half = list.clear(count as i64 / 2);
        group.bench_with_input(
            BenchmarkId::new("snapshot_after_clear", count),
            &count,
            |b, &count| {
                b.iter(|| black_box(half.snapshot_at(count as i64).count()));
            },
        );
    }

    group.finish();
}

fn map_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("add", count), &count, |b, &count| {
            b.iter(|| black_box(filled_map(count)));
        });

        let map = filled_map(count);
        group.bench_with_input(BenchmarkId::new("iter", count), &count, |b, &count| {
            b.iter(|| black_box(map.iter(count as i64).count()));
        });

        let registry = Registry::standard();
        let root = Value::Map(map.clone());
        group.bench_with_input(BenchmarkId::new("encode", count), &count, |b, _| {
            b.iter(|| black_box(registry.to_bytes(&root)));
        });
    }

    group.finish();
}

criterion_group!(benches, list_benchmarks, map_benchmarks);
criterion_main!(benches);
