use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reef::cluster::slots::{slot_for_key, SlotMap, SlotRange, SLOT_COUNT};
use reef::ConsistentHashLocator;

fn build_slot_map(node_count: u16) -> SlotMap {
    let mut map = SlotMap::new();
    let span = SLOT_COUNT / node_count;
    let mut ranges = Vec::new();
    for i in 0..node_count {
        let start = i * span;
        let end = if i + 1 == node_count { SLOT_COUNT - 1 } else { start + span - 1 };
        ranges.push(SlotRange {
            start,
            end,
            master: format!("10.0.0.{}:6379", i + 1),
            replicas: vec![format!("10.0.0.{}:6379", i + 101)],
        });
    }
    map.rebuild(ranges);
    map
}

fn bench_slot_for_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_for_key");

    group.bench_function("plain_key", |b| {
        b.iter(|| black_box(slot_for_key(black_box("user:1000:session"))));
    });

    group.bench_function("hash_tagged_key", |b| {
        b.iter(|| black_box(slot_for_key(black_box("{user:1000}:session"))));
    });

    group.finish();
}

fn bench_master_for_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("master_for_key");

    for node_count in [3u16, 16, 64].iter() {
        let map = build_slot_map(*node_count);
        group.bench_with_input(BenchmarkId::new("nodes", node_count), &map, |b, map| {
            b.iter(|| black_box(map.master_for_key(black_box("{user:1000}:session"))));
        });
    }

    group.finish();
}

fn bench_consistent_hash_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("consistent_hash_locate");

    for node_count in [3usize, 16, 64].iter() {
        let nodes: Vec<String> = (0..*node_count).map(|i| format!("node-{}", i)).collect();
        let locator = ConsistentHashLocator::new(nodes, 160);
        group.bench_with_input(BenchmarkId::new("nodes", node_count), &locator, |b, locator| {
            b.iter(|| black_box(locator.locate(black_box("user:1000:session"))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_slot_for_key,
    bench_master_for_key,
    bench_consistent_hash_locate
);
criterion_main!(benches);
