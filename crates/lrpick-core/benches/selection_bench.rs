//! Criterion micro-benchmarks for the selection engine.
//!
//! Covers:
//! - Tree population with sequential (worst-case rebalancing) keys
//! - Single weighted picks across population sizes
//! - Batch picks with and without the uniqueness guarantee

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lrpick_core::Selector;
use lrpick_tree::GenTree;

const SIZES: &[usize] = &[1_000, 10_000, 100_000];

fn sequential_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{i:07}")).collect()
}

fn populated_selector(n: usize) -> Selector {
    let mut selector = Selector::new();
    let keys = sequential_keys(n);
    selector.add_all(&keys).expect("selector is open");
    selector
}

fn tree_inserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_inserts");
    for &n in SIZES {
        let keys = sequential_keys(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || keys.clone(),
                |keys| {
                    let mut tree = GenTree::new();
                    for (i, key) in keys.into_iter().enumerate() {
                        tree.insert(key, i as i64);
                    }
                    black_box(tree.len())
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn single_picks(c: &mut Criterion) {
    let mut group = c.benchmark_group("next");
    for &n in SIZES {
        let mut selector = populated_selector(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(selector.next().expect("selector is non-empty")));
        });
    }
    group.finish();
}

fn batch_picks(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_of_100");
    for &n in SIZES {
        let mut selector = populated_selector(n);
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("next_n", n), &n, |b, _| {
            b.iter(|| black_box(selector.next_n(100).expect("selector is non-empty")));
        });

        let mut selector = populated_selector(n);
        group.bench_with_input(BenchmarkId::new("unique_n", n), &n, |b, _| {
            b.iter(|| black_box(selector.unique_n(100).expect("enough unique keys")));
        });
    }
    group.finish();
}

criterion_group!(benches, tree_inserts, single_picks, batch_picks);
criterion_main!(benches);
