#![allow(missing_docs)]

use criterion::*;

use edit_kernels::sed::{sed, standard_sed};
use edit_kernels::ted::{standard_ted, ted};
use edit_kernels::tree::Tree;

fn kron(a: Option<&u32>, b: Option<&u32>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a == b => 0.0,
        _ => 1.0,
    }
}

/// Builds a balanced binary tree of `size` nodes in depth-first pre-order, so
/// node indices stay contiguous within each subtree (required by `Tree`).
fn balanced_tree(size: usize) -> Tree<u32> {
    let mut nodes = Vec::with_capacity(size);
    let mut adj = Vec::with_capacity(size);
    let mut next = 0_usize;
    build_subtree(size, &mut next, &mut nodes, &mut adj);
    Tree::new(nodes, adj).expect("balanced_tree always builds a well-formed pre-order tree")
}

fn build_subtree(size: usize, next: &mut usize, nodes: &mut Vec<u32>, adj: &mut Vec<Vec<usize>>) -> usize {
    let this = *next;
    nodes.push(u32::try_from(this).unwrap_or(u32::MAX));
    adj.push(Vec::new());
    *next += 1;
    if size <= 1 {
        return this;
    }
    let remaining = size - 1;
    let (left_size, right_size) = (remaining / 2, remaining - remaining / 2);
    if left_size > 0 {
        let left = build_subtree(left_size, next, nodes, adj);
        adj[this].push(left);
    }
    if right_size > 0 {
        let right = build_subtree(right_size, next, nodes, adj);
        adj[this].push(right);
    }
    this
}

fn ted_standard_vs_generic(c: &mut Criterion) {
    let mut group = c.benchmark_group("TedStandardVsGeneric");

    for &size in &[101_usize, 301, 601] {
        let x = balanced_tree(size);
        let y = balanced_tree(size);

        let id = BenchmarkId::new("ted-generic", size);
        group.bench_with_input(id, &size, |b, _| b.iter(|| black_box(ted(&x, &y, kron).expect("unit delta never invalid"))));

        let id = BenchmarkId::new("ted-standard", size);
        group.bench_with_input(id, &size, |b, _| b.iter(|| black_box(standard_ted(&x, &y))));
    }
    group.finish();
}

fn sed_standard_vs_generic(c: &mut Criterion) {
    let mut group = c.benchmark_group("SedStandardVsGeneric");

    for &len in &[100_usize, 400, 1_600] {
        let x: Vec<u32> = (0..len).map(|i| u32::try_from(i % 26).unwrap_or(0)).collect();
        let y: Vec<u32> = (0..len).map(|i| u32::try_from((i + 3) % 26).unwrap_or(0)).collect();

        let id = BenchmarkId::new("sed-generic", len);
        group.bench_with_input(id, &len, |b, _| b.iter(|| black_box(sed(&x, &y, kron).expect("unit delta never invalid"))));

        let id = BenchmarkId::new("sed-standard", len);
        group.bench_with_input(id, &len, |b, _| b.iter(|| black_box(standard_sed(&x, &y))));
    }
    group.finish();
}

criterion_group!(benches, ted_standard_vs_generic, sed_standard_vs_generic);
criterion_main!(benches);
