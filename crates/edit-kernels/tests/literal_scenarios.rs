//! Black-box literal scenarios and cross-kernel invariants, exercised as
//! integration tests so they run against the crate's public API only.

use float_eq::assert_float_eq;
use rand::SeedableRng;
use test_case::test_case;

use edit_kernels::adp::{aed, aed_backtrace};
use edit_kernels::alignment::{alignment_to_script, Alignment};
use edit_kernels::sed::{sed, sed_backtrace, sed_backtrace_matrix, standard_sed};
use edit_kernels::ted::{standard_ted, ted, ted_backtrace};
use edit_kernels::tree::Tree;
use edit_kernels::uted::{uted, uted_backtrace};

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

fn kron(a: Option<&char>, b: Option<&char>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a == b => 0.0,
        _ => 1.0,
    }
}

#[test]
fn sed_literal_scenario_distance_and_alignment() {
    let x = chars("abcde");
    let y = chars("bdef");

    let distance = sed(&x, &y, kron).expect("unit delta never invalid");
    assert_float_eq!(distance, 3.0, abs <= 1e-9);

    let mut expected = Alignment::new();
    expected.append_tuple(0, -1, None);
    expected.append_tuple(1, 0, None);
    expected.append_tuple(2, -1, None);
    expected.append_tuple(3, 1, None);
    expected.append_tuple(4, 2, None);
    expected.append_tuple(-1, 3, None);

    let actual = sed_backtrace(&x, &y, kron).expect("unit delta never invalid");
    assert_eq!(actual, expected);
}

#[test_case("abcde", "bdef"; "abcde-vs-bdef")]
#[test_case("aabbccdd", "aaabcccde"; "aabbccdd-vs-aaabcccde")]
#[test_case("", "abc"; "empty-vs-abc")]
#[test_case("kitten", "sitting"; "kitten-vs-sitting")]
fn standard_sed_agrees_with_general_sed(x: &str, y: &str) {
    let x = chars(x);
    let y = chars(y);
    let general = sed(&x, &y, kron).expect("unit delta never invalid");
    assert_eq!(standard_sed(&x, &y), general as i64);
}

#[test]
fn sed_stochastic_matches_exactly_three_co_optimal_alignments() {
    let x = chars("aaa");
    let y = chars("aa");
    let (_probabilities, counts, k) = sed_backtrace_matrix(&x, &y, kron).expect("unit delta never invalid");
    assert_eq!(k, 3);
    assert_eq!(counts, vec![vec![2, 0], vec![1, 1], vec![0, 2]]);
}

#[test]
fn aed_literal_scenario_and_backtrace() {
    let x = chars("abc");
    let y = chars("adefc");
    let sub = |a: &char, b: &char| if a == b { 0.0 } else { 1.0 };
    let gap = |_: Option<&char>, _: Option<&char>| 0.5;

    let distance = aed(&x, &y, sub, gap).expect("always has a parse");
    assert_float_eq!(distance, 2.5, abs <= 1e-9);

    let alignment = aed_backtrace(&x, &y, sub, gap).expect("always has a parse");
    let ops: Vec<&str> = alignment.steps().iter().filter_map(|s| s.op.as_deref()).collect();
    assert_eq!(ops.iter().filter(|&&o| o == "ins").count(), 1);
    assert_eq!(ops.iter().filter(|&&o| o == "skins").count(), 1);
}

#[test]
fn ted_literal_scenario() {
    let y = Tree::new(
        vec!['a', 'b', 'c', 'd', 'e'],
        vec![vec![1, 4], vec![2, 3], vec![], vec![], vec![]],
    )
    .expect("well-formed tree");
    let z = Tree::new(vec!['f', 'g'], vec![vec![1], vec![]]).expect("well-formed tree");

    let distance = ted(&y, &z, kron).expect("unit delta never invalid");
    assert_float_eq!(distance, 5.0, abs <= 1e-9);

    let mut expected = Alignment::new();
    expected.append_tuple(0, -1, None);
    expected.append_tuple(1, 0, None);
    expected.append_tuple(2, -1, None);
    expected.append_tuple(3, 1, None);
    expected.append_tuple(4, -1, None);
    let actual = ted_backtrace(&y, &z, kron).expect("unit delta never invalid");
    assert_eq!(actual, expected);
}

#[test]
fn ted_large_identical_trees_have_zero_distance_and_standard_ted_is_exact() {
    fn balanced(size: usize) -> Tree<u32> {
        fn build(size: usize, next: &mut usize, nodes: &mut Vec<u32>, adj: &mut Vec<Vec<usize>>) -> usize {
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
                let left = build(left_size, next, nodes, adj);
                adj[this].push(left);
            }
            if right_size > 0 {
                let right = build(right_size, next, nodes, adj);
                adj[this].push(right);
            }
            this
        }
        let mut nodes = Vec::with_capacity(size);
        let mut adj = Vec::with_capacity(size);
        let mut next = 0;
        build(size, &mut next, &mut nodes, &mut adj);
        Tree::new(nodes, adj).expect("balanced tree is well-formed")
    }

    let x = balanced(601);
    let y = balanced(601);
    assert_eq!(standard_ted(&x, &y), 0);
    let unit = |a: Option<&u32>, b: Option<&u32>| match (a, b) {
        (Some(a), Some(b)) if a == b => 0.0,
        _ => 1.0,
    };
    assert_float_eq!(ted(&x, &y, unit).expect("unit delta never invalid"), 0.0, abs <= 1e-9);
}

#[test]
fn uted_literal_scenario() {
    let x = Tree::new(vec!['a', 'b', 'c', 'e', 'd'], vec![vec![1], vec![2], vec![3, 4], vec![], vec![]])
        .expect("well-formed tree");
    let y = Tree::new(vec!['a', 'c', 'd', 'e', 'f'], vec![vec![1, 4], vec![2, 3], vec![], vec![], vec![]])
        .expect("well-formed tree");

    let distance = uted(&x, &y, kron).expect("well-formed trees always align");
    assert_float_eq!(distance, 2.0, abs <= 1e-9);

    let alignment = uted_backtrace(&x, &y, kron).expect("well-formed trees always align");
    assert_float_eq!(alignment.cost(x.nodes(), y.nodes(), kron), distance, abs <= 1e-9);
}

#[test]
fn sed_backtrace_script_round_trips_for_random_pairs() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(1234);
    let alphabet: Vec<char> = "abcd".chars().collect();
    for _ in 0..30 {
        let x: Vec<char> = (0..8).map(|_| alphabet[rand::Rng::random_range(&mut rng, 0..alphabet.len())]).collect();
        let y: Vec<char> = (0..8).map(|_| alphabet[rand::Rng::random_range(&mut rng, 0..alphabet.len())]).collect();
        let alignment = sed_backtrace(&x, &y, kron).expect("unit delta never invalid");
        let script = alignment_to_script(&alignment, &x, &y);
        assert_eq!(script.apply(&x), y);
    }
}

#[test]
fn sed_is_symmetric_under_symmetric_delta() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(99);
    let alphabet: Vec<char> = "abc".chars().collect();
    for _ in 0..20 {
        let x: Vec<char> = (0..6).map(|_| alphabet[rand::Rng::random_range(&mut rng, 0..alphabet.len())]).collect();
        let y: Vec<char> = (0..6).map(|_| alphabet[rand::Rng::random_range(&mut rng, 0..alphabet.len())]).collect();
        let forward = sed(&x, &y, kron).expect("unit delta never invalid");
        let backward = sed(&y, &x, kron).expect("unit delta never invalid");
        assert_float_eq!(forward, backward, abs <= 1e-9);
    }
}
