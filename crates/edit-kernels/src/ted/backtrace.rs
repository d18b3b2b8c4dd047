//! Deterministic, stochastic, and marginal-matrix backtrace for [`super::ted`].
//!
//! All three walk the same Zhang-Shasha recurrence top-down, recomputing a
//! local forest table for each subtree pair they visit and recursing
//! whenever the "subtree match" (jump) branch wins. `compute_forest` is
//! memoized by `(i, j)` so a subtree pair referenced from multiple ancestor
//! forests — the whole point of the keyroot trick in the forward pass — is
//! only counted once here too.

use std::collections::HashMap;
use std::rc::Rc;

use rand::Rng;

use super::forward_table;
use crate::alignment::Alignment;
use crate::error::Result;
use crate::tolerance::approx_eq;
use crate::tree::Tree;

fn edge_cost<T: std::fmt::Debug>(delta: &impl Fn(Option<&T>, Option<&T>) -> f64, a: Option<&T>, b: Option<&T>) -> f64 {
    delta(a, b)
}

/// Reconstructs one optimal alignment by a fixed tie-break walk: at each
/// forest cell, the first option achieving the minimum wins, in the order
/// subtree-match, delete-from-left, insert-from-right.
pub fn ted_backtrace<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<Alignment> {
    let (m, n) = (x.len(), y.len());
    if m == 0 || n == 0 {
        let mut alignment = Alignment::new();
        for i in 0..m {
            alignment.append_tuple(isize_of(i), -1, None);
        }
        for j in 0..n {
            alignment.append_tuple(-1, isize_of(j), None);
        }
        return Ok(alignment);
    }
    let d = forward_table(x, y, &delta)?;
    deterministic_forest(x, y, &d, &delta, 0, 0)
}

fn isize_of(i: usize) -> isize {
    isize::try_from(i).unwrap_or(isize::MAX)
}

fn deterministic_forest<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i_root: usize,
    j_root: usize,
) -> Result<Alignment> {
    let orl_x = x.orl();
    let orl_y = y.orl();
    let ox = orl_x[i_root];
    let oy = orl_y[j_root];
    let height = ox - i_root + 2;
    let width = oy - j_root + 2;

    // Local forest-distance table, rebuilt for this subtree pair only; the
    // global `d` table is consulted (not rebuilt) for every nested subtree
    // match this forest jumps into.
    let mut local = vec![vec![0.0; width]; height];
    for li in (0..height - 1).rev() {
        let i = i_root + li;
        local[li][width - 1] = local[li + 1][width - 1] + edge_cost(delta, Some(&x.nodes()[i]), None);
    }
    for lj in (0..width - 1).rev() {
        let j = j_root + lj;
        local[height - 1][lj] = local[height - 1][lj + 1] + edge_cost(delta, None, Some(&y.nodes()[j]));
    }
    for li in (0..height - 1).rev() {
        let i = i_root + li;
        for lj in (0..width - 1).rev() {
            let j = j_root + lj;
            let del = edge_cost(delta, Some(&x.nodes()[i]), None) + local[li + 1][lj];
            let ins = edge_cost(delta, None, Some(&y.nodes()[j])) + local[li][lj + 1];
            let whole = orl_x[i] == ox && orl_y[j] == oy;
            local[li][lj] = if whole {
                let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + local[li + 1][lj + 1];
                rep.min(del).min(ins)
            } else {
                let loi = orl_x[i] + 1 - i_root;
                let loj = orl_y[j] + 1 - j_root;
                let jump = local[loi][loj] + d[i][j];
                jump.min(del).min(ins)
            };
        }
    }

    let mut alignment = Alignment::new();
    let (mut li, mut lj) = (0, 0);
    while (li, lj) != (height - 1, width - 1) {
        let i = i_root + li;
        let j = j_root + lj;
        let whole = li < height - 1 && lj < width - 1 && orl_x[i] == ox && orl_y[j] == oy;

        if li < height - 1 && lj < width - 1 {
            if whole {
                let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + local[li + 1][lj + 1];
                if approx_eq(rep, local[li][lj]) {
                    alignment.append_tuple(isize_of(i), isize_of(j), None);
                    li += 1;
                    lj += 1;
                    continue;
                }
            } else {
                let loi = orl_x[i] + 1 - i_root;
                let loj = orl_y[j] + 1 - j_root;
                let jump = local[loi][loj] + d[i][j];
                if approx_eq(jump, local[li][lj]) {
                    let sub = deterministic_forest(x, y, d, delta, i, j)?;
                    for step in sub.steps() {
                        alignment.append_tuple(step.i, step.j, step.op.clone());
                    }
                    li = loi;
                    lj = loj;
                    continue;
                }
            }
        }
        if li < height - 1 {
            let del = edge_cost(delta, Some(&x.nodes()[i]), None) + local[li + 1][lj];
            if approx_eq(del, local[li][lj]) {
                alignment.append_tuple(isize_of(i), -1, None);
                li += 1;
                continue;
            }
        }
        debug_assert!(lj < width - 1, "no co-optimal successor at forest cell ({li}, {lj})");
        alignment.append_tuple(-1, isize_of(j), None);
        lj += 1;
    }
    Ok(alignment)
}

/// Per-subtree-pair memoized local forest tables, shared by the stochastic
/// and marginal-matrix backtrace modes.
struct ForestInfo {
    height: usize,
    width: usize,
    delta: Vec<Vec<f64>>,
    fwd: Vec<Vec<u64>>,
    bwd: Vec<Vec<u64>>,
}

type Memo = HashMap<(usize, usize), Rc<ForestInfo>>;

fn compute_forest<T: std::fmt::Debug>(
    memo: &mut Memo,
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i_root: usize,
    j_root: usize,
) -> Result<Rc<ForestInfo>> {
    if let Some(info) = memo.get(&(i_root, j_root)) {
        return Ok(Rc::clone(info));
    }

    let orl_x = x.orl();
    let orl_y = y.orl();
    let ox = orl_x[i_root];
    let oy = orl_y[j_root];
    let height = ox - i_root + 2;
    let width = oy - j_root + 2;

    let mut delta_table = vec![vec![0.0; width]; height];
    for li in (0..height - 1).rev() {
        let i = i_root + li;
        delta_table[li][width - 1] = delta_table[li + 1][width - 1] + edge_cost(delta, Some(&x.nodes()[i]), None);
    }
    for lj in (0..width - 1).rev() {
        let j = j_root + lj;
        delta_table[height - 1][lj] = delta_table[height - 1][lj + 1] + edge_cost(delta, None, Some(&y.nodes()[j]));
    }
    for li in (0..height - 1).rev() {
        let i = i_root + li;
        for lj in (0..width - 1).rev() {
            let j = j_root + lj;
            let del = edge_cost(delta, Some(&x.nodes()[i]), None) + delta_table[li + 1][lj];
            let ins = edge_cost(delta, None, Some(&y.nodes()[j])) + delta_table[li][lj + 1];
            let whole = orl_x[i] == ox && orl_y[j] == oy;
            delta_table[li][lj] = if whole {
                let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + delta_table[li + 1][lj + 1];
                rep.min(del).min(ins)
            } else {
                let loi = orl_x[i] + 1 - i_root;
                let loj = orl_y[j] + 1 - j_root;
                (delta_table[loi][loj] + d[i][j]).min(del).min(ins)
            };
        }
    }

    let mut bwd = vec![vec![0_u64; width]; height];
    bwd[height - 1][width - 1] = 1;
    for li in (0..height - 1).rev() {
        bwd[li][width - 1] = bwd[li + 1][width - 1];
    }
    for lj in (0..width - 1).rev() {
        bwd[height - 1][lj] = bwd[height - 1][lj + 1];
    }
    for li in (0..height - 1).rev() {
        let i = i_root + li;
        for lj in (0..width - 1).rev() {
            let j = j_root + lj;
            let del = edge_cost(delta, Some(&x.nodes()[i]), None) + delta_table[li + 1][lj];
            let ins = edge_cost(delta, None, Some(&y.nodes()[j])) + delta_table[li][lj + 1];
            let whole = orl_x[i] == ox && orl_y[j] == oy;
            let mut total = 0_u64;
            if whole {
                let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + delta_table[li + 1][lj + 1];
                if approx_eq(rep, delta_table[li][lj]) {
                    total += bwd[li + 1][lj + 1];
                }
            } else {
                let loi = orl_x[i] + 1 - i_root;
                let loj = orl_y[j] + 1 - j_root;
                let jump = delta_table[loi][loj] + d[i][j];
                if approx_eq(jump, delta_table[li][lj]) {
                    let sub = compute_forest(memo, x, y, d, delta, i, j)?;
                    total += sub.bwd[0][0] * bwd[loi][loj];
                }
            }
            if approx_eq(del, delta_table[li][lj]) {
                total += bwd[li + 1][lj];
            }
            if approx_eq(ins, delta_table[li][lj]) {
                total += bwd[li][lj + 1];
            }
            bwd[li][lj] = total;
        }
    }

    let mut fwd = vec![vec![0_u64; width]; height];
    fwd[0][0] = 1;
    for li in 0..height {
        for lj in 0..width {
            let here = fwd[li][lj];
            if here == 0 {
                continue;
            }
            if li < height - 1 && lj < width - 1 {
                let i = i_root + li;
                let j = j_root + lj;
                let del = edge_cost(delta, Some(&x.nodes()[i]), None) + delta_table[li + 1][lj];
                let ins = edge_cost(delta, None, Some(&y.nodes()[j])) + delta_table[li][lj + 1];
                let whole = orl_x[i] == ox && orl_y[j] == oy;
                if approx_eq(del, delta_table[li][lj]) {
                    fwd[li + 1][lj] += here;
                }
                if approx_eq(ins, delta_table[li][lj]) {
                    fwd[li][lj + 1] += here;
                }
                if whole {
                    let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + delta_table[li + 1][lj + 1];
                    if approx_eq(rep, delta_table[li][lj]) {
                        fwd[li + 1][lj + 1] += here;
                    }
                } else {
                    let loi = orl_x[i] + 1 - i_root;
                    let loj = orl_y[j] + 1 - j_root;
                    let jump = delta_table[loi][loj] + d[i][j];
                    if approx_eq(jump, delta_table[li][lj]) {
                        let sub = compute_forest(memo, x, y, d, delta, i, j)?;
                        fwd[loi][loj] += here * sub.bwd[0][0];
                    }
                }
            } else if li < height - 1 {
                fwd[li + 1][lj] += here;
            } else if lj < width - 1 {
                fwd[li][lj + 1] += here;
            }
        }
    }

    let info = Rc::new(ForestInfo { height, width, delta: delta_table, fwd, bwd });
    memo.insert((i_root, j_root), Rc::clone(&info));
    Ok(info)
}

/// Samples one alignment uniformly at random from the set of optimal tree
/// alignments, weighting each option by its backward co-optimal count.
pub fn ted_backtrace_stochastic<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
    rng: &mut impl Rng,
) -> Result<Alignment> {
    let (m, n) = (x.len(), y.len());
    if m == 0 || n == 0 {
        return ted_backtrace(x, y, delta);
    }
    let d = forward_table(x, y, &delta)?;
    let mut memo = Memo::new();
    sample_forest(&mut memo, x, y, &d, &delta, 0, 0, rng)
}

fn sample_forest<T: std::fmt::Debug>(
    memo: &mut Memo,
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i_root: usize,
    j_root: usize,
    rng: &mut impl Rng,
) -> Result<Alignment> {
    let info = compute_forest(memo, x, y, d, delta, i_root, j_root)?;
    let orl_x = x.orl();
    let orl_y = y.orl();
    let ox = orl_x[i_root];
    let oy = orl_y[j_root];

    enum Choice {
        Rep,
        Del,
        Ins,
        Jump(usize, usize),
    }

    let mut alignment = Alignment::new();
    let (mut li, mut lj) = (0, 0);
    while (li, lj) != (info.height - 1, info.width - 1) {
        let i = i_root + li;
        let j = j_root + lj;
        let mut options: Vec<(Choice, u64)> = Vec::with_capacity(3);

        if li < info.height - 1 && lj < info.width - 1 {
            let whole = orl_x[i] == ox && orl_y[j] == oy;
            let del = edge_cost(delta, Some(&x.nodes()[i]), None) + info.delta[li + 1][lj];
            if approx_eq(del, info.delta[li][lj]) {
                options.push((Choice::Del, info.bwd[li + 1][lj]));
            }
            let ins = edge_cost(delta, None, Some(&y.nodes()[j])) + info.delta[li][lj + 1];
            if approx_eq(ins, info.delta[li][lj]) {
                options.push((Choice::Ins, info.bwd[li][lj + 1]));
            }
            if whole {
                let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + info.delta[li + 1][lj + 1];
                if approx_eq(rep, info.delta[li][lj]) {
                    options.push((Choice::Rep, info.bwd[li + 1][lj + 1]));
                }
            } else {
                let loi = orl_x[i] + 1 - i_root;
                let loj = orl_y[j] + 1 - j_root;
                let jump = info.delta[loi][loj] + d[i][j];
                if approx_eq(jump, info.delta[li][lj]) {
                    let sub_total = compute_forest(memo, x, y, d, delta, i, j)?.bwd[0][0];
                    options.push((Choice::Jump(loi, loj), sub_total * info.bwd[loi][loj]));
                }
            }
        } else if li < info.height - 1 {
            options.push((Choice::Del, info.bwd[li + 1][lj]));
        } else {
            options.push((Choice::Ins, info.bwd[li][lj + 1]));
        }

        let total: u64 = options.iter().map(|(_, w)| w).sum();
        debug_assert!(total > 0, "no co-optimal successor at forest cell ({li}, {lj})");
        #[allow(clippy::cast_precision_loss)]
        let mut draw = rng.random::<f64>() * total as f64;
        let mut chosen_idx = options.len() - 1;
        for (idx, (_, weight)) in options.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let w = *weight as f64;
            if draw < w {
                chosen_idx = idx;
                break;
            }
            draw -= w;
        }

        match &options[chosen_idx].0 {
            Choice::Rep => {
                alignment.append_tuple(isize_of(i), isize_of(j), None);
                li += 1;
                lj += 1;
            }
            Choice::Del => {
                alignment.append_tuple(isize_of(i), -1, None);
                li += 1;
            }
            Choice::Ins => {
                alignment.append_tuple(-1, isize_of(j), None);
                lj += 1;
            }
            Choice::Jump(loi, loj) => {
                let sub = sample_forest(memo, x, y, d, delta, i, j, rng)?;
                for step in sub.steps() {
                    alignment.append_tuple(step.i, step.j, step.op.clone());
                }
                li = *loi;
                lj = *loj;
            }
        }
    }
    Ok(alignment)
}

/// Computes the marginal co-optimal-alignment matrix `(P, K, k)` for tree
/// edit distance, analogous to [`crate::sed::sed_backtrace_matrix`].
pub fn ted_backtrace_matrix<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<u64>>, u64)> {
    let (m, n) = (x.len(), y.len());
    let mut probabilities = vec![vec![0.0; n + 1]; m + 1];
    if m == 0 || n == 0 {
        for row in probabilities.iter_mut().take(m) {
            row[n] = 1.0;
        }
        for j in 0..n {
            probabilities[m][j] = 1.0;
        }
        return Ok((probabilities, vec![vec![0; n]; m], 1));
    }

    let d = forward_table(x, y, &delta)?;
    let mut memo = Memo::new();
    let root = compute_forest(&mut memo, x, y, &d, &delta, 0, 0)?;
    let k = root.bwd[0][0];

    let mut counts = vec![vec![0_u64; n]; m];
    accumulate(&mut memo, x, y, &d, &delta, 0, 0, 1, 1, &mut counts)?;

    if k > 0 {
        #[allow(clippy::cast_precision_loss)]
        let k_f = k as f64;
        for i in 0..m {
            let matched: u64 = counts[i].iter().sum();
            for j in 0..n {
                #[allow(clippy::cast_precision_loss)]
                {
                    probabilities[i][j] = counts[i][j] as f64 / k_f;
                }
            }
            #[allow(clippy::cast_precision_loss)]
            {
                probabilities[i][n] = (k - matched) as f64 / k_f;
            }
        }
        for j in 0..n {
            let matched: u64 = (0..m).map(|i| counts[i][j]).sum();
            #[allow(clippy::cast_precision_loss)]
            {
                probabilities[m][j] = (k - matched) as f64 / k_f;
            }
        }
    }
    Ok((probabilities, counts, k))
}

#[allow(clippy::too_many_arguments)]
fn accumulate<T: std::fmt::Debug>(
    memo: &mut Memo,
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i_root: usize,
    j_root: usize,
    outer_f: u64,
    outer_b: u64,
    counts: &mut [Vec<u64>],
) -> Result<()> {
    let info = compute_forest(memo, x, y, d, delta, i_root, j_root)?;
    let orl_x = x.orl();
    let orl_y = y.orl();
    let ox = orl_x[i_root];
    let oy = orl_y[j_root];

    for li in 0..info.height - 1 {
        let i = i_root + li;
        for lj in 0..info.width - 1 {
            let j = j_root + lj;
            let whole = orl_x[i] == ox && orl_y[j] == oy;
            if whole {
                let rep = edge_cost(delta, Some(&x.nodes()[i]), Some(&y.nodes()[j])) + info.delta[li + 1][lj + 1];
                if approx_eq(rep, info.delta[li][lj]) {
                    counts[i][j] += outer_f * info.fwd[li][lj] * info.bwd[li + 1][lj + 1] * outer_b;
                }
            } else {
                let loi = orl_x[i] + 1 - i_root;
                let loj = orl_y[j] + 1 - j_root;
                let jump = info.delta[loi][loj] + d[i][j];
                if approx_eq(jump, info.delta[li][lj]) {
                    let new_f = outer_f * info.fwd[li][lj];
                    let new_b = info.bwd[loi][loj] * outer_b;
                    accumulate(memo, x, y, d, delta, i, j, new_f, new_b, counts)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::{ted_backtrace, ted_backtrace_matrix, ted_backtrace_stochastic};
    use crate::alignment::Alignment;
    use crate::tree::Tree;

    fn kron(a: Option<&char>, b: Option<&char>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) if a == b => 0.0,
            _ => 1.0,
        }
    }

    fn tree(nodes: &str, adj: Vec<Vec<usize>>) -> Tree<char> {
        Tree::new(nodes.chars().collect(), adj).expect("well-formed tree")
    }

    #[test]
    fn deterministic_backtrace_matches_literal_scenario() {
        let y = tree("abcde", vec![vec![1, 4], vec![2, 3], vec![], vec![], vec![]]);
        let z = tree("fg", vec![vec![1], vec![]]);

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
    fn backtrace_cost_equals_distance() {
        let y = tree("abcde", vec![vec![1, 4], vec![2, 3], vec![], vec![], vec![]]);
        let z = tree("fg", vec![vec![1], vec![]]);
        let actual = ted_backtrace(&y, &z, kron).expect("unit delta never invalid");
        let distance = super::super::ted(&y, &z, kron).expect("unit delta never invalid");
        assert!((actual.cost(y.nodes(), z.nodes(), kron) - distance).abs() < 1e-9);
    }

    #[test]
    fn backtrace_matrix_matches_literal_scenario() {
        let y = tree("abcde", vec![vec![1, 4], vec![2, 3], vec![], vec![], vec![]]);
        let z = tree("fg", vec![vec![1], vec![]]);
        let (probabilities, counts, k) = ted_backtrace_matrix(&y, &z, kron).expect("unit delta never invalid");

        assert_eq!(k, 6);
        let mut expected = vec![vec![0; 2]; 5];
        expected[0][0] = 4;
        expected[1][0] = 2;
        expected[1][1] = 1;
        expected[2][1] = 2;
        expected[3][1] = 2;
        expected[4][1] = 1;
        assert_eq!(counts, expected);

        for row in &probabilities[..y.len()] {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        for j in 0..z.len() {
            let sum: f64 = probabilities[..y.len() + 1].iter().map(|row| row[j]).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn stochastic_backtrace_always_achieves_optimal_cost() {
        let y = tree("abcde", vec![vec![1, 4], vec![2, 3], vec![], vec![], vec![]]);
        let z = tree("fg", vec![vec![1], vec![]]);
        let distance = super::super::ted(&y, &z, kron).expect("unit delta never invalid");
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let actual = ted_backtrace_stochastic(&y, &z, kron, &mut rng).expect("unit delta never invalid");
            assert!((actual.cost(y.nodes(), z.nodes(), kron) - distance).abs() < 1e-9);
        }
    }
}
