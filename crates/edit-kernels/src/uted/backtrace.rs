//! Deterministic, stochastic, and marginal-matrix backtrace for
//! [`super::uted`].
//!
//! A "co-optimal assignment" here is a permutation of [`super::build_matrix`]
//! achieving that matrix's minimum cost. Unlike the sequence/tree kernels,
//! where ties are counted exactly via one forward/backward DP pass, counting
//! every tied assignment of an `n x n` matrix is itself combinatorial; this
//! module enumerates them by brute force up to [`BRUTE_FORCE_LIMIT`] and
//! falls back to the single assignment [`crate::munkres::munkres`] already
//! found beyond that (under-counting ties among wide fan-outs rather than
//! paying factorial cost — noted in DESIGN.md).

use rand::Rng;

use super::{build_matrix, forward_table};
use crate::alignment::Alignment;
use crate::error::Result;
use crate::munkres::munkres;
use crate::tolerance::approx_eq;
use crate::tree::Tree;

/// Above this matrix size, co-optimal assignment enumeration falls back to
/// the single assignment Munkres reports, since `n!` permutations becomes
/// impractical to enumerate (`8! = 40320`).
const BRUTE_FORCE_LIMIT: usize = 8;

fn isize_of(i: usize) -> isize {
    isize::try_from(i).unwrap_or(isize::MAX)
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut items: Vec<usize> = (0..n).collect();
    let mut result = Vec::new();
    permute(&mut items, 0, &mut result);
    result
}

fn permute(items: &mut Vec<usize>, k: usize, result: &mut Vec<Vec<usize>>) {
    if k == items.len() {
        result.push(items.clone());
        return;
    }
    for i in k..items.len() {
        items.swap(k, i);
        permute(items, k + 1, result);
        items.swap(k, i);
    }
}

/// Every permutation of `matrix` achieving its minimum finite cost, bounded
/// by [`BRUTE_FORCE_LIMIT`].
fn co_optimal_assignments(matrix: &[Vec<f64>]) -> Result<Vec<Vec<usize>>> {
    let n = matrix.len();
    let optimal = munkres(matrix)?;
    if n == 0 || n > BRUTE_FORCE_LIMIT {
        return Ok(vec![optimal]);
    }
    let best: f64 = optimal.iter().enumerate().map(|(row, &col)| matrix[row][col]).sum();
    let ties: Vec<Vec<usize>> = permutations(n)
        .into_iter()
        .filter(|perm| {
            let cost: f64 = perm.iter().enumerate().map(|(row, &col)| matrix[row][col]).sum();
            cost.is_finite() && approx_eq(cost, best)
        })
        .collect();
    if ties.is_empty() {
        Ok(vec![optimal])
    } else {
        Ok(ties)
    }
}

/// Appends a DFS-order chain of deletion tuples for every node in the
/// subtree rooted at `root` (which, since trees are stored in pre-order,
/// occupies the contiguous index range `root..=orl[root]`).
fn append_deletion_chain<T>(alignment: &mut Alignment, tree: &Tree<T>, root: usize) {
    for i in root..=tree.orl()[root] {
        alignment.append_tuple(isize_of(i), -1, None);
    }
}

fn append_insertion_chain<T>(alignment: &mut Alignment, tree: &Tree<T>, root: usize) {
    for j in root..=tree.orl()[root] {
        alignment.append_tuple(-1, isize_of(j), None);
    }
}

/// Reconstructs one optimal alignment by walking the Munkres assignment at
/// every visited node pair: matched children recurse, unmatched children on
/// either side emit a deletion/insertion chain over their whole subtree.
///
/// # Errors
/// Returns [`crate::error::Error::InvalidCost`]/[`crate::error::Error::DegenerateAssignment`]
/// under the same conditions as [`super::uted`].
pub fn uted_backtrace<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<Alignment> {
    let (m, n) = (x.len(), y.len());
    let mut alignment = Alignment::new();
    if m == 0 {
        append_insertion_chain(&mut alignment, y, 0);
        return Ok(alignment);
    }
    if n == 0 {
        append_deletion_chain(&mut alignment, x, 0);
        return Ok(alignment);
    }
    let d = forward_table(x, y, &delta)?;
    deterministic_pair(x, y, &d, &delta, 0, 0, &mut alignment)?;
    Ok(alignment)
}

fn deterministic_pair<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i: usize,
    j: usize,
    alignment: &mut Alignment,
) -> Result<()> {
    alignment.append_tuple(isize_of(i), isize_of(j), None);
    let cx = x.adj()[i].clone();
    let cy = y.adj()[j].clone();
    let (p, q) = (cx.len(), cy.len());
    let matrix = build_matrix(x, y, d, delta, i, j)?;
    let assignment = munkres(&matrix)?;

    for a in 0..p {
        if assignment[a] < q {
            deterministic_pair(x, y, d, delta, cx[a], cy[assignment[a]], alignment)?;
        } else {
            append_deletion_chain(alignment, x, cx[a]);
        }
    }
    for b in 0..q {
        if assignment[p + b] < q {
            append_insertion_chain(alignment, y, cy[b]);
        }
    }
    Ok(())
}

/// `k[i][j]` is the number of co-optimal derivations of the subtree pair
/// `(i, j)`, counted recursively: one term per co-optimal local assignment,
/// each the product of the co-optimal counts of its matched child pairs
/// (deleted/inserted children contribute a factor of `1`, since their
/// deletion/insertion chain has exactly one realization).
fn backward_counts<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<Vec<Vec<u64>>> {
    let (m, n) = (x.len(), y.len());
    let mut k = vec![vec![0_u64; n]; m];
    for i in (0..m).rev() {
        for j in 0..n {
            let cx = x.adj()[i].clone();
            let cy = y.adj()[j].clone();
            let q = cy.len();
            let matrix = build_matrix(x, y, d, delta, i, j)?;
            let assigns = co_optimal_assignments(&matrix)?;
            let mut total = 0_u64;
            for perm in &assigns {
                let mut prod = 1_u64;
                for (a, &c) in cx.iter().enumerate() {
                    if perm[a] < q {
                        prod = prod.saturating_mul(k[c][cy[perm[a]]]);
                    }
                }
                total = total.saturating_add(prod);
            }
            k[i][j] = total;
        }
    }
    Ok(k)
}

/// Samples one alignment uniformly at random from the set of co-optimal
/// alignments (within the enumeration bound documented on
/// [`co_optimal_assignments`]), weighting each local assignment by the
/// product of its matched children's co-optimal counts.
///
/// # Errors
/// See [`uted_backtrace`].
pub fn uted_backtrace_stochastic<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
    rng: &mut impl Rng,
) -> Result<Alignment> {
    let (m, n) = (x.len(), y.len());
    let mut alignment = Alignment::new();
    if m == 0 {
        append_insertion_chain(&mut alignment, y, 0);
        return Ok(alignment);
    }
    if n == 0 {
        append_deletion_chain(&mut alignment, x, 0);
        return Ok(alignment);
    }
    let d = forward_table(x, y, &delta)?;
    let k = backward_counts(x, y, &d, &delta)?;
    sample_pair(x, y, &d, &k, &delta, 0, 0, &mut alignment, rng)?;
    Ok(alignment)
}

#[allow(clippy::too_many_arguments)]
fn sample_pair<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    k: &[Vec<u64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i: usize,
    j: usize,
    alignment: &mut Alignment,
    rng: &mut impl Rng,
) -> Result<()> {
    alignment.append_tuple(isize_of(i), isize_of(j), None);
    let cx = x.adj()[i].clone();
    let cy = y.adj()[j].clone();
    let (p, q) = (cx.len(), cy.len());
    let matrix = build_matrix(x, y, d, delta, i, j)?;
    let assigns = co_optimal_assignments(&matrix)?;

    let weights: Vec<u64> = assigns
        .iter()
        .map(|perm| {
            (0..p).fold(1_u64, |acc, a| {
                if perm[a] < q {
                    acc.saturating_mul(k[cx[a]][cy[perm[a]]])
                } else {
                    acc
                }
            })
        })
        .collect();
    let total: u64 = weights.iter().sum();
    debug_assert!(total > 0, "no co-optimal assignment at node pair ({i}, {j})");
    #[allow(clippy::cast_precision_loss)]
    let mut draw = rng.random::<f64>() * total.max(1) as f64;
    let mut chosen = assigns.len() - 1;
    for (idx, &w) in weights.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let w = w as f64;
        if draw < w {
            chosen = idx;
            break;
        }
        draw -= w;
    }
    let assignment = &assigns[chosen];

    for a in 0..p {
        if assignment[a] < q {
            sample_pair(x, y, d, k, delta, cx[a], cy[assignment[a]], alignment, rng)?;
        } else {
            append_deletion_chain(alignment, x, cx[a]);
        }
    }
    for b in 0..q {
        if assignment[p + b] < q {
            append_insertion_chain(alignment, y, cy[b]);
        }
    }
    Ok(())
}

/// Computes the marginal co-optimal-match matrix `(P, K, k)`: `K[i][j]` is
/// the (weighted, over the full tree) number of co-optimal derivations in
/// which node `i` is matched to node `j`; `P` normalizes `K` by the total
/// co-optimal count `k`, with column `n`/row `m` holding deletion/insertion
/// mass exactly as in [`crate::ted::ted_backtrace_matrix`].
///
/// # Errors
/// See [`uted_backtrace`].
pub fn uted_backtrace_matrix<T: std::fmt::Debug>(
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
    let k = backward_counts(x, y, &d, &delta)?;
    let total = k[0][0];

    let mut counts = vec![vec![0_u64; n]; m];
    accumulate(x, y, &d, &k, &delta, 0, 0, 1, &mut counts)?;

    if total > 0 {
        #[allow(clippy::cast_precision_loss)]
        let k_f = total as f64;
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
                probabilities[i][n] = (total - matched) as f64 / k_f;
            }
        }
        for j in 0..n {
            let matched: u64 = (0..m).map(|i| counts[i][j]).sum();
            #[allow(clippy::cast_precision_loss)]
            {
                probabilities[m][j] = (total - matched) as f64 / k_f;
            }
        }
    }
    Ok((probabilities, counts, total))
}

fn accumulate<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    k: &[Vec<u64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i: usize,
    j: usize,
    mult: u64,
    counts: &mut [Vec<u64>],
) -> Result<()> {
    let cx = x.adj()[i].clone();
    let cy = y.adj()[j].clone();
    let (p, q) = (cx.len(), cy.len());
    let matrix = build_matrix(x, y, d, delta, i, j)?;
    let assigns = co_optimal_assignments(&matrix)?;

    for perm in &assigns {
        let matched: Vec<(usize, usize)> = (0..p).filter_map(|a| if perm[a] < q { Some((a, perm[a])) } else { None }).collect();
        for &(a, b) in &matched {
            let other: u64 = matched
                .iter()
                .filter(|&&(a2, _)| a2 != a)
                .map(|&(a2, b2)| k[cx[a2]][cy[b2]])
                .fold(1_u64, |acc, v| acc.saturating_mul(v));
            let child_mult = mult.saturating_mul(other);
            let (ci, cj) = (cx[a], cy[b]);
            counts[ci][cj] = counts[ci][cj].saturating_add(child_mult.saturating_mul(k[ci][cj]));
            accumulate(x, y, d, k, delta, ci, cj, child_mult, counts)?;
        }
    }
    Ok(())
}
