//! Deterministic, stochastic, and marginal-matrix backtrace for [`super::sed`].

use rand::Rng;

use super::{check_cost, forward_table, Table};
use crate::alignment::Alignment;
use crate::error::Result;
use crate::tolerance::approx_eq;

/// Reconstructs one optimal alignment by a fixed tie-break walk: at each
/// cell, the first option achieving the cell's minimum wins, in the order
/// replace, delete, insert.
pub fn sed_backtrace<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<Alignment> {
    let table = forward_table(x, y, &delta)?;
    let (m, n) = (x.len(), y.len());
    let mut alignment = Alignment::new();
    let (mut i, mut j) = (0, 0);

    while (i, j) != (m, n) {
        if i < m && j < n {
            let rep = check_cost(delta(Some(&x[i]), Some(&y[j])), None, None)? + table[i + 1][j + 1];
            if approx_eq(rep, table[i][j]) {
                alignment.append_tuple(isize_of(i), isize_of(j), None);
                i += 1;
                j += 1;
                continue;
            }
        }
        if i < m {
            let del = check_cost(delta(Some(&x[i]), None), None, None)? + table[i + 1][j];
            if approx_eq(del, table[i][j]) {
                alignment.append_tuple(isize_of(i), -1, None);
                i += 1;
                continue;
            }
        }
        let ins = check_cost(delta(None, Some(&y[j])), None, None)? + table[i][j + 1];
        debug_assert!(approx_eq(ins, table[i][j]), "no co-optimal successor at ({i}, {j})");
        alignment.append_tuple(-1, isize_of(j), None);
        j += 1;
    }
    Ok(alignment)
}

fn isize_of(i: usize) -> isize {
    isize::try_from(i).unwrap_or(isize::MAX)
}

/// Backward co-optimal-alignment counts: `counts[i][j]` is the number of
/// optimal alignments from `(i, j)` onward to `(m, n)`.
fn backward_counts<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    table: &Table,
) -> Result<Vec<Vec<u64>>> {
    let (m, n) = (x.len(), y.len());
    let mut counts = vec![vec![0_u64; n + 1]; m + 1];
    counts[m][n] = 1;

    for i in (0..=m).rev() {
        for j in (0..=n).rev() {
            if (i, j) == (m, n) {
                continue;
            }
            let mut total = 0_u64;
            if i < m && j < n {
                let rep = check_cost(delta(Some(&x[i]), Some(&y[j])), None, None)? + table[i + 1][j + 1];
                if approx_eq(rep, table[i][j]) {
                    total += counts[i + 1][j + 1];
                }
            }
            if i < m {
                let del = check_cost(delta(Some(&x[i]), None), None, None)? + table[i + 1][j];
                if approx_eq(del, table[i][j]) {
                    total += counts[i + 1][j];
                }
            }
            if j < n {
                let ins = check_cost(delta(None, Some(&y[j])), None, None)? + table[i][j + 1];
                if approx_eq(ins, table[i][j]) {
                    total += counts[i][j + 1];
                }
            }
            counts[i][j] = total;
        }
    }
    Ok(counts)
}

/// Forward co-optimal-alignment counts: `counts[i][j]` is the number of
/// optimal alignment prefixes from `(0, 0)` reaching `(i, j)`.
fn forward_counts<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    table: &Table,
) -> Result<Vec<Vec<u64>>> {
    let (m, n) = (x.len(), y.len());
    let mut counts = vec![vec![0_u64; n + 1]; m + 1];
    counts[0][0] = 1;

    for i in 0..=m {
        for j in 0..=n {
            let here = counts[i][j];
            if here == 0 {
                continue;
            }
            if i < m && j < n {
                let rep = check_cost(delta(Some(&x[i]), Some(&y[j])), None, None)? + table[i + 1][j + 1];
                if approx_eq(rep, table[i][j]) {
                    counts[i + 1][j + 1] += here;
                }
            }
            if i < m {
                let del = check_cost(delta(Some(&x[i]), None), None, None)? + table[i + 1][j];
                if approx_eq(del, table[i][j]) {
                    counts[i + 1][j] += here;
                }
            }
            if j < n {
                let ins = check_cost(delta(None, Some(&y[j])), None, None)? + table[i][j + 1];
                if approx_eq(ins, table[i][j]) {
                    counts[i][j + 1] += here;
                }
            }
        }
    }
    Ok(counts)
}

/// Samples one alignment uniformly at random from the set of optimal
/// alignments.
///
/// Successor weights are backward co-optimal counts, not a naive per-step
/// uniform choice: weighting by count is what makes the walk uniform over
/// whole alignments rather than biased toward longer-surviving branches.
pub fn sed_backtrace_stochastic<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
    rng: &mut impl Rng,
) -> Result<Alignment> {
    let table = forward_table(x, y, &delta)?;
    let counts = backward_counts(x, y, &delta, &table)?;
    let (m, n) = (x.len(), y.len());
    let mut alignment = Alignment::new();
    let (mut i, mut j) = (0, 0);

    while (i, j) != (m, n) {
        let mut options: Vec<(isize, isize, u64)> = Vec::with_capacity(3);
        if i < m && j < n {
            let rep = check_cost(delta(Some(&x[i]), Some(&y[j])), None, None)? + table[i + 1][j + 1];
            if approx_eq(rep, table[i][j]) {
                options.push((isize_of(i) + 1, isize_of(j) + 1, counts[i + 1][j + 1]));
            }
        }
        if i < m {
            let del = check_cost(delta(Some(&x[i]), None), None, None)? + table[i + 1][j];
            if approx_eq(del, table[i][j]) {
                options.push((isize_of(i) + 1, isize_of(j), counts[i + 1][j]));
            }
        }
        if j < n {
            let ins = check_cost(delta(None, Some(&y[j])), None, None)? + table[i][j + 1];
            if approx_eq(ins, table[i][j]) {
                options.push((isize_of(i), isize_of(j) + 1, counts[i][j + 1]));
            }
        }

        let total: u64 = options.iter().map(|(_, _, w)| w).sum();
        debug_assert!(total > 0, "no co-optimal successor at ({i}, {j})");
        #[allow(clippy::cast_precision_loss)]
        let mut draw = rng.random::<f64>() * total as f64;
        let mut chosen = options[options.len() - 1];
        for option in &options {
            #[allow(clippy::cast_precision_loss)]
            let weight = option.2 as f64;
            if draw < weight {
                chosen = *option;
                break;
            }
            draw -= weight;
        }

        let (next_i, next_j, _) = chosen;
        if next_i > isize_of(i) && next_j > isize_of(j) {
            alignment.append_tuple(isize_of(i), isize_of(j), None);
        } else if next_i > isize_of(i) {
            alignment.append_tuple(isize_of(i), -1, None);
        } else {
            alignment.append_tuple(-1, isize_of(j), None);
        }
        i = usize::try_from(next_i).unwrap_or(i);
        j = usize::try_from(next_j).unwrap_or(j);
    }
    Ok(alignment)
}

/// Computes the marginal co-optimal-alignment matrix `(P, K, k)`.
///
/// `K[i][j]` tallies how many optimal alignments match position `i` of `x`
/// to position `j` of `y`; `k` is the total number of optimal alignments;
/// `P` is `(x.len() + 1) x (y.len() + 1)`, with an extra row/column
/// carrying each position's gap (deletion/insertion) probability so every
/// row and column of the real-position block sums to 1.
pub fn sed_backtrace_matrix<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<u64>>, u64)> {
    let table = forward_table(x, y, &delta)?;
    let backward = backward_counts(x, y, &delta, &table)?;
    let forward = forward_counts(x, y, &delta, &table)?;
    let (m, n) = (x.len(), y.len());
    let k = backward[0][0];

    let mut counts = vec![vec![0_u64; n]; m];
    for (i, row) in counts.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            let rep = check_cost(delta(Some(&x[i]), Some(&y[j])), None, None)? + table[i + 1][j + 1];
            if approx_eq(rep, table[i][j]) {
                *cell = forward[i][j] * backward[i + 1][j + 1];
            }
        }
    }

    let mut probabilities = vec![vec![0.0; n + 1]; m + 1];
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
