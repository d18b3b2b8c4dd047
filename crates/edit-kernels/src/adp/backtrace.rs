//! Deterministic, stochastic, and marginal-matrix backtrace for
//! [`super::edit_distance`], keyed on `(nonterminal, i, j)` instead of
//! plain `(i, j)`.

use rand::Rng;

use super::{check_cost, forward_table, OpId, Table};
use crate::alignment::Alignment;
use crate::error::{Error, Result};
use crate::grammar::CompiledGrammar;
use crate::tolerance::approx_eq;

fn isize_of(i: usize) -> isize {
    isize::try_from(i).unwrap_or(isize::MAX)
}

/// Reconstructs one optimal derivation by a fixed tie-break walk: at each
/// `(a, i, j)`, the first transition achieving the cell's minimum wins, in
/// declaration order within a category and category order replace, delete,
/// insert.
///
/// # Errors
/// Returns [`Error::NoAcceptingParse`] if the grammar has no accepting
/// derivation for `x`/`y`.
pub fn backtrace<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
) -> Result<Alignment> {
    let table = forward_table(x, y, grammar, &delta)?;
    let (m, n) = (x.len(), y.len());
    if table[grammar.start()][0][0].is_infinite() {
        return Err(Error::NoAcceptingParse { len_x: m, len_y: n });
    }

    let mut alignment = Alignment::new();
    let (mut a, mut i, mut j) = (grammar.start(), 0, 0);
    while (i, j) != (m, n) {
        let mut moved = false;
        if i < m && j < n {
            for &(op, b) in grammar.reps_from(a) {
                let cost = check_cost(delta(OpId::Rep(op), Some(&x[i]), Some(&y[j])))? + table[b][i + 1][j + 1];
                if approx_eq(cost, table[a][i][j]) {
                    alignment.append_tuple(isize_of(i), isize_of(j), Some(grammar.rep_name(op).to_string()));
                    a = b;
                    i += 1;
                    j += 1;
                    moved = true;
                    break;
                }
            }
        }
        if !moved && i < m {
            for &(op, b) in grammar.dels_from(a) {
                let cost = check_cost(delta(OpId::Del(op), Some(&x[i]), None))? + table[b][i + 1][j];
                if approx_eq(cost, table[a][i][j]) {
                    alignment.append_tuple(isize_of(i), -1, Some(grammar.del_name(op).to_string()));
                    a = b;
                    i += 1;
                    moved = true;
                    break;
                }
            }
        }
        if !moved {
            for &(op, b) in grammar.inss_from(a) {
                let cost = check_cost(delta(OpId::Ins(op), None, Some(&y[j])))? + table[b][i][j + 1];
                if approx_eq(cost, table[a][i][j]) {
                    alignment.append_tuple(-1, isize_of(j), Some(grammar.ins_name(op).to_string()));
                    a = b;
                    j += 1;
                    moved = true;
                    break;
                }
            }
        }
        debug_assert!(moved, "no co-optimal successor at ({a}, {i}, {j})");
        if !moved {
            break;
        }
    }
    Ok(alignment)
}

/// Backward co-optimal-derivation counts: `counts[a][i][j]` is the number of
/// optimal derivations from `(a, i, j)` onward.
fn backward_counts<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: &impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
    table: &Table,
) -> Result<Table3U> {
    let (m, n) = (x.len(), y.len());
    let size = grammar.size();
    let mut counts = vec![vec![vec![0_u64; n + 1]; m + 1]; size];
    for (a, accepting) in (0..size).map(|a| (a, grammar.accepting().contains(&a))) {
        counts[a][m][n] = u64::from(accepting);
    }

    for i in (0..=m).rev() {
        for j in (0..=n).rev() {
            if (i, j) == (m, n) {
                continue;
            }
            for a in 0..size {
                let mut total = 0_u64;
                if i < m && j < n {
                    for &(op, b) in grammar.reps_from(a) {
                        let cost = check_cost(delta(OpId::Rep(op), Some(&x[i]), Some(&y[j])))? + table[b][i + 1][j + 1];
                        if approx_eq(cost, table[a][i][j]) {
                            total += counts[b][i + 1][j + 1];
                        }
                    }
                }
                if i < m {
                    for &(op, b) in grammar.dels_from(a) {
                        let cost = check_cost(delta(OpId::Del(op), Some(&x[i]), None))? + table[b][i + 1][j];
                        if approx_eq(cost, table[a][i][j]) {
                            total += counts[b][i + 1][j];
                        }
                    }
                }
                if j < n {
                    for &(op, b) in grammar.inss_from(a) {
                        let cost = check_cost(delta(OpId::Ins(op), None, Some(&y[j])))? + table[b][i][j + 1];
                        if approx_eq(cost, table[a][i][j]) {
                            total += counts[b][i][j + 1];
                        }
                    }
                }
                counts[a][i][j] = total;
            }
        }
    }
    Ok(counts)
}

/// Forward co-optimal-derivation-prefix counts: `counts[a][i][j]` is the
/// number of optimal derivation prefixes from `(start, 0, 0)` reaching
/// `(a, i, j)`.
fn forward_counts<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: &impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
    table: &Table,
) -> Result<Table3U> {
    let (m, n) = (x.len(), y.len());
    let size = grammar.size();
    let mut counts = vec![vec![vec![0_u64; n + 1]; m + 1]; size];
    counts[grammar.start()][0][0] = 1;

    for i in 0..=m {
        for j in 0..=n {
            for a in 0..size {
                let here = counts[a][i][j];
                if here == 0 {
                    continue;
                }
                if i < m && j < n {
                    for &(op, b) in grammar.reps_from(a) {
                        let cost = check_cost(delta(OpId::Rep(op), Some(&x[i]), Some(&y[j])))? + table[b][i + 1][j + 1];
                        if approx_eq(cost, table[a][i][j]) {
                            counts[b][i + 1][j + 1] += here;
                        }
                    }
                }
                if i < m {
                    for &(op, b) in grammar.dels_from(a) {
                        let cost = check_cost(delta(OpId::Del(op), Some(&x[i]), None))? + table[b][i + 1][j];
                        if approx_eq(cost, table[a][i][j]) {
                            counts[b][i + 1][j] += here;
                        }
                    }
                }
                if j < n {
                    for &(op, b) in grammar.inss_from(a) {
                        let cost = check_cost(delta(OpId::Ins(op), None, Some(&y[j])))? + table[b][i][j + 1];
                        if approx_eq(cost, table[a][i][j]) {
                            counts[b][i][j + 1] += here;
                        }
                    }
                }
            }
        }
    }
    Ok(counts)
}

type Table3U = Vec<Vec<Vec<u64>>>;

/// Samples one derivation uniformly at random from the set of optimal
/// derivations, weighting each transition by its backward co-optimal count.
///
/// # Errors
/// Returns [`Error::NoAcceptingParse`] if the grammar has no accepting
/// derivation for `x`/`y`.
pub fn backtrace_stochastic<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
    rng: &mut impl Rng,
) -> Result<Alignment> {
    let table = forward_table(x, y, grammar, &delta)?;
    let (m, n) = (x.len(), y.len());
    if table[grammar.start()][0][0].is_infinite() {
        return Err(Error::NoAcceptingParse { len_x: m, len_y: n });
    }
    let counts = backward_counts(x, y, grammar, &delta, &table)?;

    enum Choice {
        Rep(usize, usize),
        Del(usize, usize),
        Ins(usize, usize),
    }

    let mut alignment = Alignment::new();
    let (mut a, mut i, mut j) = (grammar.start(), 0, 0);
    while (i, j) != (m, n) {
        let mut options: Vec<(Choice, u64)> = Vec::new();
        if i < m && j < n {
            for &(op, b) in grammar.reps_from(a) {
                let cost = check_cost(delta(OpId::Rep(op), Some(&x[i]), Some(&y[j])))? + table[b][i + 1][j + 1];
                if approx_eq(cost, table[a][i][j]) {
                    options.push((Choice::Rep(op, b), counts[b][i + 1][j + 1]));
                }
            }
        }
        if i < m {
            for &(op, b) in grammar.dels_from(a) {
                let cost = check_cost(delta(OpId::Del(op), Some(&x[i]), None))? + table[b][i + 1][j];
                if approx_eq(cost, table[a][i][j]) {
                    options.push((Choice::Del(op, b), counts[b][i + 1][j]));
                }
            }
        }
        if j < n {
            for &(op, b) in grammar.inss_from(a) {
                let cost = check_cost(delta(OpId::Ins(op), None, Some(&y[j])))? + table[b][i][j + 1];
                if approx_eq(cost, table[a][i][j]) {
                    options.push((Choice::Ins(op, b), counts[b][i][j + 1]));
                }
            }
        }

        let total: u64 = options.iter().map(|(_, w)| w).sum();
        debug_assert!(total > 0, "no co-optimal successor at ({a}, {i}, {j})");
        #[allow(clippy::cast_precision_loss)]
        let mut draw = rng.random::<f64>() * total as f64;
        let mut chosen = options.len() - 1;
        for (idx, (_, weight)) in options.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let w = *weight as f64;
            if draw < w {
                chosen = idx;
                break;
            }
            draw -= w;
        }

        match options.into_iter().nth(chosen).map(|(choice, _)| choice) {
            Some(Choice::Rep(op, b)) => {
                alignment.append_tuple(isize_of(i), isize_of(j), Some(grammar.rep_name(op).to_string()));
                a = b;
                i += 1;
                j += 1;
            }
            Some(Choice::Del(op, b)) => {
                alignment.append_tuple(isize_of(i), -1, Some(grammar.del_name(op).to_string()));
                a = b;
                i += 1;
            }
            Some(Choice::Ins(op, b)) => {
                alignment.append_tuple(-1, isize_of(j), Some(grammar.ins_name(op).to_string()));
                a = b;
                j += 1;
            }
            None => unreachable!("total > 0 guarantees a chosen option"),
        }
    }
    Ok(alignment)
}

/// Computes the marginal co-optimal-derivation tensors `(P_rep, P_del,
/// P_ins, K)`.
///
/// `P_rep[op][i][j]`, `P_del[op][i]`, and `P_ins[op][j]` are the
/// probability, over a uniformly-random co-optimal derivation, that
/// operation `op` fires at the given position(s); `K` is the total number of
/// co-optimal derivations. For every `i`, `Σ_{op,j} P_rep[op][i][j] +
/// Σ_op P_del[op][i] = 1`, and symmetrically for every `j` with insertions.
///
/// # Errors
/// Returns [`Error::NoAcceptingParse`] if the grammar has no accepting
/// derivation for `x`/`y`.
#[allow(clippy::type_complexity)]
pub fn backtrace_matrix<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
) -> Result<(Vec<Vec<Vec<f64>>>, Vec<Vec<f64>>, Vec<Vec<f64>>, u64)> {
    let table = forward_table(x, y, grammar, &delta)?;
    let (m, n) = (x.len(), y.len());
    if table[grammar.start()][0][0].is_infinite() {
        return Err(Error::NoAcceptingParse { len_x: m, len_y: n });
    }
    let backward = backward_counts(x, y, grammar, &delta, &table)?;
    let forward = forward_counts(x, y, grammar, &delta, &table)?;
    let k = backward[grammar.start()][0][0];

    let n_rep = (0..grammar.size()).flat_map(|a| grammar.reps_from(a).iter().map(|&(op, _)| op)).max().map_or(0, |v| v + 1);
    let n_del = (0..grammar.size()).flat_map(|a| grammar.dels_from(a).iter().map(|&(op, _)| op)).max().map_or(0, |v| v + 1);
    let n_ins = (0..grammar.size()).flat_map(|a| grammar.inss_from(a).iter().map(|&(op, _)| op)).max().map_or(0, |v| v + 1);

    let mut k_rep = vec![vec![vec![0_u64; n]; m]; n_rep];
    let mut k_del = vec![vec![0_u64; m]; n_del];
    let mut k_ins = vec![vec![0_u64; n]; n_ins];

    for i in 0..m {
        for j in 0..n {
            for a in 0..grammar.size() {
                let here = forward[a][i][j];
                if here == 0 {
                    continue;
                }
                for &(op, b) in grammar.reps_from(a) {
                    let cost = check_cost(delta(OpId::Rep(op), Some(&x[i]), Some(&y[j])))? + table[b][i + 1][j + 1];
                    if approx_eq(cost, table[a][i][j]) {
                        k_rep[op][i][j] += here * backward[b][i + 1][j + 1];
                    }
                }
            }
        }
    }
    for i in 0..m {
        for j in 0..=n {
            for a in 0..grammar.size() {
                let here = forward[a][i][j];
                if here == 0 || i >= m {
                    continue;
                }
                for &(op, b) in grammar.dels_from(a) {
                    let cost = check_cost(delta(OpId::Del(op), Some(&x[i]), None))? + table[b][i + 1][j];
                    if approx_eq(cost, table[a][i][j]) {
                        k_del[op][i] += here * backward[b][i + 1][j];
                    }
                }
            }
        }
    }
    for j in 0..n {
        for i in 0..=m {
            for a in 0..grammar.size() {
                let here = forward[a][i][j];
                if here == 0 || j >= n {
                    continue;
                }
                for &(op, b) in grammar.inss_from(a) {
                    let cost = check_cost(delta(OpId::Ins(op), None, Some(&y[j])))? + table[b][i][j + 1];
                    if approx_eq(cost, table[a][i][j]) {
                        k_ins[op][j] += here * backward[b][i][j + 1];
                    }
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let k_f = if k == 0 { 1.0 } else { k as f64 };
    let to_prob3 = |counts: Vec<Vec<Vec<u64>>>| -> Vec<Vec<Vec<f64>>> {
        counts
            .into_iter()
            .map(|op_slice| op_slice.into_iter().map(|row| row.into_iter().map(|c| f64_of(c) / k_f).collect()).collect())
            .collect()
    };
    let to_prob2 = |counts: Vec<Vec<u64>>| -> Vec<Vec<f64>> {
        counts.into_iter().map(|row| row.into_iter().map(|c| f64_of(c) / k_f).collect()).collect()
    };

    Ok((to_prob3(k_rep), to_prob2(k_del), to_prob2(k_ins), k))
}

#[allow(clippy::cast_precision_loss)]
fn f64_of(v: u64) -> f64 {
    v as f64
}
