//! Algebraic dynamic programming over a user-specified regular grammar
//! (C4): a single engine that makes sequence edit distance, affine-gap
//! distance, and skip-cost variants instances of one forward DP plus the
//! shared backtrace framework.

mod affine;
mod backtrace;

pub use affine::{aed, aed_backtrace, aed_backtrace_matrix, aed_backtrace_stochastic, affine_grammar};
pub use backtrace::{backtrace, backtrace_matrix, backtrace_stochastic};

use crate::error::{Error, Result};
use crate::grammar::CompiledGrammar;

/// Identifies a grammar operation by category and its dense per-category
/// index, so a `δ` map can dispatch on which transition fired without ever
/// touching a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpId {
    /// A replacement transition, indexed into the grammar's replacement ops.
    Rep(usize),
    /// A deletion transition, indexed into the grammar's deletion ops.
    Del(usize),
    /// An insertion transition, indexed into the grammar's insertion ops.
    Ins(usize),
}

/// Wraps a single `(a, b) -> cost` callable so it can stand in for a full
/// `δ` map: every operation in the grammar is charged the same cost,
/// regardless of which one fired. This is the Rust shape of spec's "a single
/// callable is accepted and broadcast to all ops".
pub fn broadcast<T>(f: impl Fn(Option<&T>, Option<&T>) -> f64 + Copy) -> impl Fn(OpId, Option<&T>, Option<&T>) -> f64 + Copy {
    move |_op, a, b| f(a, b)
}

fn check_cost(value: f64) -> Result<f64> {
    if value.is_nan() || value < 0.0 {
        return Err(Error::InvalidCost { value, a: None, b: None });
    }
    Ok(value)
}

/// Forward DP table: `table[a][i][j]` is the minimum cost of deriving a
/// string covering `x[i..]` against `y[j..]`, starting from nonterminal `a`.
pub(crate) type Table = Vec<Vec<Vec<f64>>>;

/// Computes the forward table for grammar `grammar` over inputs `x`, `y`
/// under `delta`.
pub(crate) fn forward_table<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: &impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
) -> Result<Table> {
    let (m, n) = (x.len(), y.len());
    let size = grammar.size();
    let mut table = vec![vec![vec![f64::INFINITY; n + 1]; m + 1]; size];

    for (a, accepting) in (0..size).map(|a| (a, grammar.accepting().contains(&a))) {
        table[a][m][n] = if accepting { 0.0 } else { f64::INFINITY };
    }

    for i in (0..=m).rev() {
        for j in (0..=n).rev() {
            if (i, j) == (m, n) {
                continue;
            }
            for a in 0..size {
                let mut best = f64::INFINITY;
                if i < m && j < n {
                    for &(op, b) in grammar.reps_from(a) {
                        let cost = check_cost(delta(OpId::Rep(op), Some(&x[i]), Some(&y[j])))? + table[b][i + 1][j + 1];
                        best = best.min(cost);
                    }
                }
                if i < m {
                    for &(op, b) in grammar.dels_from(a) {
                        let cost = check_cost(delta(OpId::Del(op), Some(&x[i]), None))? + table[b][i + 1][j];
                        best = best.min(cost);
                    }
                }
                if j < n {
                    for &(op, b) in grammar.inss_from(a) {
                        let cost = check_cost(delta(OpId::Ins(op), None, Some(&y[j])))? + table[b][i][j + 1];
                        best = best.min(cost);
                    }
                }
                table[a][i][j] = best;
            }
        }
    }
    Ok(table)
}

/// Grammar-driven edit distance between `x` and `y`.
///
/// # Errors
/// Returns [`Error::NoAcceptingParse`] if no derivation of the grammar's
/// start nonterminal reaches an accepting state, and [`Error::InvalidCost`]
/// if `delta` returns a negative or `NaN` value.
pub fn edit_distance<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    grammar: &CompiledGrammar,
    delta: impl Fn(OpId, Option<&T>, Option<&T>) -> f64,
) -> Result<f64> {
    ftlog::trace!(
        "adp: computing distance between sequences of length {} and {} over a {}-nonterminal grammar",
        x.len(),
        y.len(),
        grammar.size()
    );
    let table = forward_table(x, y, grammar, &delta)?;
    let distance = table[grammar.start()][0][0];
    if distance.is_infinite() {
        return Err(Error::NoAcceptingParse { len_x: x.len(), len_y: y.len() });
    }
    ftlog::debug!("adp: distance = {distance}");
    Ok(distance)
}

#[cfg(test)]
mod tests {
    use super::{broadcast, edit_distance, OpId};
    use crate::error::Error;
    use crate::grammar::Grammar;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn unit_grammar() -> Grammar {
        let mut gra = Grammar::new("A", ["A"]);
        gra.append_replacement("A", "A", "rep");
        gra.append_deletion("A", "A", "del");
        gra.append_insertion("A", "A", "ins");
        gra
    }

    fn kron(a: Option<&char>, b: Option<&char>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) if a == b => 0.0,
            _ => 1.0,
        }
    }

    #[test]
    fn identity_grammar_reproduces_sed() {
        let gra = unit_grammar().compile().expect("well-formed grammar compiles");
        let x = chars("abcde");
        let y = chars("bdef");
        let distance = edit_distance(&x, &y, &gra, broadcast(kron)).expect("unit delta never invalid");
        let sed_distance = crate::sed::sed(&x, &y, kron).expect("unit delta never invalid");
        assert!((distance - sed_distance).abs() < 1e-9);
    }

    #[test]
    fn skip_grammar_matches_literal_scenario() {
        // Skdel/Skins accept mid-gap too.
        let mut gra = Grammar::new("A", ["A", "Skdel", "Skins"]);
        gra.append_replacement("A", "A", "rep");
        gra.append_deletion("A", "Skdel", "del");
        gra.append_insertion("A", "Skins", "ins");
        gra.append_replacement("Skdel", "A", "rep");
        gra.append_deletion("Skdel", "Skdel", "skdel");
        gra.append_replacement("Skins", "A", "rep");
        gra.append_insertion("Skins", "Skins", "skins");
        let compiled = gra.compile().expect("well-formed grammar compiles");

        let left = chars("abc");
        let right = chars("adefc");
        let delta = |op: OpId, a: Option<&char>, b: Option<&char>| match op {
            OpId::Rep(_) => kron(a, b),
            OpId::Del(_) | OpId::Ins(_) => 0.5,
        };
        let distance = edit_distance(&left, &right, &compiled, delta).expect("well-formed grammar has a parse");
        assert!((distance - 2.5).abs() < 1e-9);
    }

    #[test]
    fn ungrammatical_input_raises_no_accepting_parse() {
        // A grammar whose only accepting state cannot be reached once any
        // input remains: start == accepting with no self loops at all means
        // any nonempty input has no derivation.
        let gra = Grammar::new("A", ["A"]).compile().expect("well-formed grammar compiles");
        let x = chars("a");
        let y: Vec<char> = vec![];
        let err = edit_distance(&x, &y, &gra, broadcast(kron)).unwrap_err();
        assert!(matches!(err, Error::NoAcceptingParse { .. }));
    }
}
