//! Affine-gap edit distance (`aed`): a thin instantiation of the ADP engine
//! over a fixed four-rule skip grammar, separating the cost of starting a
//! gap from the cost of extending one.

use rand::Rng;

use super::{backtrace, backtrace_matrix, backtrace_stochastic, edit_distance, OpId};
use crate::alignment::Alignment;
use crate::error::Result;
use crate::grammar::{CompiledGrammar, Grammar};

/// Nonterminal names used by [`affine_grammar`], exposed so callers building
/// their own variant grammar can reuse the naming convention.
pub const MATCHED: &str = "A";
/// Mid-deletion-gap nonterminal.
pub const SKIPPING_DEL: &str = "Skdel";
/// Mid-insertion-gap nonterminal.
pub const SKIPPING_INS: &str = "Skins";

/// Builds the grammar underlying [`aed`]: three nonterminals (`A`, `Skdel`,
/// `Skins`, all accepting), with a replacement returning to `A` from any
/// state, a deletion/insertion entering the matching skip state from `A`,
/// and a self-loop extending a skip state once entered.
#[must_use]
pub fn affine_grammar() -> Grammar {
    let mut gra = Grammar::new(MATCHED, [MATCHED, SKIPPING_DEL, SKIPPING_INS]);
    gra.append_replacement(MATCHED, MATCHED, "rep");
    gra.append_deletion(MATCHED, SKIPPING_DEL, "del");
    gra.append_insertion(MATCHED, SKIPPING_INS, "ins");
    gra.append_replacement(SKIPPING_DEL, MATCHED, "rep");
    gra.append_deletion(SKIPPING_DEL, SKIPPING_DEL, "skdel");
    gra.append_replacement(SKIPPING_INS, MATCHED, "rep");
    gra.append_insertion(SKIPPING_INS, SKIPPING_INS, "skins");
    gra
}

/// A `δ` map dispatching to `delta_sub` on replacement and to `delta_gap` on
/// either deletion or insertion op, regardless of gap-open vs gap-extend
/// category: [`affine_grammar`] does not distinguish the two at the cost
/// level, only at the derivation-structure level.
fn affine_delta<T>(
    delta_sub: impl Fn(&T, &T) -> f64,
    delta_gap: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> impl Fn(OpId, Option<&T>, Option<&T>) -> f64 {
    move |op, a, b| match op {
        OpId::Rep(_) => delta_sub(a.expect("replacement always has a left symbol"), b.expect("replacement always has a right symbol")),
        OpId::Del(_) | OpId::Ins(_) => delta_gap(a, b),
    }
}

fn compiled_grammar() -> CompiledGrammar {
    affine_grammar().compile().expect("affine_grammar is well-formed by construction")
}

/// Affine-gap edit distance between `x` and `y`: replacements are charged
/// `delta_sub`, and every unit of gap (deletion or insertion, opening or
/// extending) is charged `delta_gap`.
///
/// # Errors
/// Returns [`crate::error::Error::InvalidCost`] if either cost callable
/// returns a negative or `NaN` value. Never returns
/// [`crate::error::Error::NoAcceptingParse`]: every nonterminal in
/// [`affine_grammar`] is accepting, so a derivation always exists.
pub fn aed<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta_sub: impl Fn(&T, &T) -> f64,
    delta_gap: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<f64> {
    let gra = compiled_grammar();
    edit_distance(x, y, &gra, affine_delta(delta_sub, delta_gap))
}

/// Deterministic backtrace for [`aed`].
///
/// # Errors
/// See [`aed`].
pub fn aed_backtrace<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta_sub: impl Fn(&T, &T) -> f64,
    delta_gap: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<Alignment> {
    let gra = compiled_grammar();
    backtrace(x, y, &gra, affine_delta(delta_sub, delta_gap))
}

/// Stochastic backtrace for [`aed`], sampling uniformly over co-optimal
/// alignments.
///
/// # Errors
/// See [`aed`].
pub fn aed_backtrace_stochastic<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta_sub: impl Fn(&T, &T) -> f64,
    delta_gap: impl Fn(Option<&T>, Option<&T>) -> f64,
    rng: &mut impl Rng,
) -> Result<Alignment> {
    let gra = compiled_grammar();
    backtrace_stochastic(x, y, &gra, affine_delta(delta_sub, delta_gap), rng)
}

/// Marginal co-optimal-derivation matrices for [`aed`]; see
/// [`super::backtrace::backtrace_matrix`] for the tensor shapes returned.
///
/// # Errors
/// See [`aed`].
#[allow(clippy::type_complexity)]
pub fn aed_backtrace_matrix<T: std::fmt::Debug>(
    x: &[T],
    y: &[T],
    delta_sub: impl Fn(&T, &T) -> f64,
    delta_gap: impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<(Vec<Vec<Vec<f64>>>, Vec<Vec<f64>>, Vec<Vec<f64>>, u64)> {
    let gra = compiled_grammar();
    backtrace_matrix(x, y, &gra, affine_delta(delta_sub, delta_gap))
}
