//! Unordered tree edit distance (C7): a constrained variant of [`crate::ted`]
//! that ignores child order entirely by reducing child-subtree matching, at
//! every visited node pair, to a rectangular (Munkres) assignment problem.
//!
//! Unlike ordered TED, a node's children compete for matches regardless of
//! position: the "keyroot" trick that makes ordered TED's forests reusable
//! does not apply here, so this module instead fills a full `m*n` table
//! bottom-up, one [`munkres`](crate::munkres::munkres) call per node pair.

mod backtrace;

pub use backtrace::{uted_backtrace, uted_backtrace_matrix, uted_backtrace_stochastic};

use crate::error::{Error, Result};
use crate::munkres::munkres;
use crate::tree::Tree;

fn check_cost(value: f64) -> Result<f64> {
    if value.is_nan() || value < 0.0 {
        return Err(Error::InvalidCost { value, a: None, b: None });
    }
    Ok(value)
}

fn subtree_size<T>(tree: &Tree<T>, root: usize) -> usize {
    tree.orl()[root] - root + 1
}

/// Builds the `(p+q)x(p+q)` assignment matrix for matching `i`'s children
/// against `j`'s children, per spec.md §4.7: top-left `p*q` block is pairwise
/// subtree distance, top-right `p*p` diagonal is "delete this child
/// wholesale" priced at `size(subtree) * delta(root, None)`, bottom-left
/// `q*q` diagonal is the symmetric "insert this child wholesale", and
/// bottom-right `q*p` is a zero filler absorbing unused insertion slots.
pub(crate) fn build_matrix<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    d: &[Vec<f64>],
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
    i: usize,
    j: usize,
) -> Result<Vec<Vec<f64>>> {
    let cx = x.adj()[i].clone();
    let cy = y.adj()[j].clone();
    let (p, q) = (cx.len(), cy.len());
    let size = p + q;
    let mut matrix = vec![vec![f64::INFINITY; size]; size];

    for (a, &c) in cx.iter().enumerate() {
        for (b, &e) in cy.iter().enumerate() {
            matrix[a][b] = d[c][e];
        }
        let del_cost = check_cost(delta(Some(&x.nodes()[c]), None))?;
        #[allow(clippy::cast_precision_loss)]
        let size_f = subtree_size(x, c) as f64;
        matrix[a][q + a] = size_f * del_cost;
    }
    for (b, &e) in cy.iter().enumerate() {
        let ins_cost = check_cost(delta(None, Some(&y.nodes()[e])))?;
        #[allow(clippy::cast_precision_loss)]
        let size_f = subtree_size(y, e) as f64;
        matrix[p + b][b] = size_f * ins_cost;
    }
    for a in 0..q {
        for b in 0..p {
            matrix[p + a][q + b] = 0.0;
        }
    }
    Ok(matrix)
}

/// Computes the full pairwise node-distance table `D[i][j]`, filled bottom-up
/// (`i` in descending order, since children always have a strictly larger
/// pre-order index than their parent).
pub(crate) fn forward_table<T: std::fmt::Debug>(
    x: &Tree<T>,
    y: &Tree<T>,
    delta: &impl Fn(Option<&T>, Option<&T>) -> f64,
) -> Result<Vec<Vec<f64>>> {
    let (m, n) = (x.len(), y.len());
    let mut d = vec![vec![0.0; n.max(1)]; m.max(1)];
    if m == 0 || n == 0 {
        return Ok(d);
    }

    for i in (0..m).rev() {
        for j in 0..n {
            let matrix = build_matrix(x, y, &d, delta, i, j)?;
            let assignment = munkres(&matrix)?;
            let child_cost: f64 = assignment.iter().enumerate().map(|(row, &col)| matrix[row][col]).sum();
            let node_cost = check_cost(delta(Some(&x.nodes()[i]), Some(&y.nodes()[j])))?;
            d[i][j] = node_cost + child_cost;
        }
    }
    Ok(d)
}

/// Unordered tree edit distance between `x` and `y` under cost kernel
/// `delta`.
///
/// # Errors
/// Returns [`Error::InvalidCost`] if `delta` returns a negative or `NaN`
/// value, and [`Error::DegenerateAssignment`] if some node pair's child
/// matching has no finite assignment (every child of one side forbidden
/// from matching or being deleted/inserted, which cannot happen with a
/// well-behaved `delta`).
pub fn uted<T: std::fmt::Debug>(x: &Tree<T>, y: &Tree<T>, delta: impl Fn(Option<&T>, Option<&T>) -> f64) -> Result<f64> {
    ftlog::trace!("uted: comparing trees of size {} and {}", x.len(), y.len());
    let (m, n) = (x.len(), y.len());
    let distance = if m == 0 {
        (0..n).try_fold(0.0, |acc, j| Ok::<_, Error>(acc + check_cost(delta(None, Some(&y.nodes()[j])))?))?
    } else if n == 0 {
        (0..m).try_fold(0.0, |acc, i| Ok::<_, Error>(acc + check_cost(delta(Some(&x.nodes()[i]), None))?))?
    } else {
        let d = forward_table(x, y, &delta)?;
        d[0][0]
    };
    ftlog::debug!("uted: distance = {distance}");
    Ok(distance)
}

/// Unit-cost convenience wrapper around [`uted`]. Unlike
/// [`crate::sed::standard_sed`]/[`crate::ted::standard_ted`], this is not an
/// integer-arithmetic specialization — [`munkres`] operates on `f64`
/// matrices regardless — so it exists purely so unordered-tree callers don't
/// have to write their own Kronecker delta.
pub fn standard_uted<T: PartialEq + std::fmt::Debug>(x: &Tree<T>, y: &Tree<T>) -> f64 {
    let unit = |a: Option<&T>, b: Option<&T>| match (a, b) {
        (Some(a), Some(b)) if a == b => 0.0,
        _ => 1.0,
    };
    uted(x, y, unit).expect("unit cost is always non-negative")
}

#[cfg(test)]
mod tests {
    use super::{standard_uted, uted};
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
    fn identical_trees_have_zero_distance() {
        let x = tree("abc", vec![vec![1], vec![2], vec![]]);
        assert!((standard_uted(&x, &x)).abs() < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let x = tree("abc", vec![vec![1, 2], vec![], vec![]]);
        let y = tree("xyz", vec![vec![1], vec![2], vec![]]);
        assert!((standard_uted(&x, &y) - standard_uted(&y, &x)).abs() < 1e-9);
    }

    #[test]
    fn reordering_children_does_not_change_distance() {
        // Same multiset of children, different order: an ordered algorithm
        // (TED) would charge extra for this, UTED must not.
        let ordered = tree("pbc", vec![vec![1, 2], vec![], vec![]]);
        let reordered = tree("pcb", vec![vec![1, 2], vec![], vec![]]);
        assert!((standard_uted(&ordered, &reordered)).abs() < 1e-9);
    }

    #[test]
    fn empty_tree_costs_the_size_of_the_other() {
        let empty = Tree::<char>::new(vec![], vec![]).expect("empty tree is valid");
        let y = tree("abc", vec![vec![1], vec![2], vec![]]);
        assert!((uted(&empty, &y, kron).unwrap() - 3.0).abs() < 1e-9);
        assert!((uted(&y, &empty, kron).unwrap() - 3.0).abs() < 1e-9);
    }
}
