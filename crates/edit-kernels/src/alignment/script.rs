//! Conversion from an [`Alignment`](super::Alignment) to an executable edit
//! script (C1).

use super::Alignment;

/// A single primitive edit, in terms of positions in the *current* sequence
/// being transformed (not positions in the original `x`/`y`).
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum Edit<T> {
    /// Replace the element at `index` with `value`.
    Replace {
        /// Position of the element to replace.
        index: usize,
        /// The replacement value.
        value: T,
    },
    /// Delete the element at `index`.
    Delete {
        /// Position of the element to delete.
        index: usize,
    },
    /// Insert `value` so that it lands at `index` after insertion.
    Insert {
        /// Position the inserted value will occupy.
        index: usize,
        /// The value to insert.
        value: T,
    },
}

/// An ordered list of [`Edit`]s that transforms one sequence into another.
///
/// Applying a script never mutates its input: [`Script::apply`] returns a
/// fresh `Vec`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Script<T>(Vec<Edit<T>>);

impl<T: Clone> Script<T> {
    /// Wraps a list of edits into a script.
    pub const fn new(edits: Vec<Edit<T>>) -> Self {
        Self(edits)
    }

    /// Returns the edits of this script.
    pub fn edits(&self) -> &[Edit<T>] {
        &self.0
    }

    /// Applies this script to `source`, returning the transformed sequence.
    ///
    /// Edits are applied in the order they were produced by
    /// [`alignment_to_script`]: all deletions at decreasing index, then all
    /// insertions at increasing index. Applying them in that order against a
    /// single mutable buffer keeps every `index` valid without renumbering,
    /// exactly as `original_source/` relies on.
    pub fn apply(&self, source: &[T]) -> Vec<T> {
        let mut out = source.to_vec();
        for edit in &self.0 {
            match edit {
                Edit::Replace { index, value } => out[*index] = value.clone(),
                Edit::Delete { index } => {
                    out.remove(*index);
                }
                Edit::Insert { index, value } => out.insert(*index, value.clone()),
            }
        }
        out
    }
}

/// Converts an [`Alignment`] between `x` and `y` into a [`Script`] that turns
/// `x` into `y`.
///
/// Steps are processed in reverse order (highest `i`/`j` first) so deletions
/// and insertions can be emitted with stable indices: deletions at
/// decreasing index (so deleting one element never shifts the position of an
/// element still to be deleted), followed by insertions at increasing index,
/// matching `original_source/tests/edits_test.py::test_alignment_to_script`.
pub fn alignment_to_script<T: Clone>(alignment: &Alignment, x: &[T], y: &[T]) -> Script<T> {
    let mut deletions = Vec::new();
    let mut insertions = Vec::new();

    for step in alignment.steps().iter().rev() {
        match (usize::try_from(step.i).ok(), usize::try_from(step.j).ok()) {
            (Some(i), Some(j)) => {
                if x[i] != y[j] {
                    deletions.push(Edit::Replace {
                        index: i,
                        value: y[j].clone(),
                    });
                }
            }
            (Some(i), None) => deletions.push(Edit::Delete { index: i }),
            (None, Some(j)) => insertions.push((j, step)),
            (None, None) => {}
        }
    }

    insertions.sort_by_key(|(j, _)| *j);
    let mut edits = deletions;
    edits.extend(insertions.into_iter().map(|(j, _)| Edit::Insert {
        index: insertion_index(alignment, j),
        value: y[j].clone(),
    }));

    Script::new(edits)
}

/// The position an inserted element lands at, measured in the sequence as it
/// stands once every step with a smaller `j` has already been applied.
///
/// Every `y`-index below `j` is produced by exactly one step, either a
/// surviving replace/match (`i >= 0`) or an earlier insertion (`i == -1`);
/// both already occupy a slot in the buffer by the time this insertion runs,
/// so both count. Delete steps have no `j` and never contribute.
fn insertion_index(alignment: &Alignment, j: usize) -> usize {
    let mut count = 0;
    for step in alignment.steps() {
        let Ok(sj) = usize::try_from(step.j) else {
            continue;
        };
        if sj >= j {
            break;
        }
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::{alignment_to_script, Edit};
    use crate::alignment::Alignment;

    #[test]
    fn replace_only_alignment_produces_replacements() {
        let x = vec!['a', 'b', 'c'];
        let y = vec!['a', 'x', 'c'];
        let mut a = Alignment::new();
        a.append_tuple(0, 0, None);
        a.append_tuple(1, 1, None);
        a.append_tuple(2, 2, None);

        let script = alignment_to_script(&a, &x, &y);
        assert_eq!(
            script.edits(),
            &[Edit::Replace {
                index: 1,
                value: 'x'
            }]
        );
        assert_eq!(script.apply(&x), y);
    }

    #[test]
    fn deletions_and_insertions_round_trip() {
        let x: Vec<char> = "abc".chars().collect();
        let y: Vec<char> = "adefc".chars().collect();
        let mut a = Alignment::new();
        a.append_tuple(0, 0, None);
        a.append_tuple(1, 1, None);
        a.append_tuple(-1, 2, None);
        a.append_tuple(-1, 3, None);
        a.append_tuple(2, 4, None);

        let script = alignment_to_script(&a, &x, &y);
        assert_eq!(script.apply(&x), y);
    }

    #[test]
    fn deletions_then_insertion_round_trips_without_panicking() {
        let x: Vec<char> = "abcde".chars().collect();
        let y: Vec<char> = "bdef".chars().collect();
        let mut a = Alignment::new();
        a.append_tuple(0, -1, None);
        a.append_tuple(1, 0, None);
        a.append_tuple(2, -1, None);
        a.append_tuple(3, 1, None);
        a.append_tuple(4, 2, None);
        a.append_tuple(-1, 3, None);

        let script = alignment_to_script(&a, &x, &y);
        assert_eq!(script.apply(&x), y);
    }

    #[test]
    fn apply_does_not_mutate_source() {
        let x = vec!['a', 'b'];
        let y = vec!['a', 'c'];
        let mut a = Alignment::new();
        a.append_tuple(0, 0, None);
        a.append_tuple(1, 1, None);
        let script = alignment_to_script(&a, &x, &y);
        let _ = script.apply(&x);
        assert_eq!(x, vec!['a', 'b']);
    }
}
