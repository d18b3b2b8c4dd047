//! The alignment tuple model shared by every kernel in this crate (C1).

mod script;

pub use script::{alignment_to_script, Edit};

/// One step of an alignment between two sequences.
///
/// `i`/`j` are `-1` when the step consumes nothing from that side: `(i, -1,
/// op)` deletes `x[i]`, `(-1, j, op)` inserts `y[j]`, and `(i, j, op)`
/// replaces `x[i]` with `y[j]` (a match is a replacement with zero cost).
/// `op` names the grammar operation that produced the step; it is `None` for
/// plain sequence edit distance, where operations are not named.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct Step {
    /// Index into the left sequence, or `-1`.
    pub i: isize,
    /// Index into the right sequence, or `-1`.
    pub j: isize,
    /// The operation name that produced this step, if the kernel names one.
    pub op: Option<String>,
}

impl Step {
    /// Creates a new step.
    pub fn new(i: isize, j: isize, op: Option<String>) -> Self {
        Self { i, j, op }
    }
}

/// A complete alignment: a sequence of [`Step`]s from `(0, 0)` to the end of
/// both inputs, in left-to-right (increasing index) order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Alignment(Vec<Step>);

impl Alignment {
    /// Creates an empty alignment.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a step built from raw `(i, j, op)` fields.
    ///
    /// Every backtrace routine in this crate walks forward, from `(0, 0)` (or
    /// a subtree's root, for `ted`/`uted`) to `(m, n)`, so steps are already
    /// appended in increasing index order; no reversal is needed before use.
    pub fn append_tuple(&mut self, i: isize, j: isize, op: Option<String>) {
        self.0.push(Step::new(i, j, op));
    }

    /// Returns a copy of this alignment with its steps in reverse order.
    ///
    /// General-purpose utility for callers that build an alignment back to
    /// front; none of this crate's own backtrace routines need it.
    pub fn reversed(&self) -> Self {
        let mut steps = self.0.clone();
        steps.reverse();
        Self(steps)
    }

    /// Returns the steps of this alignment.
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Returns `true` if this alignment has no steps.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of steps in this alignment.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Computes the total cost of this alignment under `delta`.
    ///
    /// `delta(a, b)` is called once per step with `a = x.get(i)` and
    /// `b = y.get(j)`, mirroring the `Option<&T>`-for-absence convention used
    /// throughout this crate.
    pub fn cost<T>(&self, x: &[T], y: &[T], delta: impl Fn(Option<&T>, Option<&T>) -> f64) -> f64 {
        self.0
            .iter()
            .map(|step| {
                let a = usize::try_from(step.i).ok().and_then(|i| x.get(i));
                let b = usize::try_from(step.j).ok().and_then(|j| y.get(j));
                delta(a, b)
            })
            .sum()
    }
}

impl core::ops::Deref for Alignment {
    type Target = [Step];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl core::fmt::Display for Alignment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for step in &self.0 {
            match &step.op {
                Some(op) => writeln!(f, "({}, {}, {op})", step.i, step.j)?,
                None => writeln!(f, "({}, {})", step.i, step.j)?,
            }
        }
        Ok(())
    }
}
