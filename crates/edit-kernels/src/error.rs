//! Error types for `edit-kernels`.
//!
//! Every error is surfaced immediately at the call boundary that detected it,
//! carrying the offending indices or names so a caller can act without
//! re-deriving them.

use thiserror::Error;

/// Errors that can occur while building or running an edit-distance kernel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// An adjacency list's length disagreed with the node list, or a tree's
    /// node order was not a valid depth-first pre-order.
    #[error("shape mismatch: {detail}")]
    ShapeMismatch {
        /// Human-readable description of the mismatch, including the
        /// offending index where applicable.
        detail: String,
    },

    /// A grammar transition, or a `δ` map, referenced a nonterminal or
    /// operation name that was never registered.
    #[error("unknown symbol `{symbol}` referenced by {context}")]
    UnknownSymbol {
        /// The unrecognized name.
        symbol: String,
        /// Where the reference occurred (e.g. `"replacement rule"`, `"delta map"`).
        context: String,
    },

    /// An ADP grammar has no accepting derivation for the given inputs: the
    /// start cell's forward cost is `+∞`.
    #[error("no accepting parse for inputs of length {len_x} and {len_y}")]
    NoAcceptingParse {
        /// Length of the left sequence.
        len_x: usize,
        /// Length of the right sequence.
        len_y: usize,
    },

    /// A cost kernel `δ` returned a negative value or `NaN`.
    #[error("delta returned an invalid cost {value} for ({a:?}, {b:?})")]
    InvalidCost {
        /// The offending value.
        value: f64,
        /// Debug rendering of the left argument, if any.
        a: Option<String>,
        /// Debug rendering of the right argument, if any.
        b: Option<String>,
    },

    /// A Munkres cost matrix had no finite assignment (an all-`+∞` row or
    /// column).
    #[error("no finite assignment exists: row/column {index} is entirely infinite")]
    DegenerateAssignment {
        /// The offending row or column index.
        index: usize,
    },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
