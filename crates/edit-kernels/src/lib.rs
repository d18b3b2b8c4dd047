//! Edit-distance algorithms over sequences and rooted labeled trees.
//!
//! Every kernel in this crate shares the same shape: a pure forward DP
//! (`sed`, `adp::edit_distance`, `ted`, `uted`) computing a scalar distance
//! under a caller-supplied cost kernel `δ`, plus three backtrace modes built
//! on top of the same table —
//!
//! - **deterministic** (`*_backtrace`): one optimal alignment, via a fixed
//!   tie-break order.
//! - **stochastic** (`*_backtrace_stochastic`): one alignment sampled
//!   uniformly at random from the set of co-optimal alignments, given an
//!   explicit `rand::Rng`.
//! - **marginal** (`*_backtrace_matrix`): the full co-optimal-derivation
//!   count, broken down per position/operation as a probability matrix.
//!
//! `adp` generalizes `sed` to an arbitrary regular grammar of replace/
//! delete/insert transitions (so `aed`, affine-gap edit distance, is an
//! instance of it); `uted` generalizes `ted` to ignore child order by
//! reducing subtree matching to `munkres` assignment at every node pair.
//!
//! No logger is configured by this crate — every forward DP and backtrace
//! call emits `ftlog::trace!`/`debug!` records, and it is the consumer's
//! responsibility to install an `ftlog` sink.

pub mod adp;
pub mod alignment;
pub mod error;
pub mod grammar;
pub mod munkres;
pub mod sed;
pub mod ted;
pub mod tolerance;
pub mod tree;
pub mod uted;

pub use error::{Error, Result};

/// Cost type used by every generic (`δ`-driven) kernel in this crate.
pub type Cost = f64;

/// Cost type used by the `standard_*` unit-cost specializations.
pub type StdCost = i64;
