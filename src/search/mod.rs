//! Weight combination search.
//!
//! - `weights`: the per-dimension candidate block read from disk
//! - `viterbi`: one dynamic-programming sweep with backpointers
//! - `tuner`: restarts and repeated sweeps until convergence

mod tuner;
mod viterbi;
mod weights;

pub use tuner::{
    Refinement, RestartKind, RestartReport, Termination, TuneOptions, TuneReport, Tuner,
};
pub use viterbi::{Cell, SearchMatrix, SweepContext, SweepOutcome};
pub use weights::WeightBlock;
