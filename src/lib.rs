//! viterbi-tune - weight search for machine translation tuning
//!
//! Finds the linear feature weights that maximise corpus BLEU (or RED) over
//! fixed n-best lists. Each weight dimension has a small set of candidate
//! values; a dynamic-programming sweep picks one candidate per dimension,
//! scoring every partial choice on the whole corpus.
//!
//! # Architecture
//!
//! ```text
//! n-best files → CandidateStore → Tuner ─restarts─▶ SweepContext::sweep → best vector
//!                     ↑             ↑                      ↓
//!               parser (text)   WeightBlock          rayon fan-out per column
//!                                   ↑
//!                  Combiner ◀── training (hope/fear, feature batches)
//! ```
//!
//! # Modules
//!
//! - `metric`: BLEU / RED from sufficient statistics
//! - `corpus`: n-best statistics and features, corpus scoring
//! - `search`: weight candidates, sweep, restart loop
//! - `training`: preference sampling and trainable combiners
//! - `config`: `viterbi-tune.toml` loading

pub mod config;
pub mod corpus;
pub mod metric;
pub mod search;
pub mod training;
pub mod types;

// Re-export core types
pub use types::{Hypothesis, Sample, ScoredVector};

pub use config::Config;
pub use corpus::CandidateStore;
pub use metric::Metric;
pub use search::{SweepContext, SweepOutcome, TuneOptions, TuneReport, Tuner, WeightBlock};
pub use training::{Combiner, LinearBlender, SamplingScheme};
