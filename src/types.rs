//! Core types shared by the store, the search engine and the training bridge.
//!
//! Everything here is plain data:
//! - `Hypothesis` is one N-best entry (sufficient statistics + features)
//! - `Sample` is a preference triple produced by the sampling schemes
//! - `ScoredVector` is a weight vector paired with its corpus score
//!
//! Frozen after load. Workers only ever see shared references.

use serde::{Deserialize, Serialize};

/// One N-best candidate translation.
///
/// `stats` has the metric's fixed width (9 for BLEU) and `features` the
/// width of the log-linear model. Both widths are checked at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub stats: Vec<f64>,
    pub features: Vec<f64>,
}

impl Hypothesis {
    pub fn new(stats: Vec<f64>, features: Vec<f64>) -> Self {
        Self { stats, features }
    }
}

/// Preference triple: for `sentence_id`, hypothesis `best` should outrank
/// hypothesis `worst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub sentence_id: usize,
    pub worst: usize,
    pub best: usize,
}

/// A full weight vector together with the corpus score it achieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVector {
    pub weights: Vec<f64>,
    pub score: f64,
}

impl ScoredVector {
    pub fn new(weights: Vec<f64>, score: f64) -> Self {
        Self { weights, score }
    }

    /// Whitespace-separated rendering used for the output file.
    pub fn render(&self) -> String {
        self.weights
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Element-wise `acc += other`. Extra trailing entries on either side are ignored.
pub fn add_assign(acc: &mut [f64], other: &[f64]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += *b;
    }
}
