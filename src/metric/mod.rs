//! Corpus-level translation metrics computed from sufficient statistics.
//!
//! ## Why sufficient statistics?
//!
//! BLEU is not an average of per-sentence scores. The n-gram match and total
//! counts of the chosen hypotheses are summed over the whole corpus first, and
//! only then turned into a score. Every metric here therefore takes a stats
//! vector that may be a single hypothesis's or a corpus sum.
//!
//! | Variant | Stats | Corpus score                         | Smoothed score        |
//! |---------|-------|--------------------------------------|-----------------------|
//! | BLEU    | 9     | BP x geometric mean of 1..4 precision | NIST-style order blend |
//! | RED     | 11    | weighted F-means of 1..3-grams        | same as corpus score   |
//!
//! Scores never fail. A zero count where a division or a log would happen
//! yields 0 for that statistics vector.

mod bleu;
mod red;

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, bail};

pub use bleu::{BLEU_NUM_STATS, Bleu, NGRAM_ORDER};
pub use red::{RED_NUM_STATS, Red};

/// Metric family. Closed set; adding a variant means adding a match arm to
/// each of the operations below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Bleu(Bleu),
    Red(Red),
}

impl Metric {
    /// Look up a metric by its case-insensitive name.
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BLEU" => Ok(Self::Bleu(Bleu)),
            "RED" => Ok(Self::Red(Red::default())),
            _ => bail!("unknown metric type {name:?}. Expected one of: BLEU, RED"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bleu(_) => "BLEU",
            Self::Red(_) => "RED",
        }
    }

    /// Fixed width of the statistics vector.
    pub fn num_stats(&self) -> usize {
        match self {
            Self::Bleu(_) => BLEU_NUM_STATS,
            Self::Red(_) => RED_NUM_STATS,
        }
    }

    /// Corpus score of a (summed) statistics vector.
    pub fn score(&self, stats: &[f64]) -> f64 {
        match self {
            Self::Bleu(bleu) => bleu.score(stats),
            Self::Red(red) => red.score(stats),
        }
    }

    /// Smoothed score usable for a single hypothesis.
    pub fn smooth_score(&self, stats: &[f64]) -> f64 {
        match self {
            Self::Bleu(bleu) => bleu.smooth_score(stats),
            Self::Red(red) => red.score(stats),
        }
    }

    /// Model score of a hypothesis under a linear weight vector.
    pub fn inner_product(&self, weight: &[f64], features: &[f64]) -> f64 {
        weight.iter().zip(features).map(|(w, f)| w * f).sum()
    }
}

impl Default for Metric {
    fn default() -> Self {
        Self::Bleu(Bleu)
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
