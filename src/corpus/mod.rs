//! N-best corpus loading and corpus-level rescoring.
//!
//! This module handles:
//! - Parsing the marker-delimited scores and features streams
//! - Keeping both streams in lock step (any disagreement is fatal)
//! - Storing hypotheses per sentence for repeated corpus scoring

#[cfg(test)]
pub(crate) mod fixtures;
mod parser;
mod store;

pub use parser::{
    BlockHeader, FEATURES_BEGIN, FEATURES_END, FeaturesLine, SCORES_BEGIN, SCORES_END, ScoresLine,
    parse_features_line, parse_scores_line, parse_values,
};
pub use store::CandidateStore;
