//! Shared test corpora.

use crate::corpus::CandidateStore;
use crate::metric::NGRAM_ORDER;
use crate::search::WeightBlock;
use crate::types::Hypothesis;

/// BLEU stats with the same precision at every order.
pub(crate) fn uniform_stats(matches: f64, total: f64, ref_len: f64) -> Vec<f64> {
    let mut stats = Vec::with_capacity(2 * NGRAM_ORDER + 1);
    for _ in 0..NGRAM_ORDER {
        stats.push(matches);
        stats.push(total);
    }
    stats.push(ref_len);
    stats
}

/// Builds matching scores/features stream text.
pub(crate) struct NbestText {
    pub scores: String,
    pub features: String,
    dense: Vec<String>,
}

impl NbestText {
    pub fn new(dense: &[&str]) -> Self {
        Self {
            scores: String::new(),
            features: String::new(),
            dense: dense.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn block(&mut self, sentence_id: usize, hyps: &[(&[f64], &[f64])]) {
        let n = hyps.len();
        self.scores
            .push_str(&format!("SCORES_TXT_BEGIN_0 {sentence_id} {n} 9 BLEU\n"));
        self.features.push_str(&format!(
            "FEATURES_TXT_BEGIN_0 {sentence_id} {n} {} {}\n",
            self.dense.len(),
            self.dense.join(" ")
        ));
        for (stats, features) in hyps {
            self.scores.push_str(&join(stats));
            self.scores.push('\n');
            self.features.push_str(&join(features));
            self.features.push('\n');
        }
        self.scores.push_str("SCORES_TXT_END_0\n");
        self.features.push_str("FEATURES_TXT_END_0\n");
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Three identical sentences whose model-best hypothesis depends on the
/// two weights:
///
/// | weights    | winner          | corpus BLEU |
/// |------------|-----------------|-------------|
/// | (0.9, 0.2) | h0 = (1, 0)     | 0.41        |
/// | (0.9, 0.8) | h2 = (0.6, 0.6) | 0.25        |
/// | (0.1, *)   | h1 = (0, 1)     | 0.20        |
pub(crate) fn scenario_store() -> CandidateStore {
    let mut store = CandidateStore::new();
    for sentence in 0..3 {
        for (matches, features) in [(41.0, [1.0, 0.0]), (20.0, [0.0, 1.0]), (25.0, [0.6, 0.6])] {
            store
                .insert(
                    sentence,
                    Hypothesis::new(uniform_stats(matches, 100.0, 100.0), features.to_vec()),
                )
                .unwrap();
        }
    }
    store
}

pub(crate) fn scenario_block() -> WeightBlock {
    WeightBlock::new(
        vec!["x".into(), "y".into()],
        vec![vec![0.1, 0.9], vec![0.2, 0.8]],
    )
    .unwrap()
}
