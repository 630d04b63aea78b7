//! RED: weighted n-gram F-means over 11 precomputed statistics.
//!
//! Layout: `[_, p1, h1, r1, ref1, m2, h2, ref2, m3, h3, ref3]`. Unigrams keep
//! separate precision and recall match counts (`p1`, `r1`); bigrams and
//! trigrams share one match count. Slot 0 is unused.

pub const RED_NUM_STATS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Red {
    /// Per-order weights for the unigram, bigram and trigram F-means.
    pub order_weights: [f64; 3],
    /// Precision weight inside each F-mean.
    pub precision_weight: f64,
}

impl Default for Red {
    fn default() -> Self {
        Self {
            order_weights: [0.6, 0.5, 0.1],
            precision_weight: 0.9,
        }
    }
}

impl Red {
    pub fn score(&self, stats: &[f64]) -> f64 {
        if stats.len() < RED_NUM_STATS {
            return 0.0;
        }

        let unigram = self.f_mean(stats[1], stats[2], stats[3], stats[4]);
        let bigram = self.f_mean(stats[5], stats[6], stats[5], stats[7]);
        let trigram = self.f_mean(stats[8], stats[9], stats[8], stats[10]);

        let [w1, w2, w3] = self.order_weights;
        w1 * unigram + w2 * bigram + w3 * trigram
    }

    fn f_mean(&self, prec_match: f64, hyp: f64, recall_match: f64, reference: f64) -> f64 {
        if hyp <= 0.0 || reference <= 0.0 {
            return 0.0;
        }
        let precision = prec_match / hyp;
        let recall = recall_match / reference;
        if precision <= 0.0 || recall <= 0.0 {
            return 0.0;
        }
        let alpha = self.precision_weight;
        precision * recall / (alpha * precision + (1.0 - alpha) * recall)
    }
}
