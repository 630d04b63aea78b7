//! BLEU over 9 sufficient statistics.
//!
//! Layout: `[m1, t1, m2, t2, m3, t3, m4, t4, ref_len]` where `m_n` / `t_n`
//! are the clipped n-gram matches and the hypothesis n-gram totals. The
//! hypothesis length is the unigram total `t1`.

/// Highest n-gram order.
pub const NGRAM_ORDER: usize = 4;

/// Four precision pairs plus the reference length.
pub const BLEU_NUM_STATS: usize = 2 * NGRAM_ORDER + 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bleu;

impl Bleu {
    /// Corpus BLEU: `exp(min(0, 1 - r/c) + 1/4 * sum(log p_n))`.
    pub fn score(&self, stats: &[f64]) -> f64 {
        bleu_of_order(stats, NGRAM_ORDER)
    }

    /// NIST-style smoothing: lower orders contribute with halving weights
    /// so a sentence without 4-gram matches still gets a non-zero value.
    pub fn smooth_score(&self, stats: &[f64]) -> f64 {
        (1..=NGRAM_ORDER)
            .map(|order| {
                let weight = 2f64.powi((NGRAM_ORDER + 1 - order) as i32);
                bleu_of_order(stats, order) / weight
            })
            .sum()
    }
}

/// BLEU restricted to the first `order` precision pairs. Each pair keeps
/// its 1/4 weight, so lower orders yield smaller exponents.
fn bleu_of_order(stats: &[f64], order: usize) -> f64 {
    if stats.len() < BLEU_NUM_STATS {
        return 0.0;
    }
    let pairs = &stats[..2 * order];
    if pairs.iter().any(|&count| count <= 0.0) {
        return 0.0;
    }

    let hyp_len = stats[1];
    let ref_len = stats[BLEU_NUM_STATS - 1];

    let log_precision: f64 = pairs
        .chunks_exact(2)
        .map(|pair| (pair[0] / pair[1]).ln())
        .sum();
    let brevity = (1.0 - ref_len / hyp_len).min(0.0);

    (brevity + log_precision / NGRAM_ORDER as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(matches: f64, total: f64, ref_len: f64) -> Vec<f64> {
        let mut stats = Vec::with_capacity(BLEU_NUM_STATS);
        for _ in 0..NGRAM_ORDER {
            stats.push(matches);
            stats.push(total);
        }
        stats.push(ref_len);
        stats
    }

    #[test]
    fn test_equal_precisions_give_that_precision() {
        let bleu = Bleu.score(&uniform(41.0, 100.0, 100.0));
        assert!((bleu - 0.41).abs() < 1e-12);
    }

    #[test]
    fn test_zero_in_any_pair_is_exactly_zero() {
        for idx in 0..2 * NGRAM_ORDER {
            let mut stats = uniform(5.0, 10.0, 10.0);
            stats[idx] = 0.0;
            assert_eq!(Bleu.score(&stats), 0.0, "zero at index {idx}");
        }
    }

    #[test]
    fn test_short_vector_degrades_to_zero() {
        assert_eq!(Bleu.score(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(Bleu.smooth_score(&[]), 0.0);
    }

    #[test]
    fn test_brevity_penalty_applies_to_short_hypotheses() {
        // hyp_len 50 against ref_len 100: BP = exp(1 - 2) = e^-1
        let bleu = Bleu.score(&uniform(25.0, 50.0, 100.0));
        assert!((bleu - 0.5 * (-1.0f64).exp()).abs() < 1e-12);

        // Longer hypotheses are not rewarded
        let long = Bleu.score(&uniform(100.0, 200.0, 100.0));
        assert!((long - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_match_is_one() {
        assert!((Bleu.score(&uniform(10.0, 10.0, 10.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_score_survives_missing_higher_orders() {
        // unigram and bigram matches only
        let stats = vec![4.0, 5.0, 2.0, 4.0, 0.0, 3.0, 0.0, 2.0, 5.0];
        assert_eq!(Bleu.score(&stats), 0.0);

        let smooth = Bleu.smooth_score(&stats);
        let expected = 0.8f64.powf(0.25) / 16.0 + (0.8f64 * 0.5).powf(0.25) / 8.0;
        assert!((smooth - expected).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_score_monotone_in_matches() {
        let base = vec![3.0, 6.0, 2.0, 5.0, 1.0, 4.0, 1.0, 3.0, 6.0];
        for idx in [0, 2, 4, 6] {
            let mut prev = Bleu.smooth_score(&base);
            let mut stats = base.clone();
            while stats[idx] < stats[idx + 1] {
                stats[idx] += 1.0;
                let next = Bleu.smooth_score(&stats);
                assert!(next >= prev, "order {} decreased", idx / 2 + 1);
                prev = next;
            }
        }
    }

    #[test]
    fn test_perfect_smooth_score() {
        // 1/16 + 1/8 + 1/4 + 1/2
        let smooth = Bleu.smooth_score(&uniform(10.0, 10.0, 10.0));
        assert!((smooth - 0.9375).abs() < 1e-12);
    }
}
