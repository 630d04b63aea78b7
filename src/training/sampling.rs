//! Preference pairs for training a combiner.
//!
//! ## Hope and fear
//!
//! For a sentence and the current weights, every hypothesis gets a model
//! score `w . f` and a metric value computed on its statistics added to a
//! background of previously committed statistics:
//!
//! - **hope** maximizes `model + bleu` (good and reachable)
//! - **fear** maximizes `model - bleu` (confidently bad)
//!
//! Both scans start at negative infinity and keep the first hypothesis on
//! ties, so a single-hypothesis sentence is its own hope and fear.
//!
//! The fear sign is an open question: older scripts compared `model - bleu`
//! against a fear score that started at `+inf`, so fear never updated. The
//! reading taken here is fear = argmax `model - bleu`.
//!
//! ## Schemes
//!
//! | Scheme      | Pairs per sentence | Depends on weights |
//! |-------------|--------------------|--------------------|
//! | Extremal    | 1 (min/max smooth) | no                 |
//! | HopeFear    | 1                  | yes                |
//! | RandomPairs | n random pairs     | no                 |
//!
//! Extremal is the default. RandomPairs is the older scheme, kept for
//! comparison runs.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rand::Rng;
use tracing::warn;

use crate::corpus::CandidateStore;
use crate::metric::Metric;
use crate::types::{Hypothesis, Sample, add_assign};

/// Default number of random pairs drawn per sentence.
pub const DEFAULT_RANDOM_PAIRS: usize = 20;

/// One side of a hope/fear pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Extreme {
    pub index: usize,
    pub stats: Vec<f64>,
    pub smooth_score: f64,
    pub features: Vec<f64>,
}

impl Extreme {
    fn of(hyps: &[Hypothesis], index: usize, metric: &Metric) -> Self {
        let hyp = &hyps[index];
        Self {
            index,
            stats: hyp.stats.clone(),
            smooth_score: metric.smooth_score(&hyp.stats),
            features: hyp.features.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HopeFear {
    pub sentence_id: usize,
    pub hope: Extreme,
    pub fear: Extreme,
}

impl CandidateStore {
    /// Hope and fear hypotheses of one sentence under `weight`.
    ///
    /// `background` must have the statistics width of the corpus.
    pub fn hope_fear(
        &self,
        sentence_id: usize,
        weight: &[f64],
        metric: &Metric,
        background: &[f64],
    ) -> Result<HopeFear> {
        let hyps = self
            .hypotheses(sentence_id)
            .filter(|hyps| !hyps.is_empty())
            .with_context(|| format!("no hypotheses for sentence {sentence_id}"))?;
        self.check_weight(weight)?;
        if background.len() != self.stats_width() {
            bail!(
                "background statistics have {} entries, expected {}",
                background.len(),
                self.stats_width()
            );
        }

        let mut hope = (0, f64::NEG_INFINITY);
        let mut fear = (0, f64::NEG_INFINITY);
        let mut combined = vec![0.0; background.len()];

        for (idx, hyp) in hyps.iter().enumerate() {
            let model = metric.inner_product(weight, &hyp.features);
            combined.copy_from_slice(background);
            add_assign(&mut combined, &hyp.stats);
            let bleu = metric.score(&combined);

            if model + bleu > hope.1 {
                hope = (idx, model + bleu);
            }
            if model - bleu > fear.1 {
                fear = (idx, model - bleu);
            }
        }

        Ok(HopeFear {
            sentence_id,
            hope: Extreme::of(hyps, hope.0, metric),
            fear: Extreme::of(hyps, fear.0, metric),
        })
    }

    /// Interleaved feature vectors, better hypothesis first.
    ///
    /// Order within a pair follows the smoothed metric. Pairs whose smoothed
    /// scores are equal carry no signal and are dropped. Samples that point
    /// outside the store are skipped with a warning.
    pub fn feature_batch(&self, samples: &[Sample], metric: &Metric) -> Vec<Vec<f64>> {
        let mut batch = Vec::with_capacity(samples.len() * 2);

        for sample in samples {
            let Some(hyps) = self.hypotheses(sample.sentence_id) else {
                warn!(sentence = sample.sentence_id, "sample for unknown sentence skipped");
                continue;
            };
            let (Some(hope), Some(fear)) = (hyps.get(sample.best), hyps.get(sample.worst)) else {
                warn!(
                    sentence = sample.sentence_id,
                    best = sample.best,
                    worst = sample.worst,
                    hypotheses = hyps.len(),
                    "sample index out of range skipped"
                );
                continue;
            };

            let hope_smooth = metric.smooth_score(&hope.stats);
            let fear_smooth = metric.smooth_score(&fear.stats);
            if hope_smooth > fear_smooth {
                batch.push(hope.features.clone());
                batch.push(fear.features.clone());
            } else if fear_smooth > hope_smooth {
                batch.push(fear.features.clone());
                batch.push(hope.features.clone());
            }
        }

        batch
    }
}

/// How preference samples are drawn between learned rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplingScheme {
    #[default]
    Extremal,
    HopeFear,
    RandomPairs { per_sentence: usize },
}

impl SamplingScheme {
    pub fn samples<R: Rng>(
        &self,
        store: &CandidateStore,
        metric: &Metric,
        weight: &[f64],
        rng: &mut R,
    ) -> Result<Vec<Sample>> {
        match *self {
            Self::Extremal => Ok(store.samples(metric)),
            Self::HopeFear => hope_fear_samples(store, metric, weight),
            Self::RandomPairs { per_sentence } => {
                Ok(random_pairs(store, metric, per_sentence, rng))
            }
        }
    }
}

impl FromStr for SamplingScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extremal" => Ok(Self::Extremal),
            "hope-fear" | "hopefear" => Ok(Self::HopeFear),
            "random" => Ok(Self::RandomPairs {
                per_sentence: DEFAULT_RANDOM_PAIRS,
            }),
            other => match other.strip_prefix("random:") {
                Some(n) => Ok(Self::RandomPairs {
                    per_sentence: n
                        .parse()
                        .with_context(|| format!("bad pair count in sampling scheme {s:?}"))?,
                }),
                None => bail!(
                    "unknown sampling scheme {s:?}. Expected one of: extremal, hope-fear, random[:N]"
                ),
            },
        }
    }
}

impl fmt::Display for SamplingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extremal => f.write_str("extremal"),
            Self::HopeFear => f.write_str("hope-fear"),
            Self::RandomPairs { per_sentence } => write!(f, "random:{per_sentence}"),
        }
    }
}

/// Hope/fear per sentence in id order. Hope statistics accumulate into the
/// background seen by later sentences.
fn hope_fear_samples(
    store: &CandidateStore,
    metric: &Metric,
    weight: &[f64],
) -> Result<Vec<Sample>> {
    let mut background = vec![0.0; store.stats_width()];
    let mut samples = Vec::with_capacity(store.size());

    for sentence_id in store.sentence_ids() {
        let pair = store.hope_fear(sentence_id, weight, metric, &background)?;
        add_assign(&mut background, &pair.hope.stats);
        samples.push(Sample {
            sentence_id,
            worst: pair.fear.index,
            best: pair.hope.index,
        });
    }

    Ok(samples)
}

/// Random index pairs, each ordered worst/best by smoothed metric.
fn random_pairs<R: Rng>(
    store: &CandidateStore,
    metric: &Metric,
    per_sentence: usize,
    rng: &mut R,
) -> Vec<Sample> {
    let mut samples = Vec::new();

    for (sentence_id, hyps) in store.sentences() {
        if hyps.len() < 2 {
            continue;
        }
        for _ in 0..per_sentence {
            let a = rng.gen_range(0..hyps.len());
            let b = rng.gen_range(0..hyps.len());
            if a == b {
                continue;
            }
            let (worst, best) =
                if metric.smooth_score(&hyps[a].stats) <= metric.smooth_score(&hyps[b].stats) {
                    (a, b)
                } else {
                    (b, a)
                };
            samples.push(Sample {
                sentence_id,
                worst,
                best,
            });
        }
    }

    samples
}
