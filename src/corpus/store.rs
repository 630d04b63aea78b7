//! In-memory N-best candidate store.
//!
//! Strategy: load every hypothesis of every sentence once, keyed by sentence
//! id, then treat the store as read-only. Corpus scoring re-selects the
//! model-best hypothesis per sentence for each weight vector and feeds the
//! summed statistics to the metric.
//!
//! Layout:
//! - `BTreeMap<sentence id, Vec<Hypothesis>>` so enumeration is deterministic
//! - one stats width and one feature width for the whole corpus
//! - dense feature names from the first block of the first file pair
//!
//! Multiple (scores, features) pairs may be loaded; hypotheses of repeated
//! sentence ids are appended, which merges N-best lists of several systems.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use super::parser::{FeaturesLine, ScoresLine, parse_features_line, parse_scores_line};
use crate::metric::Metric;
use crate::types::{Hypothesis, Sample, add_assign};

/// Block currently being read from a stream pair.
struct OpenBlock {
    sentence_id: usize,
    declared: usize,
    seen: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    sentences: BTreeMap<usize, Vec<Hypothesis>>,
    dense_names: Option<Vec<String>>,
    stats_width: Option<usize>,
    feature_width: Option<usize>,
    pairs_loaded: usize,
    empty_blocks: usize,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load matched (scores, features) file pairs in order.
    pub fn load<P: AsRef<Path>>(&mut self, stats_files: &[P], feature_files: &[P]) -> Result<()> {
        if stats_files.len() != feature_files.len() {
            bail!(
                "got {} scores files but {} feature files",
                stats_files.len(),
                feature_files.len()
            );
        }

        for (scores_path, features_path) in stats_files.iter().zip(feature_files) {
            let scores_path = scores_path.as_ref();
            let features_path = features_path.as_ref();

            let scores = File::open(scores_path)
                .with_context(|| format!("Failed to open scores file {}", scores_path.display()))?;
            let features = File::open(features_path).with_context(|| {
                format!("Failed to open features file {}", features_path.display())
            })?;

            let source = scores_path.display().to_string();
            self.load_pair(BufReader::new(scores), BufReader::new(features), &source)?;
        }

        Ok(())
    }

    /// Read one stream pair in lock step. `source` only labels errors.
    pub fn load_pair<S: BufRead, F: BufRead>(
        &mut self,
        scores: S,
        features: F,
        source: &str,
    ) -> Result<()> {
        let mut scores_lines = scores.lines();
        let mut feature_lines = features.lines();
        let mut block: Option<OpenBlock> = None;
        let mut line_no = 0usize;

        loop {
            let (score_line, feature_line) = match (scores_lines.next(), feature_lines.next()) {
                (None, None) => break,
                (Some(s), Some(f)) => (
                    s.with_context(|| format!("{source}: failed to read scores line"))?,
                    f.with_context(|| format!("{source}: failed to read features line"))?,
                ),
                _ => bail!(
                    "{source}: scores and features streams differ in length after line {line_no}"
                ),
            };
            line_no += 1;

            let score_line = score_line.trim();
            let feature_line = feature_line.trim();
            if score_line.is_empty() && feature_line.is_empty() {
                continue;
            }

            let scores_kind = parse_scores_line(score_line)
                .with_context(|| format!("{source}:{line_no}: malformed scores line"))?;
            let features_kind = parse_features_line(feature_line)
                .with_context(|| format!("{source}:{line_no}: malformed features line"))?;

            match (scores_kind, features_kind) {
                (ScoresLine::Begin(header), FeaturesLine::Begin(names)) => {
                    if let Some(open) = &block {
                        bail!(
                            "{source}:{line_no}: block for sentence {} is not terminated",
                            open.sentence_id
                        );
                    }
                    if self.dense_names.is_none() {
                        self.dense_names = Some(names);
                    }
                    block = Some(OpenBlock {
                        sentence_id: header.sentence_id,
                        declared: header.nbest_size,
                        seen: 0,
                    });
                }
                (ScoresLine::End, FeaturesLine::End) => {
                    let Some(open) = block.take() else {
                        bail!("{source}:{line_no}: end marker without an open block");
                    };
                    if open.seen == 0 {
                        self.empty_blocks += 1;
                        warn!(
                            sentence = open.sentence_id,
                            "empty n-best block, sentence not stored"
                        );
                    } else if open.seen != open.declared {
                        warn!(
                            sentence = open.sentence_id,
                            declared = open.declared,
                            seen = open.seen,
                            "n-best size differs from block header"
                        );
                    }
                }
                (ScoresLine::Values(stats), FeaturesLine::Values(values)) => {
                    let Some(open) = block.as_mut() else {
                        bail!("{source}:{line_no}: hypothesis outside of a sentence block");
                    };
                    self.insert(open.sentence_id, Hypothesis::new(stats, values))
                        .with_context(|| format!("{source}:{line_no}"))?;
                    open.seen += 1;
                }
                _ => bail!("{source}:{line_no}: scores and features markers are out of sync"),
            }
        }

        if let Some(open) = block {
            bail!(
                "{source}: block for sentence {} is not terminated",
                open.sentence_id
            );
        }

        self.pairs_loaded += 1;
        debug!(
            source,
            sentences = self.size(),
            hypotheses = self.num_hypotheses(),
            "loaded n-best pair"
        );
        Ok(())
    }

    /// Append one hypothesis, enforcing the corpus-wide widths.
    pub fn insert(&mut self, sentence_id: usize, hypothesis: Hypothesis) -> Result<()> {
        check_width(&mut self.stats_width, hypothesis.stats.len(), "statistics")?;
        check_width(&mut self.feature_width, hypothesis.features.len(), "feature")?;
        self.sentences
            .entry(sentence_id)
            .or_default()
            .push(hypothesis);
        Ok(())
    }

    /// Number of distinct sentence ids.
    pub fn size(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn num_hypotheses(&self) -> usize {
        self.sentences.values().map(Vec::len).sum()
    }

    pub fn dense_size(&self) -> usize {
        self.dense_names().len()
    }

    pub fn dense_names(&self) -> &[String] {
        self.dense_names.as_deref().unwrap_or(&[])
    }

    pub fn stats_width(&self) -> usize {
        self.stats_width.unwrap_or(0)
    }

    pub fn feature_width(&self) -> usize {
        self.feature_width.unwrap_or(0)
    }

    pub fn pairs_loaded(&self) -> usize {
        self.pairs_loaded
    }

    /// Blocks that carried no hypotheses. They do not count toward `size`.
    pub fn empty_blocks(&self) -> usize {
        self.empty_blocks
    }

    pub fn sentence_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.sentences.keys().copied()
    }

    pub fn hypotheses(&self, sentence_id: usize) -> Option<&[Hypothesis]> {
        self.sentences.get(&sentence_id).map(Vec::as_slice)
    }

    pub(crate) fn sentences(&self) -> impl Iterator<Item = (usize, &[Hypothesis])> + '_ {
        self.sentences.iter().map(|(id, hyps)| (*id, hyps.as_slice()))
    }

    /// Corpus score of `weight`: model-best hypothesis per sentence, stats
    /// summed over the corpus, one metric evaluation at the end.
    pub fn score(&self, weight: &[f64], metric: &Metric) -> Result<f64> {
        self.check_weight(weight)?;

        let mut totals = vec![0.0; self.stats_width()];
        for hyps in self.sentences.values() {
            let best = model_best(hyps, weight, metric);
            add_assign(&mut totals, &hyps[best].stats);
        }

        Ok(metric.score(&totals))
    }

    /// Extremal preference triples: per sentence, the hypotheses with the
    /// lowest and highest smoothed metric (first seen wins ties).
    pub fn samples(&self, metric: &Metric) -> Vec<Sample> {
        self.sentences
            .iter()
            .filter(|(_, hyps)| !hyps.is_empty())
            .map(|(&sentence_id, hyps)| {
                let mut best = (0, f64::NEG_INFINITY);
                let mut worst = (0, f64::INFINITY);
                for (idx, hyp) in hyps.iter().enumerate() {
                    let smooth = metric.smooth_score(&hyp.stats);
                    if smooth > best.1 {
                        best = (idx, smooth);
                    }
                    if smooth < worst.1 {
                        worst = (idx, smooth);
                    }
                }
                Sample {
                    sentence_id,
                    worst: worst.0,
                    best: best.0,
                }
            })
            .collect()
    }

    pub(crate) fn check_weight(&self, weight: &[f64]) -> Result<()> {
        if weight.len() != self.feature_width() {
            bail!(
                "weight vector has {} entries but hypotheses carry {} features",
                weight.len(),
                self.feature_width()
            );
        }
        Ok(())
    }
}

/// Index of the first hypothesis with the highest model score.
fn model_best(hyps: &[Hypothesis], weight: &[f64], metric: &Metric) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (idx, hyp) in hyps.iter().enumerate() {
        let score = metric.inner_product(weight, &hyp.features);
        if score > best_score {
            best = idx;
            best_score = score;
        }
    }
    best
}

fn check_width(slot: &mut Option<usize>, width: usize, what: &str) -> Result<()> {
    match *slot {
        None => {
            *slot = Some(width);
            Ok(())
        }
        Some(expected) if expected == width => Ok(()),
        Some(expected) => bail!("{what} vector has {width} entries, expected {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::corpus::fixtures::{self, NbestText};

    fn load(scores: &str, features: &str) -> Result<CandidateStore> {
        let mut store = CandidateStore::new();
        store.load_pair(Cursor::new(scores), Cursor::new(features), "test")?;
        Ok(store)
    }

    #[test]
    fn test_load_counts_blocks_and_dense_names() {
        let mut text = NbestText::new(&["LM0", "TM0"]);
        text.block(0, &[(&[1.0; 9], &[0.1, 0.2]), (&[2.0; 9], &[0.3, 0.4])]);
        text.block(1, &[(&[3.0; 9], &[0.5, 0.6])]);
        text.block(2, &[(&[4.0; 9], &[0.7, 0.8])]);

        let store = load(&text.scores, &text.features).unwrap();
        assert_eq!(store.size(), 3);
        assert_eq!(store.dense_size(), 2);
        assert_eq!(store.dense_names(), &["LM0".to_string(), "TM0".to_string()]);
        assert_eq!(store.num_hypotheses(), 4);
        assert_eq!(store.stats_width(), 9);
        assert_eq!(store.feature_width(), 2);
        assert_eq!(store.hypotheses(0).unwrap().len(), 2);
    }

    #[test]
    fn test_marker_mismatch_is_fatal() {
        let scores = "SCORES_TXT_BEGIN_0 0 1 9\n1 1 1 1 1 1 1 1 1\nSCORES_TXT_END_0\n";
        let features = "FEATURES_TXT_BEGIN_0 0 1 0\n0.5\n0.5\n";
        let err = load(scores, features).unwrap_err();
        assert!(format!("{err:#}").contains("out of sync"));
    }

    #[test]
    fn test_stream_length_mismatch_is_fatal() {
        let scores = "SCORES_TXT_BEGIN_0 0 1 9\n1 1 1 1 1 1 1 1 1\nSCORES_TXT_END_0\n";
        let features = "FEATURES_TXT_BEGIN_0 0 1 0\n0.5\n";
        assert!(load(scores, features).is_err());
    }

    #[test]
    fn test_data_outside_block_is_fatal() {
        assert!(load("1 1 1\n", "0.5\n").is_err());
    }

    #[test]
    fn test_inconsistent_widths_are_fatal() {
        let mut text = NbestText::new(&[]);
        text.block(0, &[(&[1.0; 9], &[0.1, 0.2]), (&[1.0; 9], &[0.1])]);
        let err = load(&text.scores, &text.features).unwrap_err();
        assert!(format!("{err:#}").contains("feature vector has 1 entries"));
    }

    #[test]
    fn test_empty_block_is_counted_not_stored() {
        let mut text = NbestText::new(&["LM0"]);
        text.block(0, &[(&[1.0; 9], &[0.5])]);
        text.block(1, &[]);

        let store = load(&text.scores, &text.features).unwrap();
        assert_eq!(store.size(), 1);
        assert_eq!(store.empty_blocks(), 1);
        assert!(store.hypotheses(1).is_none());
    }

    #[test]
    fn test_second_pair_merges_sentences() {
        let mut first = NbestText::new(&["A"]);
        first.block(0, &[(&[1.0; 9], &[1.0])]);
        first.block(1, &[(&[1.0; 9], &[1.0])]);
        let mut second = NbestText::new(&["B", "C"]);
        second.block(1, &[(&[2.0; 9], &[2.0]), (&[3.0; 9], &[3.0])]);

        let mut store = CandidateStore::new();
        store
            .load_pair(Cursor::new(&first.scores), Cursor::new(&first.features), "a")
            .unwrap();
        store
            .load_pair(Cursor::new(&second.scores), Cursor::new(&second.features), "b")
            .unwrap();

        assert_eq!(store.size(), 2);
        assert_eq!(store.hypotheses(1).unwrap().len(), 3);
        // dense names come from the first pair only
        assert_eq!(store.dense_names(), &["A".to_string()]);
        assert_eq!(store.pairs_loaded(), 2);
    }

    #[test]
    fn test_load_from_files() {
        let mut text = NbestText::new(&["LM0"]);
        text.block(0, &[(&[1.0; 9], &[0.5])]);

        let dir = tempfile::tempdir().unwrap();
        let scores_path = dir.path().join("run1.scores.dat");
        let features_path = dir.path().join("run1.features.dat");
        std::fs::File::create(&scores_path)
            .unwrap()
            .write_all(text.scores.as_bytes())
            .unwrap();
        std::fs::File::create(&features_path)
            .unwrap()
            .write_all(text.features.as_bytes())
            .unwrap();

        let mut store = CandidateStore::new();
        store.load(&[&scores_path], &[&features_path]).unwrap();
        assert_eq!(store.size(), 1);

        let missing = dir.path().join("missing.dat");
        assert!(store.load(&[&missing], &[&features_path]).is_err());
        assert!(store.load(&[&scores_path], &[]).is_err());
    }

    #[test]
    fn test_score_selects_model_best() {
        let store = fixtures::scenario_store();
        let metric = Metric::default();
        assert!((store.score(&[0.9, 0.2], &metric).unwrap() - 0.41).abs() < 1e-12);
        assert!((store.score(&[0.9, 0.8], &metric).unwrap() - 0.25).abs() < 1e-12);
        assert!((store.score(&[0.1, 0.2], &metric).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_score_rejects_wrong_weight_length() {
        let store = fixtures::scenario_store();
        assert!(store.score(&[0.9], &Metric::default()).is_err());
    }

    #[test]
    fn test_score_ties_pick_first_hypothesis() {
        let mut store = CandidateStore::new();
        store
            .insert(0, Hypothesis::new(fixtures::uniform_stats(9.0, 10.0, 10.0), vec![1.0]))
            .unwrap();
        store
            .insert(0, Hypothesis::new(fixtures::uniform_stats(1.0, 10.0, 10.0), vec![1.0]))
            .unwrap();
        let score = store.score(&[1.0], &Metric::default()).unwrap();
        assert!((score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_score_independent_of_block_order() {
        let blocks: Vec<(usize, Vec<(Vec<f64>, Vec<f64>)>)> = vec![
            (
                0,
                vec![
                    (fixtures::uniform_stats(3.0, 10.0, 9.0), vec![1.0, 0.0]),
                    (fixtures::uniform_stats(7.0, 10.0, 12.0), vec![0.0, 1.0]),
                ],
            ),
            (1, vec![(fixtures::uniform_stats(5.0, 8.0, 8.0), vec![0.2, 0.2])]),
            (
                2,
                vec![
                    (fixtures::uniform_stats(2.0, 6.0, 5.0), vec![0.4, 0.1]),
                    (fixtures::uniform_stats(4.0, 6.0, 7.0), vec![0.1, 0.4]),
                ],
            ),
        ];

        let build = |order: &[usize]| {
            let mut text = NbestText::new(&[]);
            for &i in order {
                let (id, hyps) = &blocks[i];
                let refs: Vec<(&[f64], &[f64])> = hyps
                    .iter()
                    .map(|(s, f)| (s.as_slice(), f.as_slice()))
                    .collect();
                text.block(*id, &refs);
            }
            load(&text.scores, &text.features).unwrap()
        };

        let forward = build(&[0, 1, 2]);
        let shuffled = build(&[2, 0, 1]);
        let metric = Metric::default();
        for weight in [[1.0, 0.0], [0.0, 1.0], [0.3, 0.7]] {
            assert_eq!(
                forward.score(&weight, &metric).unwrap(),
                shuffled.score(&weight, &metric).unwrap()
            );
        }
    }

    #[test]
    fn test_samples_pick_extremes_by_smoothed_metric() {
        let store = fixtures::scenario_store();
        let samples = store.samples(&Metric::default());
        assert_eq!(samples.len(), 3);
        for (idx, sample) in samples.iter().enumerate() {
            assert_eq!(sample.sentence_id, idx);
            // h1 has the lowest precision, h0 the highest
            assert_eq!(sample.worst, 1);
            assert_eq!(sample.best, 0);
        }
    }
}
