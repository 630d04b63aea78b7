//! Line classification for the scores and features N-best streams.
//!
//! Both streams are organised in per-sentence blocks:
//!
//! ```text
//! SCORES_TXT_BEGIN_0 <sentId> <nbestSize> <ignored>
//! 1 5 0 4 0 3 0 2 6
//! ...
//! SCORES_TXT_END_0
//! ```
//!
//! ```text
//! FEATURES_TXT_BEGIN_0 <ignored> <ignored> <denseCount> <denseName>*
//! -3.2 0.5 ...
//! ...
//! FEATURES_TXT_END_0
//! ```
//!
//! The parser only classifies single lines; keeping the two streams in lock
//! step is the store's job.

use anyhow::{Context, Result, bail};

pub const SCORES_BEGIN: &str = "SCORES_TXT_BEGIN_0";
pub const SCORES_END: &str = "SCORES_TXT_END_0";
pub const FEATURES_BEGIN: &str = "FEATURES_TXT_BEGIN_0";
pub const FEATURES_END: &str = "FEATURES_TXT_END_0";

/// Header of a scores block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub sentence_id: usize,
    pub nbest_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoresLine {
    Begin(BlockHeader),
    End,
    Values(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeaturesLine {
    /// Carries the dense feature names declared by the header.
    Begin(Vec<String>),
    End,
    Values(Vec<f64>),
}

pub fn parse_scores_line(line: &str) -> Result<ScoresLine> {
    if line.starts_with(SCORES_BEGIN) {
        let items: Vec<&str> = line.split_whitespace().collect();
        if items.len() < 3 {
            bail!("truncated scores header: {line:?}");
        }
        let sentence_id = items[1]
            .parse()
            .with_context(|| format!("bad sentence id in scores header: {line:?}"))?;
        let nbest_size = items[2]
            .parse()
            .with_context(|| format!("bad n-best size in scores header: {line:?}"))?;
        return Ok(ScoresLine::Begin(BlockHeader {
            sentence_id,
            nbest_size,
        }));
    }
    if line.starts_with(SCORES_END) {
        return Ok(ScoresLine::End);
    }
    Ok(ScoresLine::Values(parse_values(line)?))
}

pub fn parse_features_line(line: &str) -> Result<FeaturesLine> {
    if line.starts_with(FEATURES_BEGIN) {
        let items: Vec<&str> = line.split_whitespace().collect();
        if items.len() < 4 {
            bail!("truncated features header: {line:?}");
        }
        let dense_count: usize = items[3]
            .parse()
            .with_context(|| format!("bad dense feature count in features header: {line:?}"))?;
        let names = &items[4..];
        if names.len() < dense_count {
            bail!(
                "features header declares {dense_count} dense features but names {}: {line:?}",
                names.len()
            );
        }
        return Ok(FeaturesLine::Begin(
            names[..dense_count].iter().map(|s| s.to_string()).collect(),
        ));
    }
    if line.starts_with(FEATURES_END) {
        return Ok(FeaturesLine::End);
    }
    Ok(FeaturesLine::Values(parse_values(line)?))
}

/// Whitespace-separated floats.
pub fn parse_values(line: &str) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|item| {
            item.parse::<f64>()
                .with_context(|| format!("not a number: {item:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_header() {
        let line = parse_scores_line("SCORES_TXT_BEGIN_0 7 100 9 BLEU").unwrap();
        assert_eq!(
            line,
            ScoresLine::Begin(BlockHeader {
                sentence_id: 7,
                nbest_size: 100
            })
        );
    }

    #[test]
    fn test_features_header_names() {
        let line =
            parse_features_line("FEATURES_TXT_BEGIN_0 0 100 3 LM0 TM0 WP0 extra").unwrap();
        assert_eq!(
            line,
            FeaturesLine::Begin(vec!["LM0".into(), "TM0".into(), "WP0".into()])
        );
    }

    #[test]
    fn test_features_header_short_names_rejected() {
        assert!(parse_features_line("FEATURES_TXT_BEGIN_0 0 100 3 LM0").is_err());
    }

    #[test]
    fn test_end_markers() {
        assert_eq!(parse_scores_line("SCORES_TXT_END_0").unwrap(), ScoresLine::End);
        assert_eq!(
            parse_features_line("FEATURES_TXT_END_0").unwrap(),
            FeaturesLine::End
        );
    }

    #[test]
    fn test_values_and_garbage() {
        assert_eq!(
            parse_scores_line("1 2 3.5").unwrap(),
            ScoresLine::Values(vec![1.0, 2.0, 3.5])
        );
        assert!(parse_values("1 two 3").is_err());
        assert!(parse_scores_line("SCORES_TXT_BEGIN_0 x 10").is_err());
    }
}
