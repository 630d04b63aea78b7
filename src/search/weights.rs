//! Weight candidate blocks.
//!
//! One line per dimension:
//!
//! ```text
//! LM0: 0.1 0.25 0.5
//! TM0: 0.2 0.3
//! TM0: 0.05 0.1
//! ```
//!
//! Each line proposes candidate values for one weight dimension. Repeated
//! names are disambiguated: the first repeat renames the earlier dimension
//! to `TM0_0` and the repeat becomes `TM0_1`, then `TM0_2` and so on.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::Rng;

use crate::corpus::parse_values;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightBlock {
    names: Vec<String>,
    candidates: Vec<Vec<f64>>,
}

impl WeightBlock {
    /// Build a block directly. Every dimension needs at least one candidate.
    pub fn new(names: Vec<String>, candidates: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != candidates.len() {
            bail!(
                "{} dimension names for {} candidate lists",
                names.len(),
                candidates.len()
            );
        }
        if candidates.is_empty() {
            bail!("weight block has no dimensions");
        }
        if let Some(idx) = candidates.iter().position(Vec::is_empty) {
            bail!("weight dimension {:?} has no candidate values", names[idx]);
        }
        Ok(Self { names, candidates })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open weight file {}", path.display()))?;
        Self::parse(BufReader::new(file))
            .with_context(|| format!("Failed to parse weight file {}", path.display()))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut candidates = Vec::new();
        // name -> (index of first occurrence, repeats seen so far)
        let mut seen: HashMap<String, (usize, usize)> = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let Some(name) = head.strip_suffix(':') else {
                bail!("line {}: expected `name: values...`, got {line:?}", line_no + 1);
            };
            let values = parse_values(rest).with_context(|| format!("line {}", line_no + 1))?;

            let unique = match seen.get_mut(name) {
                None => {
                    seen.insert(name.to_string(), (names.len(), 0));
                    name.to_string()
                }
                Some((first, repeats)) => {
                    if *repeats == 0 {
                        names[*first] = format!("{name}_0");
                    }
                    *repeats += 1;
                    format!("{name}_{repeats}")
                }
            };

            names.push(unique);
            candidates.push(values);
        }

        Self::new(names, candidates)
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn candidates(&self, dim: usize) -> &[f64] {
        &self.candidates[dim]
    }

    /// Candidate lists as a ragged matrix (one row per dimension).
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.candidates
    }

    /// Total number of combinations, saturating.
    pub fn combinations(&self) -> usize {
        self.candidates
            .iter()
            .fold(1usize, |acc, c| acc.saturating_mul(c.len()))
    }

    /// Assemble a vector from one candidate index per dimension.
    pub fn vector(&self, indices: &[usize]) -> Vec<f64> {
        indices
            .iter()
            .zip(&self.candidates)
            .map(|(&j, values)| values[j])
            .collect()
    }

    /// One uniformly drawn candidate per dimension.
    pub fn random_vector<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        self.candidates
            .iter()
            .map(|values| values[rng.gen_range(0..values.len())])
            .collect()
    }
}
