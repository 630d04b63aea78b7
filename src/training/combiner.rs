//! Trainable weight combiners.
//!
//! A combiner turns the candidate matrix of a weight block into one weight
//! per dimension, and learns from interleaved (better, worse) feature pairs.
//! The search only depends on the `Combiner` trait; `LinearBlender` is the
//! bundled implementation.
//!
//! ## LinearBlender
//!
//! ```text
//! w_d = sum_j W[d][j] * M[d][j] + b_d        M = candidate matrix
//! cost = mean(max(0, w.worse - w.better)) + l1 * sum|W|
//! ```
//!
//! Plain gradient descent on the pairwise hinge. Initial mixing weights are
//! uniform in `+-sqrt(6 / (n_candidates + 1))` from a seeded RNG.

use anyhow::{Result, bail};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::search::WeightBlock;

pub trait Combiner {
    /// Weight vector (one entry per dimension) for the given candidate matrix.
    fn produce_weights(&mut self, feature_matrix: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// One update from interleaved (better, worse) feature vectors. Returns
    /// the cost before the update.
    fn train_step(&mut self, batch: &[Vec<f64>]) -> Result<f64>;
}

#[derive(Debug, Clone)]
pub struct LinearBlender {
    mix: Vec<Vec<f64>>,
    bias: Vec<f64>,
    /// Matrix seen by the last `produce_weights` call.
    inputs: Vec<Vec<f64>>,
    pub learning_rate: f64,
    pub l1: f64,
}

impl LinearBlender {
    pub fn new(block: &WeightBlock, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mix = block
            .matrix()
            .iter()
            .map(|row| {
                let bound = (6.0 / (row.len() as f64 + 1.0)).sqrt();
                row.iter().map(|_| rng.gen_range(-bound..bound)).collect()
            })
            .collect();
        Self::from_parts(mix, vec![0.0; block.len()])
    }

    pub fn from_parts(mix: Vec<Vec<f64>>, bias: Vec<f64>) -> Self {
        Self {
            mix,
            bias,
            inputs: Vec::new(),
            learning_rate: 0.1,
            l1: 0.01,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_l1(mut self, l1: f64) -> Self {
        self.l1 = l1;
        self
    }

    fn blend(&self, matrix: &[Vec<f64>]) -> Vec<f64> {
        self.mix
            .iter()
            .zip(matrix)
            .zip(&self.bias)
            .map(|((w, m), b)| w.iter().zip(m).map(|(w, m)| w * m).sum::<f64>() + b)
            .collect()
    }

    fn check_shape(&self, matrix: &[Vec<f64>]) -> Result<()> {
        let same = matrix.len() == self.mix.len()
            && matrix.iter().zip(&self.mix).all(|(m, w)| m.len() == w.len());
        if !same {
            bail!("candidate matrix shape does not match the blender");
        }
        Ok(())
    }
}

impl Combiner for LinearBlender {
    fn produce_weights(&mut self, feature_matrix: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.check_shape(feature_matrix)?;
        self.inputs = feature_matrix.to_vec();
        Ok(self.blend(feature_matrix))
    }

    fn train_step(&mut self, batch: &[Vec<f64>]) -> Result<f64> {
        if self.inputs.is_empty() {
            bail!("produce_weights must run before train_step");
        }
        if batch.len() % 2 != 0 {
            bail!("feature batch must hold (better, worse) pairs, got {} rows", batch.len());
        }
        let dims = self.mix.len();
        if let Some(row) = batch.iter().find(|row| row.len() != dims) {
            bail!("feature row has {} entries, expected {dims}", row.len());
        }

        let weights = self.blend(&self.inputs);
        let pairs = (batch.len() / 2).max(1) as f64;
        let mut hinge = 0.0;
        let mut grad = vec![0.0; dims];

        for pair in batch.chunks_exact(2) {
            let (better, worse) = (&pair[0], &pair[1]);
            let delta = dot(&weights, worse) - dot(&weights, better);
            if delta > 0.0 {
                hinge += delta;
                for (g, (w, b)) in grad.iter_mut().zip(worse.iter().zip(better)) {
                    *g += (w - b) / pairs;
                }
            }
        }

        let penalty: f64 = self.mix.iter().flatten().map(|w| w.abs()).sum();
        let cost = hinge / pairs + self.l1 * penalty;

        for (d, row) in self.mix.iter_mut().enumerate() {
            for (w, m) in row.iter_mut().zip(&self.inputs[d]) {
                *w -= self.learning_rate * (grad[d] * m + self.l1 * sign(*w));
            }
            self.bias[d] -= self.learning_rate * grad[d];
        }

        Ok(cost)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
