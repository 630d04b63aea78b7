//! Viterbi-style sweep over per-dimension weight candidates.
//!
//! ## The problem
//!
//! Each dimension offers a handful of candidate values and we want the
//! combination with the highest corpus BLEU. BLEU does not decompose over
//! sentences or dimensions, so every candidate vector has to be scored in
//! full against the whole corpus. Exhaustive search is a product over all
//! dimensions; the sweep is linear in the number of dimensions.
//!
//! ## One sweep
//!
//! ```text
//! dim 0      dim 1      dim 2          cell (i, j) = best predecessor k in dim i-1
//!  c00 ──┐    c10 ──┐    c20                         + score of
//!  c01 ──┼──▶ c11 ──┼──▶ c21             backtrace(i-1, k) ++ [c_ij] ++ current[i+1..]
//!  c02 ──┘    c12 ──┘
//! ```
//!
//! - Dimensions are processed strictly in order; row `i` reads rows `< i`.
//! - Within a row every candidate `j` is independent, so the row is scored
//!   on the rayon pool. `collect` is the barrier before the next row.
//! - A predecessor is only recorded when its score beats 0.
//! - The final row's best cell is backtraced into the sweep's result.

use anyhow::Result;
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::debug;

use super::weights::WeightBlock;
use crate::corpus::CandidateStore;
use crate::metric::Metric;

/// One DP cell: the chosen predecessor in the previous dimension (None for
/// dimension 0 or when nothing beat the 0 sentinel) and the score reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub predecessor: Option<usize>,
    pub score: f64,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            predecessor: None,
            score: 0.0,
        }
    }
}

/// Backpointer table of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatrix {
    rows: Vec<Vec<Cell>>,
}

impl SearchMatrix {
    pub fn new(block: &WeightBlock) -> Self {
        let rows = block
            .matrix()
            .iter()
            .map(|values| vec![Cell::default(); values.len()])
            .collect();
        Self { rows }
    }

    pub fn cell(&self, dim: usize, index: usize) -> Cell {
        self.rows[dim][index]
    }

    pub fn row(&self, dim: usize) -> &[Cell] {
        &self.rows[dim]
    }

    fn set_row(&mut self, dim: usize, cells: Vec<Cell>) {
        debug_assert_eq!(self.rows[dim].len(), cells.len());
        self.rows[dim] = cells;
    }

    /// Weight values for dimensions `0..=dim`, following backpointers from
    /// `(dim, index)`. When the chain breaks, the remaining prefix is taken
    /// from `fallback`.
    pub fn backtrace(
        &self,
        block: &WeightBlock,
        dim: usize,
        index: usize,
        fallback: &[f64],
    ) -> Vec<f64> {
        let mut trace = vec![0.0; dim + 1];
        let mut cursor = Some(index);
        for row in (0..=dim).rev() {
            match cursor {
                Some(j) => {
                    trace[row] = block.candidates(row)[j];
                    cursor = self.rows[row][j].predecessor;
                }
                None => trace[row] = fallback[row],
            }
        }
        trace
    }

    /// Best cell of the last row, if any cell beat 0.
    pub fn best_final(&self) -> Option<(usize, f64)> {
        let last = self.rows.last()?;
        let mut best = None;
        let mut best_score = 0.0;
        for (j, cell) in last.iter().enumerate() {
            if cell.score > best_score {
                best_score = cell.score;
                best = Some((j, cell.score));
            }
        }
        best
    }
}

/// Result of a sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub vector: Vec<f64>,
    pub score: f64,
    pub matrix: SearchMatrix,
}

/// Read-only inputs shared by every worker of a sweep.
#[derive(Clone, Copy)]
pub struct SweepContext<'a> {
    pub store: &'a CandidateStore,
    pub block: &'a WeightBlock,
    pub metric: &'a Metric,
}

impl<'a> SweepContext<'a> {
    pub fn new(store: &'a CandidateStore, block: &'a WeightBlock, metric: &'a Metric) -> Self {
        Self {
            store,
            block,
            metric,
        }
    }

    /// Run one full sweep starting from `current`.
    ///
    /// A failing worker (e.g. a weight vector of the wrong width) aborts the
    /// sweep: a missing cell would corrupt every later backtrace.
    pub fn sweep(&self, current: &[f64], pool: &ThreadPool) -> Result<SweepOutcome> {
        let dims = self.block.len();
        if current.len() != dims {
            anyhow::bail!(
                "current vector has {} entries for {dims} weight dimensions",
                current.len()
            );
        }

        let mut matrix = SearchMatrix::new(self.block);
        for dim in 0..dims {
            let width = self.block.candidates(dim).len();
            let row = pool.install(|| {
                (0..width)
                    .into_par_iter()
                    .map(|j| self.evaluate(dim, j, &matrix, current))
                    .collect::<Result<Vec<Cell>>>()
            })?;

            debug!(
                dim,
                name = %self.block.names()[dim],
                best = row.iter().map(|c| c.score).fold(0.0, f64::max),
                "dimension scored"
            );
            matrix.set_row(dim, row);
        }

        let (vector, score) = match matrix.best_final() {
            Some((j, score)) => (matrix.backtrace(self.block, dims - 1, j, current), score),
            None => (current.to_vec(), 0.0),
        };

        Ok(SweepOutcome {
            vector,
            score,
            matrix,
        })
    }

    /// Score candidate `j` of dimension `dim` against every predecessor.
    fn evaluate(
        &self,
        dim: usize,
        j: usize,
        matrix: &SearchMatrix,
        current: &[f64],
    ) -> Result<Cell> {
        let predecessors: Vec<Option<usize>> = if dim == 0 {
            vec![None]
        } else {
            (0..self.block.candidates(dim - 1).len()).map(Some).collect()
        };

        let value = self.block.candidates(dim)[j];
        let mut best = Cell::default();

        for k in predecessors {
            let mut vector = match k {
                Some(k) => matrix.backtrace(self.block, dim - 1, k, current),
                None => Vec::with_capacity(current.len()),
            };
            vector.push(value);
            vector.extend_from_slice(&current[dim + 1..]);

            let score = self.store.score(&vector, self.metric)?;
            if score > best.score {
                best = Cell {
                    predecessor: k,
                    score,
                };
            }
        }

        Ok(best)
    }
}
