//! Restart loop around the sweep.
//!
//! ## Lifecycle of one restart
//!
//! ```text
//! Idle ──▶ Sweeping ──▶ Sweeping ──▶ ... ──▶ Converged
//!                                      └───▶ MaxIterationsReached
//! ```
//!
//! A restart starts from an initial vector (random candidates, or a
//! combiner's output), scores it, then sweeps repeatedly, feeding each
//! sweep's vector into the next. It stops when two consecutive scores differ
//! by less than the tolerance or when the iteration cap is hit.
//!
//! The best `(vector, score)` seen anywhere, initial vectors included, is
//! the answer of the whole run.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::viterbi::{SweepContext, SweepOutcome};
use super::weights::WeightBlock;
use crate::corpus::CandidateStore;
use crate::metric::Metric;
use crate::training::{Combiner, SamplingScheme};
use crate::types::ScoredVector;

/// Knobs of the restart loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneOptions {
    /// Sweeps per restart.
    pub iterations: usize,
    /// Random initial vectors.
    pub restarts: usize,
    /// Convergence threshold on consecutive sweep scores.
    pub tolerance: f64,
    pub seed: u64,
    /// Worker threads; None uses available parallelism.
    pub threads: Option<usize>,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            iterations: 5,
            restarts: 20,
            tolerance: 1e-6,
            seed: 0,
            threads: None,
        }
    }
}

/// How a restart ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Converged,
    MaxIterationsReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartKind {
    Random,
    Learned,
}

/// Per-restart record for the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartReport {
    pub restart: usize,
    pub kind: RestartKind,
    pub initial: ScoredVector,
    pub final_vector: ScoredVector,
    /// Score after each sweep.
    pub history: Vec<f64>,
    pub termination: Termination,
    /// Training cost reported by the combiner, learned restarts only.
    pub train_cost: Option<f64>,
}

/// Outcome of refining one initial vector.
#[derive(Debug, Clone)]
pub struct Refinement {
    pub initial: ScoredVector,
    pub best: ScoredVector,
    pub history: Vec<f64>,
    pub termination: Termination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneReport {
    pub metric: String,
    pub dimensions: Vec<String>,
    pub best: ScoredVector,
    pub restarts: Vec<RestartReport>,
    pub elapsed_secs: f64,
}

/// Drives restarts and sweeps over a loaded store and weight block.
pub struct Tuner<'a> {
    store: &'a CandidateStore,
    block: &'a WeightBlock,
    metric: Metric,
    options: TuneOptions,
    pool: ThreadPool,
}

impl<'a> Tuner<'a> {
    /// Validate the inputs against each other and build the worker pool.
    pub fn new(
        store: &'a CandidateStore,
        block: &'a WeightBlock,
        metric: Metric,
        options: TuneOptions,
    ) -> Result<Self> {
        if store.is_empty() {
            bail!("candidate store is empty");
        }
        if store.stats_width() != metric.num_stats() {
            bail!(
                "{metric} expects {} statistics per hypothesis, corpus has {}",
                metric.num_stats(),
                store.stats_width()
            );
        }
        if block.len() != store.feature_width() {
            bail!(
                "weight file has {} dimensions but hypotheses carry {} features",
                block.len(),
                store.feature_width()
            );
        }
        if options.iterations == 0 {
            bail!("iterations must be at least 1");
        }

        let threads = options.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Failed to build worker pool")?;

        Ok(Self {
            store,
            block,
            metric,
            options,
            pool,
        })
    }

    pub fn options(&self) -> &TuneOptions {
        &self.options
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    fn context(&self) -> SweepContext<'_> {
        SweepContext::new(self.store, self.block, &self.metric)
    }

    /// One sweep from `current`.
    pub fn sweep(&self, current: &[f64]) -> Result<SweepOutcome> {
        self.context().sweep(current, &self.pool)
    }

    /// Sweep from `initial` until convergence or the iteration cap.
    ///
    /// `on_sweep` sees every sweep's score, for progress display.
    pub fn refine(
        &self,
        initial: Vec<f64>,
        mut on_sweep: impl FnMut(usize, f64),
    ) -> Result<Refinement> {
        let initial_score = self.store.score(&initial, &self.metric)?;
        let initial = ScoredVector::new(initial, initial_score);
        let mut best = initial.clone();
        let mut current = initial.weights.clone();
        let mut prev_score = initial_score;
        let mut history = Vec::with_capacity(self.options.iterations);
        let mut termination = Termination::MaxIterationsReached;

        for iteration in 1..=self.options.iterations {
            let outcome = self.sweep(&current)?;
            info!(iteration, score = outcome.score, "sweep finished");
            on_sweep(iteration, outcome.score);
            history.push(outcome.score);

            if outcome.score > best.score {
                best = ScoredVector::new(outcome.vector.clone(), outcome.score);
            }
            current = outcome.vector;

            if (prev_score - outcome.score).abs() < self.options.tolerance {
                termination = Termination::Converged;
                break;
            }
            prev_score = outcome.score;
        }

        Ok(Refinement {
            initial,
            best,
            history,
            termination,
        })
    }

    /// Random restarts.
    pub fn run(&self, mut on_sweep: impl FnMut(usize, usize, f64)) -> Result<TuneReport> {
        let started = Instant::now();
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut best: Option<ScoredVector> = None;
        let mut restarts = Vec::with_capacity(self.options.restarts);

        for restart in 0..self.options.restarts {
            let initial = self.block.random_vector(&mut rng);
            info!(restart, "random init");
            let report = self.restart(restart, RestartKind::Random, initial, |it, s| {
                on_sweep(restart, it, s)
            })?;
            keep_best(&mut best, &report.initial);
            keep_best(&mut best, &report.final_vector);
            restarts.push(report);
        }

        self.finish(best, restarts, started)
    }

    /// Restarts seeded by a trainable combiner.
    ///
    /// Each round asks the combiner for a weight vector built from the
    /// candidate matrix, refines it with sweeps, then trains the combiner on
    /// preference pairs sampled under the refined weights.
    pub fn run_learned<C: Combiner + ?Sized>(
        &self,
        combiner: &mut C,
        rounds: usize,
        scheme: SamplingScheme,
        mut on_sweep: impl FnMut(usize, usize, f64),
    ) -> Result<TuneReport> {
        let started = Instant::now();
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut best: Option<ScoredVector> = None;
        let mut restarts = Vec::with_capacity(rounds);

        for round in 0..rounds {
            let proposed = combiner
                .produce_weights(self.block.matrix())
                .context("combiner failed to produce weights")?;
            info!(round, "learned init");
            let mut report = self.restart(round, RestartKind::Learned, proposed, |it, s| {
                on_sweep(round, it, s)
            })?;

            let samples = scheme.samples(
                self.store,
                &self.metric,
                &report.final_vector.weights,
                &mut rng,
            )?;
            let batch = self.store.feature_batch(&samples, &self.metric);
            let cost = if batch.is_empty() {
                None
            } else {
                Some(combiner.train_step(&batch).context("combiner training step failed")?)
            };
            info!(round, pairs = batch.len() / 2, cost = ?cost, "combiner trained");
            report.train_cost = cost;

            keep_best(&mut best, &report.initial);
            keep_best(&mut best, &report.final_vector);
            restarts.push(report);
        }

        self.finish(best, restarts, started)
    }

    fn restart(
        &self,
        restart: usize,
        kind: RestartKind,
        initial: Vec<f64>,
        on_sweep: impl FnMut(usize, f64),
    ) -> Result<RestartReport> {
        let refined = self.refine(initial, on_sweep)?;
        info!(
            restart,
            init = refined.initial.score,
            best = refined.best.score,
            termination = ?refined.termination,
            "restart finished"
        );
        Ok(RestartReport {
            restart,
            kind,
            initial: refined.initial,
            final_vector: refined.best,
            history: refined.history,
            termination: refined.termination,
            train_cost: None,
        })
    }

    fn finish(
        &self,
        best: Option<ScoredVector>,
        restarts: Vec<RestartReport>,
        started: Instant,
    ) -> Result<TuneReport> {
        let Some(best) = best else {
            bail!("no restarts were run");
        };
        info!(
            best = best.score,
            weights = %best.render(),
            "best point"
        );
        Ok(TuneReport {
            metric: self.metric.name().to_string(),
            dimensions: self.block.names().to_vec(),
            best,
            restarts,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

fn keep_best(best: &mut Option<ScoredVector>, candidate: &ScoredVector) {
    let better = match best {
        None => true,
        Some(current) => candidate.score > current.score,
    };
    if better {
        *best = Some(candidate.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::fixtures::{scenario_block, scenario_store};
    use crate::training::LinearBlender;

    fn options() -> TuneOptions {
        TuneOptions {
            restarts: 4,
            threads: Some(2),
            seed: 11,
            ..TuneOptions::default()
        }
    }

    #[test]
    fn test_run_finds_scenario_optimum() {
        let store = scenario_store();
        let block = scenario_block();
        let tuner = Tuner::new(&store, &block, Metric::default(), options()).unwrap();

        let mut sweeps = 0;
        let report = tuner.run(|_, _, _| sweeps += 1).unwrap();
        assert_eq!(report.best.weights, vec![0.9, 0.2]);
        assert!((report.best.score - 0.41).abs() < 1e-12);
        assert_eq!(report.restarts.len(), 4);
        assert!(sweeps >= 4);
        assert_eq!(report.dimensions, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_refine_converges_after_stable_sweep() {
        let store = scenario_store();
        let block = scenario_block();
        let tuner = Tuner::new(&store, &block, Metric::default(), options()).unwrap();

        let refined = tuner.refine(vec![0.1, 0.2], |_, _| {}).unwrap();
        assert!((refined.initial.score - 0.2).abs() < 1e-12);
        assert_eq!(refined.best.weights, vec![0.9, 0.2]);
        // 0.2 -> 0.41, then 0.41 -> 0.41 converges
        assert_eq!(refined.history, vec![refined.best.score; 2]);
        assert_eq!(refined.termination, Termination::Converged);
    }

    #[test]
    fn test_iteration_cap() {
        let store = scenario_store();
        let block = scenario_block();
        let opts = TuneOptions {
            iterations: 1,
            ..options()
        };
        let tuner = Tuner::new(&store, &block, Metric::default(), opts).unwrap();
        let refined = tuner.refine(vec![0.1, 0.2], |_, _| {}).unwrap();
        assert_eq!(refined.history.len(), 1);
        assert_eq!(refined.termination, Termination::MaxIterationsReached);
    }

    #[test]
    fn test_dimension_mismatch_rejected_at_startup() {
        let store = scenario_store();
        let block = WeightBlock::new(vec!["x".into()], vec![vec![1.0]]).unwrap();
        assert!(Tuner::new(&store, &block, Metric::default(), options()).is_err());
    }

    #[test]
    fn test_metric_width_mismatch_rejected() {
        let store = scenario_store();
        let block = scenario_block();
        let red = Metric::from_name("RED").unwrap();
        assert!(Tuner::new(&store, &block, red, options()).is_err());
    }

    #[test]
    fn test_learned_rounds_report_costs() {
        let store = scenario_store();
        let block = scenario_block();
        let tuner = Tuner::new(&store, &block, Metric::default(), options()).unwrap();
        let mut blender = LinearBlender::new(&block, 5);

        let report = tuner
            .run_learned(&mut blender, 2, SamplingScheme::Extremal, |_, _, _| {})
            .unwrap();
        assert_eq!(report.restarts.len(), 2);
        assert!(report.restarts.iter().all(|r| r.kind == RestartKind::Learned));
        assert!(report.restarts.iter().all(|r| r.train_cost.is_some()));
        assert!((report.best.score - 0.41).abs() < 1e-12);
    }

    #[test]
    fn test_report_serializes() {
        let store = scenario_store();
        let block = scenario_block();
        let tuner = Tuner::new(&store, &block, Metric::default(), options()).unwrap();
        let report = tuner.run(|_, _, _| {}).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"metric\":\"BLEU\""));
        assert!(json.contains("Converged") || json.contains("MaxIterationsReached"));
    }
}
