//! viterbi-tune CLI - weight search over n-best lists
//!
//! Orchestrates one tuning run:
//!
//! 1. Config: `viterbi-tune.toml` (or `--config`) merged with CLI flags
//! 2. Metric: resolved before any file is read, so a typo fails fast
//! 3. Inputs: weight candidate file, paired scores/features n-best files
//! 4. Search: random restarts, or learned rounds driven by a combiner
//! 5. Output: best vector to stdout or `--out`, optional JSON report
//!
//! Logs and progress go to stderr; stdout only carries the weight vector.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use viterbi_tune::config::Config;
use viterbi_tune::corpus::CandidateStore;
use viterbi_tune::search::{TuneReport, Tuner, WeightBlock};
use viterbi_tune::training::{LinearBlender, LiveProgress};

/// Viterbi-style weight search for MT tuning
///
/// Picks one candidate value per weight dimension so that corpus BLEU (or
/// RED) over the given n-best lists is maximised.
///
/// Examples:
///   viterbi-tune -w weights.txt --scores s.0,s.1 --features f.0,f.1
///   viterbi-tune -w weights.txt --scores s --features f --restarts 50 --seed 3
///   viterbi-tune -w weights.txt --scores s --features f --learned-rounds 10
#[derive(Parser, Debug)]
#[command(name = "viterbi-tune")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    /// Metric name (BLEU or RED, case-insensitive)
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Weight candidate file
    ///
    /// One dimension per line: `name: v1 v2 ...`
    #[arg(short, long, value_name = "FILE")]
    pub weights: PathBuf,

    /// Scores n-best files, comma separated
    #[arg(long, value_name = "FILES", value_delimiter = ',', required = true)]
    pub scores: Vec<PathBuf>,

    /// Features n-best files, comma separated, paired with --scores
    #[arg(long, value_name = "FILES", value_delimiter = ',', required = true)]
    pub features: Vec<PathBuf>,

    /// Sweeps per restart
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Random restarts
    #[arg(short, long)]
    pub restarts: Option<usize>,

    /// Convergence threshold on consecutive sweep scores
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Seed for restarts and sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Learned rounds; when set, a combiner proposes the initial vectors
    #[arg(long)]
    pub learned_rounds: Option<usize>,

    /// Preference sampling for learned rounds
    ///
    /// One of: extremal, hope-fear, random, random:N
    #[arg(long)]
    pub sampling: Option<String>,

    /// Write the best vector here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Write a JSON report of every restart
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Config file (default: ./viterbi-tune.toml if present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging instead of the live progress line
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Flags that override config file values.
    fn overrides(&self) -> Config {
        Config {
            metric: self.metric.clone(),
            iterations: self.iterations,
            restarts: self.restarts,
            tolerance: self.tolerance,
            seed: self.seed,
            threads: self.threads,
            sampling: self.sampling.clone(),
            learned_rounds: self.learned_rounds,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let report = run(&cli)?;

    let vector = report.best.render();
    match &cli.out {
        Some(path) => std::fs::write(path, format!("{vector}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", vector),
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    Ok(())
}

/// RUST_LOG wins; otherwise warnings only, or debug under --verbose.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> Result<TuneReport> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let config = Config::load(cli.config.as_deref(), &cwd)?.merge(cli.overrides());

    let metric = config.metric()?;
    let sampling = config.sampling()?;
    let options = config.tune_options();
    let color = !cli.no_color;

    if color {
        eprintln!("{}", format!(" viterbi-tune v{} ", env!("CARGO_PKG_VERSION")).bold().on_blue());
    } else {
        eprintln!("viterbi-tune v{}", env!("CARGO_PKG_VERSION"));
    }
    eprintln!("{}", config.display_summary());

    let block = WeightBlock::load(&cli.weights)?;
    let mut store = CandidateStore::new();
    store.load(cli.scores.as_slice(), cli.features.as_slice())?;
    eprintln!(
        "   Metric: {}, {} sentences, {} hypotheses, {} dimensions ({} combinations)",
        metric,
        store.size(),
        store.num_hypotheses(),
        block.len(),
        block.combinations()
    );
    info!(
        pairs = store.pairs_loaded(),
        dense = store.dense_size(),
        empty_blocks = store.empty_blocks(),
        "corpus loaded"
    );

    let tuner = Tuner::new(&store, &block, metric, options)?;
    let live = !cli.verbose;
    let mut progress = LiveProgress::new(color);

    let rounds = config.learned_rounds();
    let report = if rounds > 0 {
        let mut blender = LinearBlender::new(&block, tuner.options().seed)
            .with_learning_rate(config.learning_rate.unwrap_or(0.1))
            .with_l1(config.l1.unwrap_or(0.01));
        tuner.run_learned(&mut blender, rounds, sampling, |round, it, score| {
            progress.record(score);
            if live {
                progress.display(round, rounds, it);
            }
        })?
    } else {
        let total = tuner.options().restarts;
        tuner.run(|restart, it, score| {
            progress.record(score);
            if live {
                progress.display(restart, total, it);
            }
        })?
    };

    progress.final_summary(&report);
    let _ = std::io::stderr().flush();

    Ok(report)
}
