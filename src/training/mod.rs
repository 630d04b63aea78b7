//! Bridge between the search and a trainable weight producer.
//!
//! The search itself never learns. Between learned rounds this module picks
//! preference pairs from the store under the current weights and hands their
//! feature vectors to a `Combiner`:
//!
//! ```text
//! Combiner::produce_weights ─▶ Tuner::refine ─▶ SamplingScheme::samples
//!          ▲                                              │
//!          └────────── Combiner::train_step ◀── feature_batch
//! ```
//!
//! ## Sampling
//!
//! - **Extremal**: per sentence, the hypothesis with the highest smoothed
//!   score is "better" and the lowest is "worse". Weight independent.
//! - **HopeFear**: hope maximises model score plus metric score, fear
//!   maximises model score minus metric score.
//! - **RandomPairs**: uniformly drawn hypothesis pairs ordered by smoothed
//!   score. Kept for comparison runs.

mod combiner;
mod progress;
mod sampling;

pub use combiner::{Combiner, LinearBlender};
pub use progress::LiveProgress;
pub use sampling::{DEFAULT_RANDOM_PAIRS, Extreme, HopeFear, SamplingScheme};
