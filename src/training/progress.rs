//! Tuning progress display for the terminal.
//!
//! Sparklines of the corpus score after each sweep, written to stderr so the
//! weight vector on stdout stays pipeable.

use std::io::Write;

use owo_colors::OwoColorize;

use crate::search::{Termination, TuneReport};

/// Live progress over restarts and sweeps.
pub struct LiveProgress {
    score_history: Vec<f64>,
    best: f64,
    color: bool,
}

impl LiveProgress {
    pub fn new(color: bool) -> Self {
        Self {
            score_history: Vec::new(),
            best: 0.0,
            color,
        }
    }

    /// Record the score of one sweep.
    pub fn record(&mut self, score: f64) {
        self.score_history.push(score);
        self.best = self.best.max(score);
    }

    /// Render sparkline from values.
    pub fn sparkline(values: &[f64], width: usize) -> String {
        if values.is_empty() {
            return " ".repeat(width);
        }

        let chars = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = (max - min).max(0.001);

        // Sample or pad to width
        let mut result = String::new();
        for i in 0..width {
            let idx = if values.len() <= width {
                if i < values.len() { Some(i) } else { None }
            } else {
                Some(i * values.len() / width)
            };

            if let Some(idx) = idx {
                let normalized = (values[idx] - min) / range;
                let char_idx = ((normalized * 7.0).round() as usize).min(7);
                result.push(chars[char_idx]);
            } else {
                result.push(' ');
            }
        }
        result
    }

    /// Redraw the status line.
    pub fn display(&self, restart: usize, total: usize, iteration: usize) {
        let mut err = std::io::stderr().lock();

        // Clear line and move cursor
        let _ = write!(err, "\x1b[2K\r");
        let _ = write!(err, "R{:2}/{} it{} ", restart + 1, total, iteration);

        if let Some(last) = self.score_history.last() {
            let _ = write!(
                err,
                "score[{}]{:.4} best {:.4}",
                Self::sparkline(&self.score_history, 20),
                last,
                self.best
            );
        }

        let _ = err.flush();
    }

    /// Print the final summary of a run.
    pub fn final_summary(&self, report: &TuneReport) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "\n");

        let banner = " TUNING COMPLETE ";
        if self.color {
            let _ = writeln!(err, "{}", banner.bold().on_green());
        } else {
            let _ = writeln!(err, "{banner}");
        }

        let converged = report
            .restarts
            .iter()
            .filter(|r| r.termination == Termination::Converged)
            .count();
        let sweeps: usize = report.restarts.iter().map(|r| r.history.len()).sum();

        let _ = writeln!(
            err,
            "  {}: {:.4}",
            report.metric,
            report.best.score
        );
        let _ = writeln!(
            err,
            "  restarts: {} ({} converged), sweeps: {}, {:.1}s",
            report.restarts.len(),
            converged,
            sweeps,
            report.elapsed_secs
        );
        if !self.score_history.is_empty() {
            let line = Self::sparkline(&self.score_history, 40);
            if self.color {
                let _ = writeln!(err, "  [{}]", line.cyan());
            } else {
                let _ = writeln!(err, "  [{line}]");
            }
        }
        for (name, value) in report.dimensions.iter().zip(&report.best.weights) {
            let _ = writeln!(err, "  {name:>12} = {value}");
        }
        let _ = writeln!(err);
    }
}
