//! Configuration loading from viterbi-tune.toml.
//!
//! Values come from three layers, later ones winning:
//! built-in defaults, the `[tune]` table of the config file, CLI flags.
//!
//! ## Example
//!
//! ```toml
//! [tune]
//! metric = "bleu"
//! iterations = 8
//! restarts = 30
//! seed = 7
//! sampling = "hope-fear"
//! learned-rounds = 10
//! learning-rate = 0.05
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::metric::Metric;
use crate::search::TuneOptions;
use crate::training::SamplingScheme;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "viterbi-tune.toml";

/// Tuning configuration. Unset fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Source file for this config (for display).
    #[serde(skip)]
    pub source: Option<PathBuf>,

    pub metric: Option<String>,
    pub iterations: Option<usize>,
    pub restarts: Option<usize>,
    pub tolerance: Option<f64>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
    pub sampling: Option<String>,
    /// Learned restarts; zero or unset runs random restarts only.
    pub learned_rounds: Option<usize>,
    pub learning_rate: Option<f64>,
    pub l1: Option<f64>,
}

/// File layout: everything lives under `[tune]`.
#[derive(Debug, Deserialize, Default)]
struct RawFile {
    tune: Option<Config>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, `viterbi-tune.toml`
    /// in `directory` is used when present, else defaults.
    pub fn load(explicit: Option<&Path>, directory: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let default_path = directory.join(CONFIG_FILE);
        if default_path.exists() {
            return Self::load_file(&default_path);
        }

        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse the contents of a config file.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawFile = toml::from_str(content)?;
        Ok(raw.tune.unwrap_or_default())
    }

    /// Layer `overrides` on top of `self`. Set fields in `overrides` win.
    pub fn merge(self, overrides: Config) -> Self {
        Self {
            source: self.source,
            metric: overrides.metric.or(self.metric),
            iterations: overrides.iterations.or(self.iterations),
            restarts: overrides.restarts.or(self.restarts),
            tolerance: overrides.tolerance.or(self.tolerance),
            seed: overrides.seed.or(self.seed),
            threads: overrides.threads.or(self.threads),
            sampling: overrides.sampling.or(self.sampling),
            learned_rounds: overrides.learned_rounds.or(self.learned_rounds),
            learning_rate: overrides.learning_rate.or(self.learning_rate),
            l1: overrides.l1.or(self.l1),
        }
    }

    /// Metric named by the config, BLEU when unset.
    pub fn metric(&self) -> Result<Metric> {
        match &self.metric {
            Some(name) => Metric::from_name(name),
            None => Ok(Metric::default()),
        }
    }

    pub fn sampling(&self) -> Result<SamplingScheme> {
        match &self.sampling {
            Some(name) => name.parse(),
            None => Ok(SamplingScheme::default()),
        }
    }

    pub fn tune_options(&self) -> TuneOptions {
        let defaults = TuneOptions::default();
        TuneOptions {
            iterations: self.iterations.unwrap_or(defaults.iterations),
            restarts: self.restarts.unwrap_or(defaults.restarts),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            seed: self.seed.unwrap_or(defaults.seed),
            threads: self.threads.or(defaults.threads),
        }
    }

    pub fn learned_rounds(&self) -> usize {
        self.learned_rounds.unwrap_or(0)
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();

        if let Some(ref source) = self.source {
            lines.push(format!("   Config: {}", source.display()));
        } else {
            lines.push("   Config: (defaults)".to_string());
        }

        let options = self.tune_options();
        lines.push(format!(
            "   Iterations: {}, restarts: {}, tolerance: {:e}, seed: {}",
            options.iterations, options.restarts, options.tolerance, options.seed
        ));
        if let Some(threads) = options.threads {
            lines.push(format!("   Threads: {threads}"));
        }
        if self.learned_rounds() > 0 {
            lines.push(format!(
                "   Learned rounds: {} ({})",
                self.learned_rounds(),
                self.sampling.as_deref().unwrap_or("extremal")
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tune_table() {
        let config = Config::parse(
            r#"
            [tune]
            metric = "red"
            iterations = 8
            learned-rounds = 3
            learning-rate = 0.05
            sampling = "random:5"
            "#,
        )
        .unwrap();

        assert_eq!(config.metric().unwrap(), Metric::from_name("RED").unwrap());
        assert_eq!(config.iterations, Some(8));
        assert_eq!(config.learned_rounds(), 3);
        assert_eq!(config.learning_rate, Some(0.05));
        assert_eq!(
            config.sampling().unwrap(),
            SamplingScheme::RandomPairs { per_sentence: 5 }
        );
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        let options = config.tune_options();
        assert_eq!(options.iterations, 5);
        assert_eq!(options.restarts, 20);
        assert_eq!(config.metric().unwrap(), Metric::default());
        assert_eq!(config.sampling().unwrap(), SamplingScheme::Extremal);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::parse("[tune]\nrestart = 3\n").is_err());
    }

    #[test]
    fn test_unknown_metric_surfaces_on_use() {
        let config = Config::parse("[tune]\nmetric = \"ter\"\n").unwrap();
        assert!(config.metric().is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = Config {
            iterations: Some(8),
            restarts: Some(30),
            seed: Some(1),
            ..Default::default()
        };
        let cli = Config {
            restarts: Some(2),
            ..Default::default()
        };

        let options = file.merge(cli).tune_options();
        assert_eq!(options.iterations, 8);
        assert_eq!(options.restarts, 2);
        assert_eq!(options.seed, 1);
    }

    #[test]
    fn test_load_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[tune]\nseed = 1\n").unwrap();
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[tune]\nseed = 2\n").unwrap();

        let found = Config::load(None, dir.path()).unwrap();
        assert_eq!(found.seed, Some(1));
        assert_eq!(found.source, Some(dir.path().join(CONFIG_FILE)));

        let chosen = Config::load(Some(&explicit), dir.path()).unwrap();
        assert_eq!(chosen.seed, Some(2));

        assert!(Config::load(Some(&dir.path().join("missing.toml")), dir.path()).is_err());
    }

    #[test]
    fn test_load_without_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(None, dir.path()).unwrap();
        assert!(config.source.is_none());
    }
}
