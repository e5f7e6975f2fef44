use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operation::OpKind;
use crate::record::ReadLocking;
use crate::types::Value;
use crate::workload::WorkloadMix;

/// Largest worker count a benchmark may request.
pub const MAX_WORKERS: usize = 3;

/// Errors raised while building a benchmark configuration. All of them are
/// reported before any worker thread is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mix `{mix}` has no weighted categories")]
    EmptyMix { mix: String },
    #[error("mix `{mix}` has invalid weight {weight} for `{kind}`")]
    InvalidWeight {
        mix: String,
        kind: OpKind,
        weight: f64,
    },
    #[error("weights of mix `{mix}` sum to zero")]
    ZeroTotalWeight { mix: String },
    #[error("weights of mix `{mix}` do not sum to a finite total")]
    NonFiniteTotalWeight { mix: String },
    #[error("mix `{mix}` cannot be sampled: {reason}")]
    Distribution { mix: String, reason: String },
    #[error("no workload mixes configured")]
    NoMixes,
    #[error("mix `{0}` is configured more than once")]
    DuplicateMix(String),
    #[error("no thread counts configured")]
    NoThreadCounts,
    #[error("thread count {0} outside 1..={max}", max = MAX_WORKERS)]
    ThreadCount(usize),
    #[error("trial count must be greater than zero")]
    ZeroTrials,
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Benchmark-wide configuration.
///
/// Every field has a default, so a JSON file only needs to name the values it
/// changes. Command line flags are applied on top by the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Length of the generated sequence handed to each worker.
    pub ops_per_worker: usize,
    /// Repetitions of every (thread count, mix) cell.
    pub trials: usize,
    /// Worker counts to measure, each in `1..=MAX_WORKERS`.
    pub thread_counts: Vec<usize>,
    /// Seed for sequence generation; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Value carried by every generated write.
    pub write_value: Value,
    pub read_locking: ReadLocking,
    pub mixes: Vec<WorkloadMix>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            ops_per_worker: 120_000,
            trials: 3,
            thread_counts: vec![1, 2, 3],
            seed: None,
            write_value: 1,
            read_locking: ReadLocking::Shared,
            mixes: WorkloadMix::presets().to_vec(),
        }
    }
}

impl BenchConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn with_ops_per_worker(mut self, ops: usize) -> Self {
        self.ops_per_worker = ops;
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_thread_counts(mut self, counts: Vec<usize>) -> Self {
        self.thread_counts = counts;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_read_locking(mut self, read_locking: ReadLocking) -> Self {
        self.read_locking = read_locking;
        self
    }

    pub fn with_mixes(mut self, mixes: Vec<WorkloadMix>) -> Self {
        self.mixes = mixes;
        self
    }

    /// Most workers any cell needs; one sequence is generated per slot.
    pub fn max_threads(&self) -> usize {
        self.thread_counts.iter().copied().max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        if self.thread_counts.is_empty() {
            return Err(ConfigError::NoThreadCounts);
        }
        if let Some(&bad) = self
            .thread_counts
            .iter()
            .find(|&&n| n == 0 || n > MAX_WORKERS)
        {
            return Err(ConfigError::ThreadCount(bad));
        }
        if self.mixes.is_empty() {
            return Err(ConfigError::NoMixes);
        }

        let mut seen = HashSet::new();
        for mix in &self.mixes {
            if !seen.insert(mix.name.as_str()) {
                return Err(ConfigError::DuplicateMix(mix.name.clone()));
            }
            mix.validate()?;
        }
        Ok(())
    }
}
