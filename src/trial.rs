use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BenchConfig, ConfigError};
use crate::executor::ExecutionResult;
use crate::operation::Operation;
use crate::record::{ReadLocking, SharedRecord, Snapshot};
use crate::runner::{ConcurrentRun, RunError, RunSummary, WorkerError, WorkerJob, run_concurrent};
use crate::workload::WorkloadGenerator;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("mix `{mix}` has {available} worker sequences, {threads} requested")]
    MissingSequences {
        mix: String,
        available: usize,
        threads: usize,
    },
    #[error("mix `{mix}` with {threads} threads, {source}")]
    Run {
        mix: String,
        threads: usize,
        source: TrialError,
    },
}

/// A trial whose concurrent run failed; later trials were not attempted.
#[derive(Debug, Error)]
#[error("trial {trial}: {source}")]
pub struct TrialError {
    pub trial: usize,
    pub source: RunError,
}

/// Per-worker jobs generated (or loaded) for one mix. Worker `n` of any
/// thread count always replays `jobs[n]`.
#[derive(Debug, Clone)]
pub struct MixWorkload<J> {
    pub name: String,
    pub jobs: Vec<J>,
}

/// Generates `config.max_threads()` independent sequences for every mix.
pub fn generate_workloads<R: Rng + ?Sized>(
    config: &BenchConfig,
    rng: &mut R,
) -> Result<Vec<MixWorkload<Vec<Operation>>>, ConfigError> {
    config.validate()?;
    config
        .mixes
        .iter()
        .map(|mix| {
            let generator = WorkloadGenerator::new(mix)?.with_write_value(config.write_value);
            let jobs =
                generator.generate_per_worker(config.max_threads(), config.ops_per_worker, rng);
            debug!(
                mix = %mix.name,
                workers = jobs.len(),
                ops = config.ops_per_worker,
                "generated workload"
            );
            Ok(MixWorkload {
                name: mix.name.clone(),
                jobs,
            })
        })
        .collect()
}

/// Repeats a concurrent run `trials` times, each on a fresh record.
pub fn run_trials<J: WorkerJob>(
    jobs: &[J],
    trials: usize,
    read_locking: ReadLocking,
) -> Result<Vec<ConcurrentRun>, TrialError> {
    (0..trials)
        .map(|trial| {
            let record = SharedRecord::with_read_locking(read_locking);
            let run =
                run_concurrent(&record, jobs).map_err(|source| TrialError { trial, source })?;
            debug!(trial, wall_clock = ?run.wall_clock, "trial finished");
            Ok(run)
        })
        .collect()
}

/// Timings of one (thread count, mix) cell across all trials.
#[derive(Debug, Clone)]
pub struct CellResult {
    pub mix: String,
    pub threads: usize,
    /// Concurrent wall-clock span of every trial. This is the headline metric.
    pub wall_clock: Vec<Duration>,
    /// Slowest single worker of every trial.
    pub max_worker: Vec<Duration>,
    /// Aggregated counts of the last trial.
    pub last: RunSummary,
}

impl CellResult {
    fn from_runs(mix: &str, threads: usize, runs: &[ConcurrentRun]) -> Option<Self> {
        let last = runs.last()?.summary();
        Some(Self {
            mix: mix.to_string(),
            threads,
            wall_clock: runs.iter().map(|r| r.wall_clock).collect(),
            max_worker: runs.iter().map(ConcurrentRun::max_worker_elapsed).collect(),
            last,
        })
    }

    pub fn mean(&self) -> Duration {
        mean(&self.wall_clock)
    }

    pub fn trimmed_mean(&self) -> Duration {
        trimmed_mean(&self.wall_clock)
    }

    pub fn mean_max_worker(&self) -> Duration {
        mean(&self.max_worker)
    }
}

/// Result matrix: rows are thread counts, columns are mixes.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub thread_counts: Vec<usize>,
    pub mixes: Vec<String>,
    pub cells: Vec<CellResult>,
}

impl BenchmarkReport {
    pub fn cell(&self, threads: usize, mix: &str) -> Option<&CellResult> {
        self.cells
            .iter()
            .find(|c| c.threads == threads && c.mix == mix)
    }
}

/// Runs every configured (thread count, mix) cell `config.trials` times.
pub fn run_matrix<J: WorkerJob>(
    config: &BenchConfig,
    workloads: &[MixWorkload<J>],
) -> Result<BenchmarkReport, BenchError> {
    config.validate()?;

    let mut cells = Vec::with_capacity(workloads.len() * config.thread_counts.len());
    for workload in workloads {
        for &threads in &config.thread_counts {
            let jobs = workload
                .jobs
                .get(..threads)
                .ok_or_else(|| BenchError::MissingSequences {
                    mix: workload.name.clone(),
                    available: workload.jobs.len(),
                    threads,
                })?;

            info!(mix = %workload.name, threads, trials = config.trials, "running cell");
            let runs = run_trials(jobs, config.trials, config.read_locking).map_err(|source| {
                BenchError::Run {
                    mix: workload.name.clone(),
                    threads,
                    source,
                }
            })?;

            if let Some(cell) = CellResult::from_runs(&workload.name, threads, &runs) {
                info!(
                    mix = %cell.mix,
                    threads,
                    mean = ?cell.mean(),
                    "cell finished"
                );
                cells.push(cell);
            }
        }
    }

    Ok(BenchmarkReport {
        thread_counts: config.thread_counts.clone(),
        mixes: workloads.iter().map(|w| w.name.clone()).collect(),
        cells,
    })
}

/// Replays one job single-threaded on a fresh record and returns the record's
/// final state.
pub fn sanity_run<J: WorkerJob>(
    job: &J,
    read_locking: ReadLocking,
) -> Result<(ExecutionResult, Snapshot), WorkerError> {
    let record = SharedRecord::with_read_locking(read_locking);
    let result = job.run(&record)?;
    Ok((result, record.snapshot()))
}

pub fn mean(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    samples.iter().sum::<Duration>() / samples.len() as u32
}

/// Mean after dropping the fastest and slowest sample when more than two are
/// available.
pub fn trimmed_mean(samples: &[Duration]) -> Duration {
    let mut ordered = samples.to_vec();
    ordered.sort();
    let slice = if ordered.len() > 2 {
        &ordered[1..ordered.len() - 1]
    } else {
        &ordered[..]
    };
    mean(slice)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::workload::WorkloadMix;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&v| Duration::from_millis(v)).collect()
    }

    #[test]
    fn trimmed_mean_drops_extremes() {
        assert_eq!(trimmed_mean(&ms(&[1, 10, 20, 30, 500])), Duration::from_millis(20));
        assert_eq!(trimmed_mean(&ms(&[4, 8])), Duration::from_millis(6));
        assert_eq!(trimmed_mean(&[]), Duration::ZERO);
    }

    #[test]
    fn workloads_have_one_sequence_per_worker_slot() {
        let config = BenchConfig::default()
            .with_ops_per_worker(50)
            .with_thread_counts(vec![1, 2]);
        let mut rng = StdRng::seed_from_u64(1);
        let workloads = generate_workloads(&config, &mut rng).unwrap();

        assert_eq!(workloads.len(), 3);
        for workload in &workloads {
            assert_eq!(workload.jobs.len(), 2);
            assert!(workload.jobs.iter().all(|job| job.len() == 50));
        }
    }

    #[test]
    fn matrix_covers_every_cell() {
        let config = BenchConfig::default()
            .with_ops_per_worker(200)
            .with_trials(3);
        let mut rng = StdRng::seed_from_u64(11);
        let workloads = generate_workloads(&config, &mut rng).unwrap();
        let report = run_matrix(&config, &workloads).unwrap();

        assert_eq!(report.cells.len(), 9);
        for threads in 1..=3 {
            for mix in &report.mixes {
                let cell = report.cell(threads, mix).unwrap();
                assert_eq!(cell.wall_clock.len(), 3);
                let ops = cell.last.reads + cell.last.writes + cell.last.strings;
                assert_eq!(ops, 200 * threads as u64);
                assert!(cell.last.complete);
            }
        }
    }

    #[test]
    fn too_few_sequences_is_reported() {
        let config = BenchConfig::default()
            .with_ops_per_worker(10)
            .with_mixes(vec![WorkloadMix::presets()[1].clone()]);
        let workloads = vec![MixWorkload {
            name: "b-equal".to_string(),
            jobs: vec![Vec::<Operation>::new()],
        }];
        let err = run_matrix(&config, &workloads).unwrap_err();
        assert!(matches!(
            err,
            BenchError::MissingSequences { available: 1, threads: 2, .. }
        ));
    }
}
