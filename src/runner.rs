use std::any::Any;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::executor::{ExecutionResult, execute, execute_lines};
use crate::operation::{Operation, ParseError};
use crate::record::SharedRecord;

/// Why a single worker did not complete its sequence.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("malformed workload: {0}")]
    Parse(#[from] ParseError),
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("worker was never released")]
    Cancelled,
}

/// Errors surfaced by [`run_concurrent`] once every worker has been joined.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no worker sequences supplied")]
    NoWorkers,
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        source: std::io::Error,
    },
    #[error(
        "worker {worker} failed ({} of {} workers failed): {source}",
        .run.failed_workers().len(),
        .run.workers.len()
    )]
    WorkerFailed {
        worker: usize,
        source: WorkerError,
        /// Partial results; `run.complete` is false.
        run: ConcurrentRun,
    },
}

/// Sequence a worker replays against the shared record.
pub trait WorkerJob: Sync {
    fn run(&self, record: &SharedRecord) -> Result<ExecutionResult, WorkerError>;
}

impl WorkerJob for Vec<Operation> {
    fn run(&self, record: &SharedRecord) -> Result<ExecutionResult, WorkerError> {
        Ok(execute(record, self))
    }
}

/// Unparsed descriptor lines; each worker parses its own lines before its
/// timer starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorLines(pub Vec<String>);

impl WorkerJob for DescriptorLines {
    fn run(&self, record: &SharedRecord) -> Result<ExecutionResult, WorkerError> {
        Ok(execute_lines(record, &self.0)?)
    }
}

#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Completed(ExecutionResult),
    Failed(WorkerError),
}

#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub outcome: WorkerOutcome,
}

impl WorkerReport {
    pub fn result(&self) -> Option<&ExecutionResult> {
        match &self.outcome {
            WorkerOutcome::Completed(result) => Some(result),
            WorkerOutcome::Failed(_) => None,
        }
    }
}

/// Outcome of one concurrent batch.
#[derive(Debug, Clone)]
pub struct ConcurrentRun {
    /// From the release of all workers to the return of the last join.
    pub wall_clock: Duration,
    pub workers: Vec<WorkerReport>,
    /// Sum over completed workers only.
    pub total: ExecutionResult,
    /// False when at least one worker failed.
    pub complete: bool,
}

impl ConcurrentRun {
    /// Slowest individually measured worker.
    pub fn max_worker_elapsed(&self) -> Duration {
        self.worker_durations().into_iter().max().unwrap_or_default()
    }

    pub fn worker_durations(&self) -> Vec<Duration> {
        self.workers
            .iter()
            .filter_map(|w| w.result().map(|r| r.elapsed))
            .collect()
    }

    pub fn completed_workers(&self) -> Vec<usize> {
        self.workers
            .iter()
            .filter(|w| w.result().is_some())
            .map(|w| w.worker)
            .collect()
    }

    pub fn failed_workers(&self) -> Vec<usize> {
        self.workers
            .iter()
            .filter(|w| w.result().is_none())
            .map(|w| w.worker)
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            workers: self.workers.len(),
            wall_clock_us: self.wall_clock.as_micros(),
            max_worker_us: self.max_worker_elapsed().as_micros(),
            reads: self.total.reads,
            writes: self.total.writes,
            strings: self.total.strings,
            checksum: self.total.checksum,
            complete: self.complete,
        }
    }
}

/// Flat view of a [`ConcurrentRun`] for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub workers: usize,
    pub wall_clock_us: u128,
    pub max_worker_us: u128,
    pub reads: u64,
    pub writes: u64,
    pub strings: u64,
    pub checksum: u64,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum GateState {
    #[default]
    Closed,
    Open,
    Cancelled,
}

/// Holds spawned workers until every one of them exists.
#[derive(Default)]
struct StartGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl StartGate {
    /// Blocks until the gate leaves `Closed`; true when the worker should run.
    fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while *state == GateState::Closed {
            self.changed.wait(&mut state);
        }
        *state == GateState::Open
    }

    fn set(&self, next: GateState) {
        *self.state.lock() = next;
        self.changed.notify_all();
    }
}

/// Runs one OS thread per job against the same `record` and waits for all of
/// them.
///
/// Workers are released together once all threads are spawned. A failing
/// worker does not stop the others; after every join the lowest-indexed
/// failure is returned inside [`RunError::WorkerFailed`] together with the
/// partial run.
pub fn run_concurrent<J: WorkerJob>(
    record: &SharedRecord,
    jobs: &[J],
) -> Result<ConcurrentRun, RunError> {
    if jobs.is_empty() {
        return Err(RunError::NoWorkers);
    }

    let gate = StartGate::default();
    let (wall_clock, joined) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(jobs.len());
        for (worker, job) in jobs.iter().enumerate() {
            let gate = &gate;
            let spawned = thread::Builder::new()
                .name(format!("worker-{worker}"))
                .spawn_scoped(scope, move || {
                    if !gate.wait() {
                        return Err(WorkerError::Cancelled);
                    }
                    job.run(record)
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    gate.set(GateState::Cancelled);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(RunError::Spawn { worker, source });
                }
            }
        }

        debug!(workers = handles.len(), "releasing workers");
        let start = Instant::now();
        gate.set(GateState::Open);
        let joined = handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>();
        Ok((start.elapsed(), joined))
    })?;

    let workers = joined
        .into_iter()
        .enumerate()
        .map(|(worker, joined)| {
            let outcome = match joined {
                Ok(Ok(result)) => WorkerOutcome::Completed(result),
                Ok(Err(err)) => WorkerOutcome::Failed(err),
                Err(payload) => {
                    WorkerOutcome::Failed(WorkerError::Panicked(panic_message(payload)))
                }
            };
            if let WorkerOutcome::Failed(err) = &outcome {
                warn!(worker, error = %err, "worker failed");
            }
            WorkerReport { worker, outcome }
        })
        .collect::<Vec<_>>();

    let total = ExecutionResult::merge(workers.iter().filter_map(|w| w.result().copied()));
    let first_failure = workers.iter().find_map(|w| match &w.outcome {
        WorkerOutcome::Failed(err) => Some((w.worker, err.clone())),
        WorkerOutcome::Completed(_) => None,
    });

    let run = ConcurrentRun {
        wall_clock,
        workers,
        total,
        complete: first_failure.is_none(),
    };

    match first_failure {
        Some((worker, source)) => Err(RunError::WorkerFailed {
            worker,
            source,
            run,
        }),
        None => {
            info!(
                workers = run.workers.len(),
                ops = run.total.ops(),
                wall_clock = ?run.wall_clock,
                "concurrent run finished"
            );
            Ok(run)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    impl WorkerJob for Exploding {
        fn run(&self, _record: &SharedRecord) -> Result<ExecutionResult, WorkerError> {
            panic!("boom");
        }
    }

    #[test]
    fn gate_releases_all_waiters() {
        let gate = StartGate::default();
        thread::scope(|scope| {
            let waiters: Vec<_> = (0..3).map(|_| scope.spawn(|| gate.wait())).collect();
            gate.set(GateState::Open);
            assert!(waiters.into_iter().all(|h| h.join().unwrap()));
        });
    }

    #[test]
    fn cancelled_gate_turns_workers_away() {
        let gate = StartGate::default();
        gate.set(GateState::Cancelled);
        assert!(!gate.wait());
    }

    #[test]
    fn empty_job_list_is_rejected() {
        let record = SharedRecord::new();
        let jobs: Vec<Vec<Operation>> = Vec::new();
        assert!(matches!(
            run_concurrent(&record, &jobs),
            Err(RunError::NoWorkers)
        ));
    }

    #[test]
    fn panicking_worker_is_reported_after_join() {
        let record = SharedRecord::new();
        let err = run_concurrent(&record, &[Exploding, Exploding]).unwrap_err();
        match err {
            RunError::WorkerFailed {
                worker,
                source: WorkerError::Panicked(msg),
                run,
            } => {
                assert_eq!(worker, 0);
                assert_eq!(msg, "boom");
                assert!(!run.complete);
                assert_eq!(run.failed_workers(), vec![0, 1]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
