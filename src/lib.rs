//! Core crate exports for lockbench.
//!
//! The modules exposed here define the pieces of the contention benchmark: the
//! field-locked shared record, operations and their descriptor format, the
//! weighted workload generator, and the single- and multi-threaded executors
//! that replay generated sequences and time them.

pub mod config;
pub mod executor;
pub mod operation;
pub mod record;
pub mod runner;
pub mod trial;
pub mod types;
pub mod workload;
pub mod workload_file;

pub use config::{BenchConfig, ConfigError, MAX_WORKERS};
pub use executor::{ExecutionResult, execute, execute_lines};
pub use operation::{OpKind, Operation, ParseError, ParseErrorKind, parse_line, parse_sequence};
pub use record::{ReadLocking, RecordError, SharedRecord, Snapshot};
pub use runner::{
    ConcurrentRun, DescriptorLines, RunError, RunSummary, WorkerError, WorkerJob, WorkerOutcome,
    WorkerReport, run_concurrent,
};
pub use trial::{
    BenchError, BenchmarkReport, CellResult, MixWorkload, TrialError, generate_workloads,
    run_matrix, run_trials, sanity_run,
};
pub use types::{FIELD_COUNT, Field, InvalidField, Value};
pub use workload::{WorkloadGenerator, WorkloadMix, generate};
