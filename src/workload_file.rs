use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::operation::{Operation, ParseError, parse_sequence};
use crate::runner::DescriptorLines;
use crate::trial::MixWorkload;

#[derive(Debug, Error)]
pub enum WorkloadFileError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
}

fn io_error(
    action: &'static str,
    path: &Path,
) -> impl FnOnce(std::io::Error) -> WorkloadFileError {
    let path = path.to_path_buf();
    move |source| WorkloadFileError::Io {
        action,
        path,
        source,
    }
}

/// File name used for worker `worker` of mix `mix`.
pub fn sequence_file_name(mix: &str, worker: usize) -> String {
    format!("{mix}_t{worker}.txt")
}

/// Writes one descriptor per line.
pub fn write_sequence(path: impl AsRef<Path>, ops: &[Operation]) -> Result<(), WorkloadFileError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_error("create", path))?;
    let mut out = BufWriter::new(file);
    for op in ops {
        writeln!(out, "{op}").map_err(io_error("write", path))?;
    }
    out.flush().map_err(io_error("write", path))
}

/// Raw lines of a descriptor file, unparsed.
pub fn read_lines(path: impl AsRef<Path>) -> Result<DescriptorLines, WorkloadFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error("read", path))?;
    Ok(DescriptorLines(text.lines().map(str::to_string).collect()))
}

/// Reads and parses a descriptor file.
pub fn read_sequence(path: impl AsRef<Path>) -> Result<Vec<Operation>, WorkloadFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error("read", path))?;
    parse_sequence(&text).map_err(|source| WorkloadFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes every worker sequence of every mix into `dir`.
pub fn persist_workloads(
    dir: impl AsRef<Path>,
    workloads: &[MixWorkload<Vec<Operation>>],
) -> Result<Vec<PathBuf>, WorkloadFileError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(io_error("create", dir))?;

    let mut written = Vec::new();
    for workload in workloads {
        for (worker, ops) in workload.jobs.iter().enumerate() {
            let path = dir.join(sequence_file_name(&workload.name, worker));
            write_sequence(&path, ops)?;
            debug!(path = %path.display(), ops = ops.len(), "wrote workload file");
            written.push(path);
        }
    }
    Ok(written)
}

/// Loads `workers` descriptor files per mix from `dir` as unparsed jobs.
pub fn load_workloads(
    dir: impl AsRef<Path>,
    mixes: &[String],
    workers: usize,
) -> Result<Vec<MixWorkload<DescriptorLines>>, WorkloadFileError> {
    let dir = dir.as_ref();
    mixes
        .iter()
        .map(|name| {
            let jobs = (0..workers)
                .map(|worker| read_lines(dir.join(sequence_file_name(name, worker))))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MixWorkload {
                name: name.clone(),
                jobs,
            })
        })
        .collect()
}
