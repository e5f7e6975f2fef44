use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use lockbench::{BenchmarkReport, CellResult};
use serde::Serialize;

#[derive(Serialize)]
pub struct OutputRow {
    pub label: String,
    pub mix: String,
    pub threads: usize,
    pub trials: usize,
    pub mean_ms: f64,
    pub trimmed_mean_ms: f64,
    pub mean_max_worker_ms: f64,
    pub durations_ms: Vec<f64>,
    pub reads: u64,
    pub writes: u64,
    pub strings: u64,
    pub checksum: u64,
}

impl OutputRow {
    pub fn from_cell(label: &str, cell: &CellResult) -> Self {
        Self {
            label: label.to_string(),
            mix: cell.mix.clone(),
            threads: cell.threads,
            trials: cell.wall_clock.len(),
            mean_ms: millis(cell.mean()),
            trimmed_mean_ms: millis(cell.trimmed_mean()),
            mean_max_worker_ms: millis(cell.mean_max_worker()),
            durations_ms: cell.wall_clock.iter().copied().map(millis).collect(),
            reads: cell.last.reads,
            writes: cell.last.writes,
            strings: cell.last.strings,
            checksum: cell.last.checksum,
        }
    }
}

pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

pub fn rows(label: &str, report: &BenchmarkReport) -> Vec<OutputRow> {
    report
        .cells
        .iter()
        .map(|cell| OutputRow::from_cell(label, cell))
        .collect()
}

pub fn write_csv(dir: &Path, name: &str, rows: &[OutputRow]) -> Result<PathBuf> {
    create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{name}.csv"));
    let mut file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    writeln!(
        file,
        "label,mix,threads,trials,mean_ms,trimmed_mean_ms,mean_max_worker_ms,durations_ms,reads,writes,strings,checksum"
    )?;

    for row in rows {
        writeln!(
            file,
            "{},{},{},{},{:.3},{:.3},{:.3},\"{}\",{},{},{},{}",
            row.label,
            row.mix,
            row.threads,
            row.trials,
            row.mean_ms,
            row.trimmed_mean_ms,
            row.mean_max_worker_ms,
            row.durations_ms
                .iter()
                .map(|d| format!("{d:.3}"))
                .collect::<Vec<_>>()
                .join(";"),
            row.reads,
            row.writes,
            row.strings,
            row.checksum
        )?;
    }

    Ok(path)
}

pub fn write_json(path: &Path, rows: &[OutputRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer_pretty(file, rows).context("serialize report")?;
    Ok(())
}
