mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lockbench::workload_file::{load_workloads, persist_workloads};
use lockbench::{
    BenchConfig, BenchmarkReport, ReadLocking, generate_workloads, run_matrix, sanity_run,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use output::{millis, rows, write_csv, write_json};

#[derive(Parser, Debug)]
#[command(name = "lockbench-benchmark")]
struct Args {
    /// Label for this run (used in output file names).
    #[arg(long, default_value = "run")]
    label: String,

    /// JSON configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Operations generated per worker.
    #[arg(long)]
    ops: Option<usize>,

    /// Repetitions of every (threads, mix) cell.
    #[arg(long)]
    trials: Option<usize>,

    /// Comma-separated worker counts to measure (each 1..=3).
    #[arg(long, value_delimiter = ',')]
    threads: Option<Vec<usize>>,

    /// Seed for workload generation; random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// How readers take field locks.
    #[arg(long, value_enum)]
    read_locking: Option<ReadLockingArg>,

    /// Persist generated sequences here and replay them from disk.
    #[arg(long)]
    workload_dir: Option<PathBuf>,

    /// Directory to write the per-run CSV file.
    #[arg(long, default_value = "benchmark/reports/csv")]
    csv_dir: PathBuf,

    /// Optional path for a JSON copy of the report.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = build_config(&args)?;
    config.validate().context("invalid benchmark configuration")?;

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, "seeding workload generator");
    let mut rng = StdRng::seed_from_u64(seed);
    let generated = generate_workloads(&config, &mut rng)?;

    println!("=== {} ===", args.label);
    println!(
        "  seed {seed}, {} ops per worker, {} trials per cell, {:?} read locking",
        config.ops_per_worker, config.trials, config.read_locking
    );

    let report = match &args.workload_dir {
        Some(dir) => {
            let written = persist_workloads(dir, &generated)
                .with_context(|| format!("write workloads to {}", dir.display()))?;
            println!("  wrote {} workload files to {}", written.len(), dir.display());
            let names = generated.iter().map(|w| w.name.clone()).collect::<Vec<_>>();
            let loaded = load_workloads(dir, &names, config.max_threads())?;
            run_matrix(&config, &loaded)?
        }
        None => run_matrix(&config, &generated)?,
    };

    print_table(&report);
    print_counts(&report);

    if let Some(first) = generated.first().and_then(|w| w.jobs.first()) {
        let (result, snapshot) = sanity_run(first, config.read_locking)?;
        println!(
            "  sanity ({} single-threaded, {} ops): {snapshot}",
            generated[0].name,
            result.ops()
        );
    }

    let rows = rows(&args.label, &report);
    let path = write_csv(&args.csv_dir, &args.label, &rows)?;
    println!("    wrote {}", path.display());
    if let Some(json) = &args.json {
        write_json(json, &rows)?;
        println!("    wrote {}", json.display());
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::from_json_file(path)?,
        None => BenchConfig::default(),
    };

    if let Some(ops) = args.ops {
        config = config.with_ops_per_worker(ops);
    }
    if let Some(trials) = args.trials {
        config = config.with_trials(trials);
    }
    if let Some(threads) = &args.threads {
        config = config.with_thread_counts(threads.clone());
    }
    if args.seed.is_some() {
        config = config.with_seed(args.seed);
    }
    if let Some(mode) = args.read_locking {
        config = config.with_read_locking(mode.into());
    }
    Ok(config)
}

fn print_table(report: &BenchmarkReport) {
    println!();
    println!("  wall-clock time per cell (ms, mean over trials):");
    print!("  {:<8}", "threads");
    for mix in &report.mixes {
        print!(" | {mix:>12}");
    }
    println!();
    println!("  {}", "-".repeat(8 + report.mixes.len() * 15));

    for &threads in &report.thread_counts {
        print!("  {threads:<8}");
        for mix in &report.mixes {
            match report.cell(threads, mix) {
                Some(cell) => print!(" | {:>12.2}", millis(cell.mean())),
                None => print!(" | {:>12}", "-"),
            }
        }
        println!();
    }
    println!();
}

fn print_counts(report: &BenchmarkReport) {
    for cell in &report.cells {
        println!(
            "  {:<10} {}T: reads={} writes={} strings={} checksum={} max_worker={:.2}ms trimmed={:.2}ms",
            cell.mix,
            cell.threads,
            cell.last.reads,
            cell.last.writes,
            cell.last.strings,
            cell.last.checksum,
            millis(cell.mean_max_worker()),
            millis(cell.trimmed_mean()),
        );
    }
    println!();
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum ReadLockingArg {
    Shared,
    Exclusive,
}

impl From<ReadLockingArg> for ReadLocking {
    fn from(arg: ReadLockingArg) -> Self {
        match arg {
            ReadLockingArg::Shared => ReadLocking::Shared,
            ReadLockingArg::Exclusive => ReadLocking::Exclusive,
        }
    }
}
