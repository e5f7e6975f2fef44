use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[path = "common.rs"]
mod common;

use common::{all_read_modes, busy_mix, count_kinds, seeded, within_deadline, write};
use lockbench::{
    DescriptorLines, Field, Operation, ReadLocking, RunError, SharedRecord, WorkerError,
    WorkerOutcome, WorkloadGenerator, run_concurrent, run_trials,
};

fn busy_sequences(workers: usize, ops: usize, seed: u64) -> Vec<Vec<Operation>> {
    WorkloadGenerator::new(&busy_mix())
        .unwrap()
        .generate_per_worker(workers, ops, &mut seeded(seed))
}

#[test]
fn counts_are_conserved_across_workers() {
    for workers in 1..=3 {
        let sequences = busy_sequences(workers, 5_000, workers as u64);
        let expected = sequences
            .iter()
            .map(|ops| count_kinds(ops))
            .fold((0, 0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));

        let record = SharedRecord::new();
        let run = run_concurrent(&record, &sequences).unwrap();

        assert!(run.complete);
        assert_eq!(run.workers.len(), workers);
        assert_eq!(run.completed_workers(), (0..workers).collect::<Vec<_>>());
        assert_eq!(
            (run.total.reads, run.total.writes, run.total.strings),
            expected
        );
    }
}

#[test]
fn wall_clock_covers_every_worker() {
    let sequences = busy_sequences(3, 20_000, 99);
    let record = SharedRecord::new();
    let run = run_concurrent(&record, &sequences).unwrap();

    assert_eq!(run.worker_durations().len(), 3);
    assert!(run.wall_clock >= run.max_worker_elapsed());
    assert_eq!(run.summary().wall_clock_us, run.wall_clock.as_micros());
}

#[test]
fn mixed_workers_always_terminate() {
    for mode in all_read_modes() {
        for workers in 1..=3 {
            let sequences = busy_sequences(workers, 20_000, 7 + workers as u64);
            let run = within_deadline("concurrent run", move || {
                let record = SharedRecord::with_read_locking(mode);
                run_concurrent(&record, &sequences).map(|run| run.total.ops())
            });
            assert_eq!(run.unwrap(), 20_000 * workers as u64);
        }
    }
}

#[test]
fn disjoint_field_writers_keep_their_own_values() {
    let sequences: Vec<Vec<Operation>> = Field::ALL
        .iter()
        .map(|&field| {
            let step = field.index() as u64 + 1;
            (1..=10_000).map(|v| write(field, v * step)).collect()
        })
        .collect();

    let record = SharedRecord::new();
    run_concurrent(&record, &sequences).unwrap();
    assert_eq!(record.snapshot().values, [10_000, 20_000, 30_000]);
}

#[test]
fn snapshots_are_consistent_under_concurrent_writes() {
    // Writers update fields 0, 1, 2 in that order with the same value, so at
    // every instant f0 >= f1 >= f2 and f0 - f2 <= 1.
    for mode in all_read_modes() {
        let record = Arc::new(SharedRecord::with_read_locking(mode));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let record = record.clone();
            let done = done.clone();
            thread::spawn(move || {
                for value in 1..=50_000u64 {
                    for field in Field::ALL {
                        record.write(field, value);
                    }
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut checked = 0;
        while !done.load(Ordering::SeqCst) || checked == 0 {
            let [v0, v1, v2] = record.snapshot().values;
            assert!(v0 >= v1 && v1 >= v2, "torn snapshot {v0} {v1} {v2}");
            assert!(v0 - v2 <= 1, "torn snapshot {v0} {v1} {v2}");
            checked += 1;
        }
        writer.join().unwrap();
        assert_eq!(record.snapshot().values, [50_000; 3]);
    }
}

#[test]
fn malformed_worker_is_reported_after_others_finish() {
    let good = DescriptorLines(vec!["write 0 4".into(), "read 0".into(), "string".into()]);
    let bad = DescriptorLines(vec!["read 0".into(), "write 3 1".into()]);
    let jobs = vec![good.clone(), bad, good];

    let record = SharedRecord::new();
    let (worker, source, run) = match run_concurrent(&record, &jobs) {
        Err(RunError::WorkerFailed {
            worker,
            source,
            run,
        }) => (worker, source, run),
        other => panic!("expected worker failure, got {other:?}"),
    };

    assert_eq!(worker, 1);
    assert!(matches!(source, WorkerError::Parse(ref e) if e.line == 2));
    assert!(!run.complete);
    assert_eq!(run.failed_workers(), vec![1]);
    assert_eq!(run.completed_workers(), vec![0, 2]);
    assert!(matches!(run.workers[1].outcome, WorkerOutcome::Failed(_)));
    assert_eq!(run.total.writes, 2);
    assert_eq!(record.read(Field::F0), 4);
}

#[test]
fn trials_use_a_fresh_record_each_time() {
    let jobs = vec![DescriptorLines(vec!["read 1".into(), "write 1 9".into()])];
    let runs = run_trials(&jobs, 4, ReadLocking::Shared).unwrap();

    assert_eq!(runs.len(), 4);
    // The read happens before the write on every trial, so it always sees 0.
    assert!(runs.iter().all(|run| run.total.checksum == 0));
}

#[test]
fn failing_trial_is_identified() {
    let jobs = vec![DescriptorLines(vec!["bogus".into()])];
    let err = run_trials(&jobs, 3, ReadLocking::Exclusive).unwrap_err();
    assert_eq!(err.trial, 0);
    assert!(matches!(err.source, RunError::WorkerFailed { .. }));
}
