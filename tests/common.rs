use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lockbench::{Field, OpKind, Operation, ReadLocking, WorkloadMix};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Upper bound for anything that is expected to terminate.
#[allow(dead_code)]
pub const DEADLINE: Duration = Duration::from_secs(30);

#[allow(dead_code)]
pub fn all_read_modes() -> [ReadLocking; 2] {
    [ReadLocking::Shared, ReadLocking::Exclusive]
}

#[allow(dead_code)]
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Mix touching every category, serialization included.
#[allow(dead_code)]
pub fn busy_mix() -> WorkloadMix {
    WorkloadMix::from_weights("busy", [3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 2.0])
}

/// (reads, writes, strings) contained in `ops`.
#[allow(dead_code)]
pub fn count_kinds(ops: &[Operation]) -> (u64, u64, u64) {
    ops.iter().fold((0, 0, 0), |(r, w, s), op| match op.kind() {
        OpKind::Read(_) => (r + 1, w, s),
        OpKind::Write(_) => (r, w + 1, s),
        OpKind::Serialize => (r, w, s + 1),
    })
}

#[allow(dead_code)]
pub fn read(field: Field) -> Operation {
    Operation::Read { field }
}

#[allow(dead_code)]
pub fn write(field: Field, value: u64) -> Operation {
    Operation::Write { field, value }
}

/// Runs `f` on a helper thread and fails the test if it does not return
/// within [`DEADLINE`].
#[allow(dead_code)]
pub fn within_deadline<T, F>(what: &str, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(DEADLINE)
        .unwrap_or_else(|_| panic!("{what} did not finish within {DEADLINE:?}"))
}
