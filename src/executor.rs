use std::ops::AddAssign;
use std::time::{Duration, Instant};

use crate::operation::{Operation, ParseError, parse_lines};
use crate::record::SharedRecord;

/// Tally produced by replaying one operation sequence.
///
/// `checksum` sums every value read plus the length of every serialized
/// string. It only sanity-checks that the expected mix of operations ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub reads: u64,
    pub writes: u64,
    pub strings: u64,
    pub checksum: u64,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn ops(&self) -> u64 {
        self.reads + self.writes + self.strings
    }

    /// Sums counts and checksums; the elapsed time keeps the slowest input.
    pub fn merge(results: impl IntoIterator<Item = ExecutionResult>) -> Self {
        results.into_iter().fold(Self::default(), |mut acc, r| {
            acc += r;
            acc
        })
    }
}

impl AddAssign for ExecutionResult {
    fn add_assign(&mut self, other: Self) {
        self.reads += other.reads;
        self.writes += other.writes;
        self.strings += other.strings;
        self.checksum = self.checksum.wrapping_add(other.checksum);
        self.elapsed = self.elapsed.max(other.elapsed);
    }
}

/// Applies `ops` to `record` in order on the calling thread.
///
/// The elapsed time spans the first dispatch to the last completion.
pub fn execute(record: &SharedRecord, ops: &[Operation]) -> ExecutionResult {
    let mut result = ExecutionResult::default();
    let start = Instant::now();

    for op in ops {
        match *op {
            Operation::Read { field } => {
                result.reads += 1;
                result.checksum = result.checksum.wrapping_add(record.read(field));
            }
            Operation::Write { field, value } => {
                record.write(field, value);
                result.writes += 1;
            }
            Operation::Serialize => {
                let text = record.serialize();
                result.strings += 1;
                result.checksum = result.checksum.wrapping_add(text.len() as u64);
            }
        }
    }

    result.elapsed = start.elapsed();
    result
}

/// Parses descriptor lines up front, then replays them. Parsing is not part
/// of the measured time and a malformed line means nothing is executed.
pub fn execute_lines<S: AsRef<str>>(
    record: &SharedRecord,
    lines: &[S],
) -> Result<ExecutionResult, ParseError> {
    let ops = parse_lines(lines)?;
    Ok(execute(record, &ops))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    #[test]
    fn write_then_read_accumulates_value() {
        let record = SharedRecord::new();
        let result = execute_lines(&record, &["write 0 5", "read 0"]).unwrap();

        assert_eq!(result.checksum, 5);
        assert_eq!((result.reads, result.writes, result.strings), (1, 1, 0));
        assert_eq!(record.read(Field::F0), 5);
    }

    #[test]
    fn serialize_adds_string_length() {
        let record = SharedRecord::new();
        let lines = ["write 0 1", "write 1 2", "write 2 3", "string"];
        let result = execute_lines(&record, &lines).unwrap();

        let text = record.serialize();
        assert_eq!(text, "Record{0:1, 1:2, 2:3}");
        assert_eq!(result.strings, 1);
        assert_eq!(result.checksum, text.len() as u64);
    }

    #[test]
    fn malformed_line_executes_nothing() {
        let record = SharedRecord::new();
        let err = execute_lines(&record, &["write 1 8", "write 5 1"]).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(record.read(Field::F1), 0);
    }

    #[test]
    fn merge_sums_counts_and_keeps_slowest() {
        let a = ExecutionResult {
            reads: 2,
            writes: 1,
            strings: 0,
            checksum: 10,
            elapsed: Duration::from_millis(3),
        };
        let b = ExecutionResult {
            reads: 1,
            writes: 0,
            strings: 4,
            checksum: 7,
            elapsed: Duration::from_millis(9),
        };
        let merged = ExecutionResult::merge([a, b]);
        assert_eq!(merged.ops(), 8);
        assert_eq!(merged.checksum, 17);
        assert_eq!(merged.elapsed, Duration::from_millis(9));
    }
}
