use std::fmt;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FIELD_COUNT, Field, InvalidField, Value};

/// Errors surfaced by index-based record access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("index error: {0}")]
    IndexOutOfRange(#[from] InvalidField),
}

/// How field locks are taken by readers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadLocking {
    /// Readers share a field lock with each other; writers exclude everyone.
    #[default]
    Shared,
    /// Every access takes the field lock exclusively.
    Exclusive,
}

/// Consistent copy of all fields taken under every field lock at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub values: [Value; FIELD_COUNT],
}

impl Snapshot {
    pub fn get(&self, field: Field) -> Value {
        self.values[field.index()]
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [v0, v1, v2] = self.values;
        write!(f, "Record{{0:{v0}, 1:{v1}, 2:{v2}}}")
    }
}

/// Three-field record shared by every worker of a run.
///
/// Each field sits behind its own lock so operations on disjoint fields never
/// block one another. Serialization additionally takes a record-level lock, so
/// two snapshots never interleave, and then every field lock in ascending
/// [`Field::ALL`] order before copying the values.
#[derive(Debug, Default)]
pub struct SharedRecord {
    fields: [RwLock<Value>; FIELD_COUNT],
    snapshot_lock: Mutex<()>,
    read_locking: ReadLocking,
}

impl SharedRecord {
    /// Fresh record with every field set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_locking(read_locking: ReadLocking) -> Self {
        Self {
            read_locking,
            ..Self::default()
        }
    }

    pub fn read_locking(&self) -> ReadLocking {
        self.read_locking
    }

    pub fn read(&self, field: Field) -> Value {
        let slot = self.slot(field);
        match self.read_locking {
            ReadLocking::Shared => *slot.read(),
            ReadLocking::Exclusive => *slot.write(),
        }
    }

    pub fn write(&self, field: Field, value: Value) {
        *self.slot(field).write() = value;
    }

    /// Range-checked read for callers holding a raw index.
    pub fn read_index(&self, index: usize) -> Result<Value, RecordError> {
        let field = Field::try_from(index)?;
        Ok(self.read(field))
    }

    /// Range-checked write; an invalid index leaves the record untouched.
    pub fn write_index(&self, index: usize, value: Value) -> Result<(), RecordError> {
        let field = Field::try_from(index)?;
        self.write(field, value);
        Ok(())
    }

    /// Copies all fields as of a single instant.
    pub fn snapshot(&self) -> Snapshot {
        let _serial = self.snapshot_lock.lock();
        let values = match self.read_locking {
            ReadLocking::Shared => {
                let guards = Field::ALL.map(|field| self.slot(field).read());
                guards.each_ref().map(|guard| **guard)
            }
            ReadLocking::Exclusive => {
                let guards = Field::ALL.map(|field| self.slot(field).write());
                guards.each_ref().map(|guard| **guard)
            }
        };
        Snapshot { values }
    }

    /// Deterministic string form of [`snapshot`](Self::snapshot).
    pub fn serialize(&self) -> String {
        self.snapshot().to_string()
    }

    fn slot(&self, field: Field) -> &RwLock<Value> {
        &self.fields[field.index()]
    }
}
