use std::fmt;

/// Value stored in a record field and written by `write` operations.
pub type Value = u64;

/// Number of independently locked fields in a [`SharedRecord`](crate::SharedRecord).
pub const FIELD_COUNT: usize = 3;

/// One of the three lockable slots of the shared record.
///
/// The discriminant doubles as the lock acquisition rank: whenever more than
/// one field lock is held, they are taken in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    F0 = 0,
    F1 = 1,
    F2 = 2,
}

impl Field {
    /// Every field, in lock acquisition order.
    pub const ALL: [Field; FIELD_COUNT] = [Field::F0, Field::F1, Field::F2];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Range-checked conversion from a raw index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl TryFrom<usize> for Field {
    type Error = InvalidField;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::from_index(index).ok_or(InvalidField(index))
    }
}

impl From<Field> for usize {
    fn from(field: Field) -> Self {
        field.index()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Raw index that does not name a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidField(pub usize);

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field index {} out of range 0..{}", self.0, FIELD_COUNT)
    }
}

impl std::error::Error for InvalidField {}
