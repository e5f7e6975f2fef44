use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Field, InvalidField, Value};

/// Why a descriptor line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("unexpected trailing token `{0}`")]
    TrailingToken(String),
    #[error("invalid {what} `{token}`")]
    InvalidNumber { what: &'static str, token: String },
    #[error("{0}")]
    FieldOutOfRange(InvalidField),
}

/// A malformed descriptor line. `line` is 1-based; zero when parsing a lone
/// descriptor outside of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind} in {content:?}")]
pub struct ParseError {
    pub line: usize,
    pub content: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn at(line: usize, content: &str, kind: ParseErrorKind) -> Self {
        Self {
            line,
            content: content.to_string(),
            kind,
        }
    }
}

/// Single instruction replayed against a [`SharedRecord`](crate::SharedRecord).
///
/// The textual form is one line of the workload descriptor format:
/// `read <field>`, `write <field> <value>` or `string`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read { field: Field },
    Write { field: Field, value: Value },
    Serialize,
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match *self {
            Operation::Read { field } => OpKind::Read(field),
            Operation::Write { field, .. } => OpKind::Write(field),
            Operation::Serialize => OpKind::Serialize,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read { field } => write!(f, "read {field}"),
            Operation::Write { field, value } => write!(f, "write {field} {value}"),
            Operation::Serialize => f.write_str("string"),
        }
    }
}

impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(0, s)
    }
}

/// Operation category used to weight workload mixes. Writes carry no value
/// here; the generator supplies it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum OpKind {
    Read(Field),
    Write(Field),
    Serialize,
}

impl OpKind {
    /// All seven categories in canonical order.
    pub const ALL: [OpKind; 7] = [
        OpKind::Read(Field::F0),
        OpKind::Write(Field::F0),
        OpKind::Read(Field::F1),
        OpKind::Write(Field::F1),
        OpKind::Read(Field::F2),
        OpKind::Write(Field::F2),
        OpKind::Serialize,
    ];

    pub fn to_operation(self, write_value: Value) -> Operation {
        match self {
            OpKind::Read(field) => Operation::Read { field },
            OpKind::Write(field) => Operation::Write {
                field,
                value: write_value,
            },
            OpKind::Serialize => Operation::Serialize,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Read(field) => write!(f, "read{field}"),
            OpKind::Write(field) => write!(f, "write{field}"),
            OpKind::Serialize => f.write_str("string"),
        }
    }
}

impl FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| format!("unknown operation category `{s}`"))
    }
}

impl TryFrom<String> for OpKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OpKind> for String {
    fn from(kind: OpKind) -> Self {
        kind.to_string()
    }
}

/// Parses one descriptor line. `line_no` is only used for error reporting.
pub fn parse_line(line_no: usize, line: &str) -> Result<Operation, ParseError> {
    let fail = |kind: ParseErrorKind| ParseError::at(line_no, line, kind);
    let mut tokens = line.split_whitespace();

    let op = match tokens.next() {
        Some("read") => Operation::Read {
            field: parse_field(tokens.next()).map_err(fail)?,
        },
        Some("write") => {
            let field = parse_field(tokens.next()).map_err(fail)?;
            let token = tokens
                .next()
                .ok_or(ParseErrorKind::MissingArgument("value"))
                .map_err(fail)?;
            let value = token
                .parse::<Value>()
                .map_err(|_| ParseErrorKind::InvalidNumber {
                    what: "value",
                    token: token.to_string(),
                })
                .map_err(fail)?;
            Operation::Write { field, value }
        }
        Some("string") => Operation::Serialize,
        Some(other) => return Err(fail(ParseErrorKind::UnknownCommand(other.to_string()))),
        None => return Err(fail(ParseErrorKind::MissingArgument("command"))),
    };

    match tokens.next() {
        Some(extra) => Err(fail(ParseErrorKind::TrailingToken(extra.to_string()))),
        None => Ok(op),
    }
}

fn parse_field(token: Option<&str>) -> Result<Field, ParseErrorKind> {
    let token = token.ok_or(ParseErrorKind::MissingArgument("field index"))?;
    let index = token
        .parse::<usize>()
        .map_err(|_| ParseErrorKind::InvalidNumber {
            what: "field index",
            token: token.to_string(),
        })?;
    Field::try_from(index).map_err(ParseErrorKind::FieldOutOfRange)
}

/// Parses a whole descriptor text. Blank lines are ignored; any other line
/// that does not parse aborts the load.
pub fn parse_sequence(text: &str) -> Result<Vec<Operation>, ParseError> {
    parse_lines(text.lines())
}

/// Same as [`parse_sequence`] over pre-split lines.
pub fn parse_lines<I, S>(lines: I) -> Result<Vec<Operation>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .enumerate()
        .filter(|(_, line)| !line.as_ref().trim().is_empty())
        .map(|(idx, line)| parse_line(idx + 1, line.as_ref()))
        .collect()
}
