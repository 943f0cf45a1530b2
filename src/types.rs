use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// How a record is named in diagnostics: by its natural key when it has one,
/// otherwise by where it sat in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordRef {
    Id(String),
    Position(usize),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Id(id) => write!(f, "record {}", id),
            RecordRef::Position(pos) => write!(f, "record at position {}", pos),
        }
    }
}

/// One parsed source record - a flat mapping of named scalars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// 0-based index of this record in the payload
    pub position: usize,

    /// Field values exactly as parsed
    pub fields: Map<String, Value>,
}

impl FlatRecord {
    pub fn new(position: usize, fields: Map<String, Value>) -> Self {
        FlatRecord { position, fields }
    }

    /// Look up a field, treating JSON `null` the same as absence
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Name this record by its key field if it carries a usable one
    pub fn reference(&self, key_field: &str) -> RecordRef {
        match self.get(key_field) {
            Some(Value::String(s)) if !s.trim().is_empty() => RecordRef::Id(s.trim().to_string()),
            Some(Value::Number(n)) => RecordRef::Id(n.to_string()),
            _ => RecordRef::Position(self.position),
        }
    }
}

/// Caller-supplied classification tag stamped on every row of one call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mode(String);

impl Mode {
    /// The tag is kept verbatim. Blank tags are refused, as are control
    /// characters, which would escape the header comment line.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(Error::config("mode must not be blank"));
        }
        if tag.chars().any(char::is_control) {
            return Err(Error::config("mode must not contain control characters"));
        }
        Ok(Mode(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A destination-ready cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Text(String),
    /// Numeric literal in its source spelling, already validated
    Number(String),
}

/// Something about a row worth telling the caller that does not stop mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowWarning {
    MissingCoordinate { column: String },
    /// Present but not a decimal literal; rendered as NULL
    UnparseableCoordinate { column: String, value: String },
    CoordinateOutOfRange { column: String, value: f64, min: f64, max: f64 },
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowWarning::MissingCoordinate { column } => {
                write!(f, "{} is missing", column)
            }
            RowWarning::UnparseableCoordinate { column, value } => {
                write!(f, "{} = `{}` is not a decimal coordinate", column, value)
            }
            RowWarning::CoordinateOutOfRange { column, value, min, max } => {
                write!(f, "{} = {} is outside [{}, {}]", column, value, min, max)
            }
        }
    }
}

/// One record projected onto the destination columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRow {
    pub record: RecordRef,

    /// Values in mapping-table column order
    pub values: Vec<SqlValue>,

    pub warnings: Vec<RowWarning>,
}
