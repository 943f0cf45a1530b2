//! Streaming field profiler
//!
//! Accumulates per-field statistics record by record and builds the final
//! [`PayloadProfile`] once at the end, so a large payload is walked a single
//! time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::mapping::MappingTable;
use crate::types::FlatRecord;

static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?(Z|[+-][0-9]{2}:[0-9]{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

// Both "17:42:00" and the upstream "5:42 PM" spelling
static TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,2}:[0-9]{2}(:[0-9]{2})?( ?[AaPp][Mm])?)$").unwrap()
});

static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").unwrap());

static DECIMAL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").unwrap());

/// Type identifier for JSON values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    JsonType::Integer
                } else {
                    JsonType::Number
                }
            }
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    fn to_str(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }
}

#[derive(Debug, Default)]
struct FieldStats {
    present: usize,
    type_counts: BTreeMap<JsonType, usize>,
    string_count: usize,
    format_counts: BTreeMap<&'static str, usize>,
}

impl FieldStats {
    fn add_value(&mut self, value: &Value) {
        self.present += 1;
        *self.type_counts.entry(JsonType::from_value(value)).or_insert(0) += 1;

        if let Value::String(s) = value {
            self.string_count += 1;
            if let Some(format) = detect_format(s) {
                *self.format_counts.entry(format).or_insert(0) += 1;
            }
        }
    }

    fn build(self) -> FieldProfile {
        // A format is only reported when every string agreed on it
        let format = match self.format_counts.iter().next() {
            Some((format, count)) if self.format_counts.len() == 1 && *count == self.string_count => {
                Some(format.to_string())
            }
            _ => None,
        };

        FieldProfile {
            present: self.present,
            nulls: self.type_counts.get(&JsonType::Null).copied().unwrap_or(0),
            types: self.type_counts.keys().map(|t| t.to_str()).collect(),
            format,
            formats: self
                .format_counts
                .into_iter()
                .map(|(format, count)| (format.to_string(), count))
                .collect(),
        }
    }
}

/// What one field looked like across the payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProfile {
    /// Records carrying the key at all, `null` included
    pub present: usize,
    pub nulls: usize,
    /// JSON types seen, in a fixed order
    pub types: Vec<&'static str>,
    /// Format shared by every string value, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub formats: BTreeMap<String, usize>,
}

/// Field statistics for a whole payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadProfile {
    pub record_count: usize,
    pub fields: BTreeMap<String, FieldProfile>,
}

impl PayloadProfile {
    /// Fields the table reads that some records do not carry at all
    pub fn missing_fields<'t>(&self, table: &'t MappingTable) -> Vec<&'t str> {
        table
            .source_fields()
            .into_iter()
            .filter(|field| {
                let present = self.fields.get(*field).map_or(0, |f| f.present);
                present < self.record_count
            })
            .collect()
    }
}

/// Accumulates statistics about records
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    record_count: usize,
    fields: BTreeMap<String, FieldStats>,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, record: &FlatRecord) {
        self.record_count += 1;
        for (key, value) in record.fields.iter() {
            self.fields.entry(key.clone()).or_default().add_value(value);
        }
    }

    pub fn build(self) -> PayloadProfile {
        PayloadProfile {
            record_count: self.record_count,
            fields: self
                .fields
                .into_iter()
                .map(|(key, stats)| (key, stats.build()))
                .collect(),
        }
    }
}

/// Profile a record set in one pass
pub fn profile_records(records: &[FlatRecord]) -> PayloadProfile {
    let mut builder = ProfileBuilder::new();
    for record in records {
        builder.add_record(record);
    }
    builder.build()
}

/// Classify a string value by shape
fn detect_format(value: &str) -> Option<&'static str> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Some("blank");
    }
    if trimmed == "'" {
        return Some("placeholder");
    }

    let bytes = trimmed.as_bytes();
    let len = bytes.len();

    if len == 10 && bytes[4] == b'-' && bytes[7] == b'-' && ISO_DATE_REGEX.is_match(trimmed) {
        return Some("date");
    }

    if len >= 19 && bytes[10] == b'T' && ISO_DATETIME_REGEX.is_match(trimmed) {
        return Some("date-time");
    }

    if trimmed.contains(':') && TIME_REGEX.is_match(trimmed) {
        return Some("time");
    }

    if INTEGER_REGEX.is_match(trimmed) {
        return Some("integer");
    }

    if DECIMAL_REGEX.is_match(trimmed) {
        return Some("decimal");
    }

    None
}
