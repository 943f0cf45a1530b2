//! Splitting normalized JSON into flat records

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::normalize::unwrap::{normalize, NormalizeOptions, Normalized};
use crate::types::FlatRecord;

impl Normalized {
    /// Turn the parsed payload into records, in payload order.
    ///
    /// A top-level array yields one record per element; a lone object is a
    /// single record. Anything that is not an object is rejected.
    pub fn into_records(self) -> Result<Vec<FlatRecord>> {
        let Normalized { json, value, depth } = self;

        let elements = match value {
            Value::Array(arr) => arr,
            obj @ Value::Object(_) => vec![obj],
            other => {
                return Err(Error::MalformedPayload {
                    diagnostic: format!("top-level {} is not a record array", type_name(&other)),
                    attempts: depth + 1,
                    last_attempt: json,
                })
            }
        };

        let mut records = Vec::with_capacity(elements.len());
        for (position, element) in elements.into_iter().enumerate() {
            match element {
                Value::Object(fields) => records.push(FlatRecord::new(position, fields)),
                other => {
                    return Err(Error::MalformedPayload {
                        diagnostic: format!(
                            "element {} is {}, expected an object",
                            position,
                            type_name(&other)
                        ),
                        attempts: depth + 1,
                        last_attempt: json,
                    })
                }
            }
        }

        debug!(count = records.len(), "records extracted");
        Ok(records)
    }
}

/// Normalize a raw payload and return its records
pub fn parse_records(raw: &str, options: NormalizeOptions) -> Result<Vec<FlatRecord>> {
    normalize(raw, options)?.into_records()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
