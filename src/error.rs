use serde::Serialize;
use thiserror::Error;

use crate::types::RecordRef;

/// Longest slice of the last unwrap attempt carried into a user-facing report
const PREVIEW_CHARS: usize = 200;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a single generation call can fail.
///
/// All variants are terminal for the call: nothing is retried and no partial
/// document is produced.
#[derive(Error, Debug)]
pub enum Error {
    /// No unwrap depth within the bound produced parseable JSON, or the JSON
    /// was not an array of record objects.
    #[error("malformed payload after {attempts} unwrap attempt(s): {diagnostic}")]
    MalformedPayload {
        last_attempt: String,
        attempts: usize,
        diagnostic: String,
    },

    #[error("{record}: field `{field}` {reason}")]
    FieldFormat {
        record: RecordRef,
        field: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub(crate) fn field(record: &RecordRef, field: &str, reason: impl Into<String>) -> Self {
        Error::FieldFormat {
            record: record.clone(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Stable machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedPayload { .. } => "malformed_payload",
            Error::FieldFormat { .. } => "field_format",
            Error::Configuration(_) => "configuration",
        }
    }

    /// Build the structured report the boundary hands to users.
    pub fn report(&self) -> ErrorReport {
        let (record, field, preview) = match self {
            Error::MalformedPayload { last_attempt, .. } => {
                (None, None, Some(preview(last_attempt)))
            }
            Error::FieldFormat { record, field, .. } => {
                (Some(record.to_string()), Some(field.clone()), None)
            }
            Error::Configuration(_) => (None, None, None),
        };

        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            record,
            field,
            preview,
        }
    }
}

/// User-facing description of a failure, free of internal traces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
