//! Layer-by-layer unwrapping of quoted, backslash-escaped JSON text

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Default number of layers peeled before giving up
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Hard ceiling on the configurable bound
const MAX_ALLOWED_DEPTH: usize = 64;

/// Options for a single normalization call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Maximum number of quote/escape layers to remove
    pub max_depth: usize,
}

impl NormalizeOptions {
    pub fn new(max_depth: usize) -> Result<Self> {
        if max_depth > MAX_ALLOWED_DEPTH {
            return Err(Error::config(format!(
                "max unwrap depth must be at most {}, got {}",
                MAX_ALLOWED_DEPTH, max_depth
            )));
        }
        Ok(NormalizeOptions { max_depth })
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Canonical JSON recovered from a raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The text that finally parsed
    pub json: String,

    /// Parsed form of `json`
    pub value: Value,

    /// Number of layers removed to get here
    pub depth: usize,
}

/// Peel quote/escape layers off `raw` until it parses as a JSON array or
/// object, or until `options.max_depth` layers have been removed.
///
/// # Example
/// ```rust
/// use crashsql::normalize::{normalize, NormalizeOptions};
///
/// let raw = r#""[{\"ColliRptNum\": \"3838031\"}]""#;
/// let normalized = normalize(raw, NormalizeOptions::default()).unwrap();
///
/// assert_eq!(normalized.depth, 1);
/// assert_eq!(normalized.json, r#"[{"ColliRptNum": "3838031"}]"#);
/// ```
pub fn normalize(raw: &str, options: NormalizeOptions) -> Result<Normalized> {
    let mut text = strip_noise(raw).to_string();
    let mut attempts = 0;
    let mut diagnostic;

    let mut depth = 0;
    loop {
        attempts += 1;

        if text.starts_with('[') || text.starts_with('{') {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => {
                    debug!(depth, bytes = text.len(), "payload normalized");
                    return Ok(Normalized {
                        json: text,
                        value,
                        depth,
                    });
                }
                Err(e) => diagnostic = e.to_string(),
            }
        } else if text.is_empty() {
            diagnostic = "payload is empty".to_string();
        } else {
            diagnostic = format!(
                "text starts with {:?}, expected '[' or '{{'",
                text.chars().next().unwrap_or_default()
            );
        }

        if depth == options.max_depth {
            diagnostic = format!("{}; unwrap bound of {} reached", diagnostic, options.max_depth);
            break;
        }

        match peel(&text) {
            Some(next) if next != text => text = next,
            _ => {
                diagnostic = format!("{}; no further layer to unwrap", diagnostic);
                break;
            }
        }
        depth += 1;
    }

    Err(Error::MalformedPayload {
        last_attempt: text,
        attempts,
        diagnostic,
    })
}

/// Remove exactly one layer of quoting and escaping
fn peel(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    // A well-formed JSON string literal is decoded exactly, escapes and all
    if text.starts_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(text) {
            return Some(strip_noise(&inner).to_string());
        }
    }

    let inner = strip_enclosing_quotes(text).unwrap_or(text);
    Some(strip_noise(&unescape_once(inner)).to_string())
}

fn strip_noise(text: &str) -> &str {
    text.trim().trim_start_matches('\u{feff}').trim()
}

fn strip_enclosing_quotes(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if first == last && (first == b'"' || first == b'\'') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Resolve one level of backslash escapes. Unknown sequences are kept as-is.
fn unescape_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
