//! Payload normalization - recover JSON records from multiply-escaped text
//!
//! Upstream services hand back the record array serialized as a JSON string,
//! sometimes several times over. The number of layers varies by source and
//! over time, so it is discovered by parsing rather than assumed.

pub mod records;
pub mod unwrap;

pub use records::parse_records;
pub use unwrap::{normalize, NormalizeOptions, Normalized, DEFAULT_MAX_DEPTH};
