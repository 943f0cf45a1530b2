//! # crashsql - collision payloads to idempotent SQL
//!
//! Turns the JSON that collision-data services return (often serialized as a
//! JSON string several times over) into batched `INSERT ... ON CONFLICT DO
//! NOTHING` statements that are safe to apply more than once.
//!
//! ## Modules
//!
//! - **normalize**: unwrap multiply-escaped payload text into flat records
//! - **mapping**: project records onto destination columns via a declarative table
//! - **render**: batch mapped rows into SQL statements under a header block
//! - **profile**: summarize which fields a payload carries and their shapes
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use crashsql::{generate_sql, GenerateRequest};
//!
//! # fn main() -> crashsql::Result<()> {
//! let raw = r#""[{\"ColliRptNum\": \"3838031\", \"FullDate\": \"2025-02-21T00:00:00\", \"CityName\": \"O'Brien\"}]""#;
//!
//! let request = GenerateRequest::new("Pedestrian", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
//! let sql = generate_sql(raw, &request)?;
//!
//! assert!(sql.starts_with("-- Mode: Pedestrian\n-- Generated: 2025-03-01\n-- Records: 1\n\n"));
//! assert!(sql.contains("'2025-02-21'"));
//! assert!(sql.contains("'O''Brien'"));
//! assert!(sql.contains("ON CONFLICT (\"ColliRptNum\") DO NOTHING;"));
//! # Ok(())
//! # }
//! ```

use chrono::NaiveDate;
use tracing::{info, warn};

pub mod error;
pub mod mapping;
pub mod normalize;
pub mod profile;
pub mod render;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Error, ErrorReport, Result};
pub use mapping::{FieldMapper, MappingTable};
pub use normalize::{normalize, parse_records, NormalizeOptions};
pub use profile::{profile_records, PayloadProfile};
pub use render::{BatchSize, Renderer, SqlDocument};
pub use types::{FlatRecord, MappedRow, Mode, RecordRef, RowWarning, SqlValue};

/// Everything one generation call depends on, passed explicitly
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Classification tag stamped on every row
    pub mode: String,

    /// Rows per statement, as supplied by the caller
    pub batch_size: i64,

    /// Date written into the header
    pub generated_on: NaiveDate,

    /// Bound on quote/escape layers the normalizer will remove
    pub max_unwrap_depth: usize,

    pub table: MappingTable,
}

impl GenerateRequest {
    /// A request for the built-in WSDOT table with default batch size and
    /// unwrap bound
    pub fn new(mode: impl Into<String>, generated_on: NaiveDate) -> Self {
        GenerateRequest {
            mode: mode.into(),
            batch_size: render::DEFAULT_BATCH_SIZE as i64,
            generated_on,
            max_unwrap_depth: normalize::DEFAULT_MAX_DEPTH,
            table: MappingTable::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_unwrap_depth(mut self, depth: usize) -> Self {
        self.max_unwrap_depth = depth;
        self
    }

    pub fn with_table(mut self, table: MappingTable) -> Self {
        self.table = table;
        self
    }
}

/// Result of a successful generation call
#[derive(Debug, Clone)]
pub struct Generation {
    pub document: SqlDocument,

    /// Layers the normalizer removed
    pub unwrap_depth: usize,

    /// Row-level flags that did not stop generation
    pub warnings: Vec<(RecordRef, RowWarning)>,

    /// Mapped source fields some records lacked entirely
    pub missing_fields: Vec<String>,
}

/// Normalize, map and render one payload.
///
/// Caller parameters are validated before the payload is looked at. Any
/// failure aborts the call; there is no partial document.
pub fn generate(raw: &str, request: &GenerateRequest) -> Result<Generation> {
    let mode = Mode::new(request.mode.clone())?;
    let batch_size = BatchSize::new(request.batch_size)?;
    let options = NormalizeOptions::new(request.max_unwrap_depth)?;
    let renderer = Renderer::new(&request.table, batch_size)?;

    let normalized = normalize(raw, options)?;
    let unwrap_depth = normalized.depth;
    let records = normalized.into_records()?;

    let missing_fields: Vec<String> = profile_records(&records)
        .missing_fields(&request.table)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !missing_fields.is_empty() {
        warn!(fields = ?missing_fields, "some records lack mapped fields");
    }

    let rows = FieldMapper::new(&request.table, &mode).map_all(&records)?;
    let document = renderer.render(&rows, &mode, request.generated_on);

    let warnings = rows
        .iter()
        .flat_map(|row| row.warnings.iter().map(|w| (row.record.clone(), w.clone())))
        .collect();

    info!(mode = %mode, records = rows.len(), unwrap_depth, "generation complete");

    Ok(Generation {
        document,
        unwrap_depth,
        warnings,
        missing_fields,
    })
}

/// Normalize, map and render one payload into SQL text
pub fn generate_sql(raw: &str, request: &GenerateRequest) -> Result<String> {
    Ok(generate(raw, request)?.document.to_string())
}
