//! SQL rendering - batched, idempotent INSERT statements
//!
//! Rows are split into consecutive batches of at most the configured size,
//! in input order. Every batch becomes one self-contained INSERT ending in a
//! conflict-skip clause on the natural key, so any statement can be re-run
//! on its own after a partial failure.

pub mod batch;
pub mod writer;

use chrono::NaiveDate;
use std::fmt;
use tracing::info;

use crate::error::Result;
use crate::mapping::MappingTable;
use crate::types::{MappedRow, Mode};

pub use batch::{BatchSize, Statements, DEFAULT_BATCH_SIZE};
pub use writer::{quote_identifier, quote_literal, render_header, render_statement, render_value};

/// Renders mapped rows for one destination table
pub struct Renderer<'a> {
    table: &'a MappingTable,
    batch_size: BatchSize,
}

impl<'a> Renderer<'a> {
    pub fn new(table: &'a MappingTable, batch_size: BatchSize) -> Result<Self> {
        table.validate()?;
        Ok(Renderer { table, batch_size })
    }

    /// Per-batch statements, rendered on demand
    pub fn statements<'r>(&self, rows: &'r [MappedRow]) -> Statements<'r>
    where
        'a: 'r,
    {
        Statements::new(self.table, rows, self.batch_size)
    }

    /// Render the full document. An empty row set gives a header-only
    /// document.
    pub fn render(&self, rows: &[MappedRow], mode: &Mode, generated_on: NaiveDate) -> SqlDocument {
        let statements: Vec<String> = self.statements(rows).collect();
        info!(
            records = rows.len(),
            statements = statements.len(),
            batch_size = self.batch_size.get(),
            "rendered SQL document"
        );

        SqlDocument {
            header: render_header(mode, generated_on, rows.len()),
            statements,
        }
    }
}

/// Header block plus one statement per batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlDocument {
    pub header: String,
    pub statements: Vec<String>,
}

impl fmt::Display for SqlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;
        f.write_str("\n")?;
        for (idx, statement) in self.statements.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n\n")?;
            }
            f.write_str(statement)?;
        }
        if !self.statements.is_empty() {
            f.write_str("\n")?;
        }
        Ok(())
    }
}
