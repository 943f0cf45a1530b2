//! Batch sizing and order-preserving partitioning

use std::num::NonZeroUsize;
use std::slice::Chunks;

use crate::error::{Error, Result};
use crate::mapping::MappingTable;
use crate::render::writer::render_statement;
use crate::types::MappedRow;

/// Rows per INSERT statement unless the caller says otherwise
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// A validated, strictly positive number of rows per statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    /// Accepts the caller's raw integer so that zero and negative sizes are
    /// reported as configuration errors rather than lost in a conversion.
    pub fn new(size: i64) -> Result<Self> {
        usize::try_from(size)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(BatchSize)
            .ok_or_else(|| Error::config(format!("batch size must be positive, got {}", size)))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        BatchSize(NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

impl TryFrom<i64> for BatchSize {
    type Error = Error;

    fn try_from(size: i64) -> Result<Self> {
        BatchSize::new(size)
    }
}

/// Lazily rendered INSERT statements, one per consecutive batch of rows.
///
/// Each clone walks the remaining batches independently, so a consumer can
/// replay from any point without holding the whole document in memory.
#[derive(Clone)]
pub struct Statements<'a> {
    table: &'a MappingTable,
    chunks: Chunks<'a, MappedRow>,
}

impl<'a> Statements<'a> {
    pub(crate) fn new(table: &'a MappingTable, rows: &'a [MappedRow], size: BatchSize) -> Self {
        Statements {
            table,
            chunks: rows.chunks(size.get()),
        }
    }
}

impl<'a> Iterator for Statements<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.chunks.next().map(|batch| render_statement(self.table, batch))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Statements<'_> {}
