//! Field mapping - project flat records onto the destination columns
//!
//! [`MappingTable`] holds the policy (which field feeds which column, and how
//! it is normalized); [`FieldMapper`] applies it to records for one call.

pub mod mapper;
pub mod table;

pub use mapper::FieldMapper;
pub use table::{ColumnRule, MappingTable, Source, Transform, WASHINGTON};
