//! Declarative source-to-destination mapping
//!
//! The destination schema is data, not code: each column rule names where
//! the value comes from and which normalization applies. Retargeting to a
//! different table is an edit to a [`MappingTable`], typically loaded from
//! TOML.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

static SQL_IDENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
});

/// Destination state for the single supported source (WSDOT)
pub const WASHINGTON: &str = "Washington";

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A named field of the source record
    Field(String),
    /// The same literal on every row
    Constant(String),
    /// The caller's classification tag
    Mode,
}

/// Normalization applied to a column's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Copy the scalar through unchanged
    #[default]
    Text,
    /// NULL when the trimmed value is exactly a single apostrophe
    PlaceholderNull,
    /// NULL when the trimmed value is empty
    BlankNull,
    /// Whole number, rendered bare
    Integer,
    /// Decimal degrees, rendered bare; missing or out-of-range values are
    /// flagged on the row but never abort mapping
    Coordinate { min: f64, max: f64 },
    /// `YYYY-MM-DD` prefix of a combined date-time value
    DatePrefix,
}

/// One destination column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column: String,
    pub source: Source,
    #[serde(default)]
    pub transform: Transform,
    /// A missing value is a field format error instead of NULL
    #[serde(default)]
    pub required: bool,
}

impl Transform {
    /// Whether a present value always maps to a non-NULL cell
    pub fn never_null(&self) -> bool {
        match self {
            Transform::Text | Transform::Integer | Transform::DatePrefix => true,
            Transform::PlaceholderNull | Transform::BlankNull | Transform::Coordinate { .. } => false,
        }
    }
}

impl ColumnRule {
    pub fn field(column: &str, field: &str, transform: Transform) -> Self {
        ColumnRule {
            column: column.to_string(),
            source: Source::Field(field.to_string()),
            transform,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Name used for this column's value in diagnostics
    pub fn field_name(&self) -> &str {
        match &self.source {
            Source::Field(name) => name,
            Source::Constant(_) | Source::Mode => &self.column,
        }
    }
}

/// The full destination shape: table, natural key and ordered columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    /// Plain or schema-qualified table name
    pub table: String,

    /// Natural-key column; the only conflict target
    pub key_column: String,

    pub columns: Vec<ColumnRule>,
}

impl MappingTable {
    /// The `crashdata` table fed from WSDOT collision records.
    ///
    /// No geometry column: the destination derives it from the coordinates.
    pub fn wsdot_crashdata() -> Self {
        let latitude = Transform::Coordinate { min: 45.5, max: 49.1 };
        let longitude = Transform::Coordinate { min: -124.9, max: -116.9 };

        MappingTable {
            table: "crashdata".to_string(),
            key_column: "ColliRptNum".to_string(),
            columns: vec![
                ColumnRule::field("ColliRptNum", "ColliRptNum", Transform::Text).required(),
                ColumnRule::field("Jurisdiction", "Jurisdiction", Transform::Text),
                ColumnRule {
                    column: "StateOrProvinceName".to_string(),
                    source: Source::Constant(WASHINGTON.to_string()),
                    transform: Transform::Text,
                    required: false,
                },
                ColumnRule::field("RegionName", "RegionName", Transform::PlaceholderNull),
                ColumnRule::field("CountyName", "CountyName", Transform::Text),
                ColumnRule::field("CityName", "CityName", Transform::PlaceholderNull),
                ColumnRule::field("FullDate", "FullDate", Transform::Text).required(),
                ColumnRule::field("CrashDate", "FullDate", Transform::DatePrefix).required(),
                ColumnRule::field("FullTime", "FullTime", Transform::Text),
                ColumnRule::field("MostSevereInjuryType", "MostSevereInjuryType", Transform::Text),
                ColumnRule::field("AgeGroup", "AgeGroup", Transform::BlankNull),
                ColumnRule::field("InvolvedPersons", "InvolvedPersons", Transform::Integer),
                ColumnRule::field("Latitude", "Latitude", latitude),
                ColumnRule::field("Longitude", "Longitude", longitude),
                ColumnRule {
                    column: "Mode".to_string(),
                    source: Source::Mode,
                    transform: Transform::Text,
                    required: false,
                },
            ],
        }
    }

    /// Parse and validate a mapping table from TOML
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: MappingTable = toml::from_str(text)
            .map_err(|e| Error::config(format!("invalid mapping table: {}", e)))?;
        table.validate()?;
        Ok(table)
    }

    /// Check the table is renderable before any record is touched
    pub fn validate(&self) -> Result<()> {
        if !SQL_IDENT_REGEX.is_match(&self.table) {
            return Err(Error::config(format!(
                "table name `{}` must be a plain or schema-qualified identifier",
                self.table
            )));
        }

        if self.columns.is_empty() {
            return Err(Error::config("mapping table has no columns"));
        }

        let mut seen = HashSet::new();
        for rule in &self.columns {
            if rule.column.is_empty() || rule.column.contains('\0') {
                return Err(Error::config("column names must be non-empty and free of NUL"));
            }
            if !seen.insert(rule.column.as_str()) {
                return Err(Error::config(format!("column `{}` is mapped twice", rule.column)));
            }
            if let Transform::Coordinate { min, max } = rule.transform {
                if !(min.is_finite() && max.is_finite() && min <= max) {
                    return Err(Error::config(format!(
                        "column `{}` has an invalid coordinate range [{}, {}]",
                        rule.column, min, max
                    )));
                }
            }
        }

        // A NULL natural key never conflicts, so re-applying would duplicate rows
        let rule = self.key_rule().ok_or_else(|| {
            Error::config(format!(
                "key column `{}` is not one of the mapped columns",
                self.key_column
            ))
        })?;
        if !matches!(rule.source, Source::Field(_)) {
            return Err(Error::config(format!(
                "key column `{}` must be fed by a record field",
                self.key_column
            )));
        }
        if !rule.required {
            return Err(Error::config(format!(
                "key column `{}` must be marked required",
                self.key_column
            )));
        }
        if !rule.transform.never_null() {
            return Err(Error::config(format!(
                "key column `{}` uses a transform that can produce NULL",
                self.key_column
            )));
        }
        Ok(())
    }

    pub fn key_rule(&self) -> Option<&ColumnRule> {
        self.columns.iter().find(|rule| rule.column == self.key_column)
    }

    /// Record field holding the natural key
    pub fn key_field(&self) -> Option<&str> {
        match self.key_rule().map(|rule| &rule.source) {
            Some(Source::Field(name)) => Some(name),
            _ => None,
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|rule| rule.column.as_str())
    }

    /// Distinct record fields the table reads, in column order
    pub fn source_fields(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.columns
            .iter()
            .filter_map(|rule| match &rule.source {
                Source::Field(name) => Some(name.as_str()),
                _ => None,
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::wsdot_crashdata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_column_order() {
        let table = MappingTable::default();
        table.validate().unwrap();

        let columns: Vec<_> = table.column_names().collect();
        assert_eq!(
            columns,
            vec![
                "ColliRptNum",
                "Jurisdiction",
                "StateOrProvinceName",
                "RegionName",
                "CountyName",
                "CityName",
                "FullDate",
                "CrashDate",
                "FullTime",
                "MostSevereInjuryType",
                "AgeGroup",
                "InvolvedPersons",
                "Latitude",
                "Longitude",
                "Mode",
            ]
        );
        assert!(!columns.iter().any(|c| c.eq_ignore_ascii_case("geom")));
    }

    #[test]
    fn test_source_fields_are_distinct() {
        let table = MappingTable::default();
        let fields = table.source_fields();
        assert_eq!(fields.len(), 12);
        assert_eq!(fields.iter().filter(|f| **f == "FullDate").count(), 1);
        assert_eq!(table.key_field(), Some("ColliRptNum"));
    }

    #[test]
    fn test_shipped_toml_matches_builtin_table() {
        let text = include_str!("../../demos/wsdot_crashdata.toml");
        let table = MappingTable::from_toml_str(text).unwrap();
        assert_eq!(table, MappingTable::wsdot_crashdata());
    }

    #[test]
    fn test_toml_rule_shapes() {
        let table = MappingTable::from_toml_str(
            r#"
            table = "public.crashes"
            key_column = "report_id"

            [[columns]]
            column = "report_id"
            source = { field = "ColliRptNum" }
            required = true

            [[columns]]
            column = "lat"
            source = { field = "Latitude" }
            transform = { coordinate = { min = -90.0, max = 90.0 } }

            [[columns]]
            column = "kind"
            source = "mode"
            "#,
        )
        .unwrap();

        assert_eq!(table.columns[0].transform, Transform::Text);
        assert!(table.columns[0].required);
        assert_eq!(table.columns[1].transform, Transform::Coordinate { min: -90.0, max: 90.0 });
        assert_eq!(table.columns[2].source, Source::Mode);
    }

    #[test]
    fn test_rejects_unknown_key_column() {
        let mut table = MappingTable::default();
        table.key_column = "Nope".to_string();
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("`Nope` is not one of the mapped columns"));
    }

    #[test]
    fn test_rejects_constant_key_column() {
        let mut table = MappingTable::default();
        table.key_column = "StateOrProvinceName".to_string();
        assert!(matches!(table.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_key_that_can_be_null() {
        let toml = |required: bool, transform: &str| {
            format!(
                r#"
                table = "crashes"
                key_column = "id"

                [[columns]]
                column = "id"
                source = {{ field = "ColliRptNum" }}
                transform = "{}"
                required = {}

                [[columns]]
                column = "mode"
                source = "mode"
                "#,
                transform, required
            )
        };

        let err = MappingTable::from_toml_str(&toml(true, "placeholder_null")).unwrap_err();
        assert!(err.to_string().contains("can produce NULL"));
        assert!(MappingTable::from_toml_str(&toml(true, "blank_null")).is_err());

        let err = MappingTable::from_toml_str(&toml(false, "text")).unwrap_err();
        assert!(err.to_string().contains("must be marked required"));

        assert!(MappingTable::from_toml_str(&toml(true, "text")).is_ok());
        assert!(MappingTable::from_toml_str(&toml(true, "integer")).is_ok());
    }

    #[test]
    fn test_rejects_duplicate_columns_and_bad_table_names() {
        let mut table = MappingTable::default();
        table.columns.push(ColumnRule::field("Mode", "Other", Transform::Text));
        assert!(table.validate().unwrap_err().to_string().contains("mapped twice"));

        let mut table = MappingTable::default();
        table.table = "crashdata; DROP TABLE x".to_string();
        assert!(matches!(table.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = MappingTable::from_toml_str("table = ").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
