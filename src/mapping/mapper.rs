//! Applying a mapping table to flat records

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::mapping::table::{ColumnRule, MappingTable, Source, Transform};
use crate::types::{FlatRecord, MappedRow, Mode, RecordRef, RowWarning, SqlValue};

// ASCII digits only: `\d` would also admit full-width and other Unicode digits
static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").unwrap());

static DECIMAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

/// The single apostrophe upstream uses for "no value"
const PLACEHOLDER: &str = "'";

/// Maps records onto a table's columns for one call, stamping one Mode
pub struct FieldMapper<'a> {
    table: &'a MappingTable,
    mode: &'a Mode,
}

impl<'a> FieldMapper<'a> {
    pub fn new(table: &'a MappingTable, mode: &'a Mode) -> Self {
        FieldMapper { table, mode }
    }

    /// Map every record, in order. The first failure aborts the whole call.
    pub fn map_all(&self, records: &[FlatRecord]) -> Result<Vec<MappedRow>> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let row = self.map_record(record)?;
            for warning in &row.warnings {
                warn!(record = %row.record, "{}", warning);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Map one record onto the table's columns
    pub fn map_record(&self, record: &FlatRecord) -> Result<MappedRow> {
        let reference = match self.table.key_field() {
            Some(key) => record.reference(key),
            None => RecordRef::Position(record.position),
        };

        let mut warnings = Vec::new();
        let values = self
            .table
            .columns
            .iter()
            .map(|rule| self.map_column(rule, record, &reference, &mut warnings))
            .collect::<Result<Vec<_>>>()?;

        Ok(MappedRow {
            record: reference,
            values,
            warnings,
        })
    }

    fn map_column(
        &self,
        rule: &ColumnRule,
        record: &FlatRecord,
        reference: &RecordRef,
        warnings: &mut Vec<RowWarning>,
    ) -> Result<SqlValue> {
        let constant;
        let value = match &rule.source {
            Source::Field(name) => record.get(name),
            Source::Constant(text) => {
                constant = Value::String(text.clone());
                Some(&constant)
            }
            // Verbatim on every row; never touched by a transform
            Source::Mode => return Ok(SqlValue::Text(self.mode.as_str().to_string())),
        };

        let field = rule.field_name();
        let Some(value) = value else {
            if rule.required {
                return Err(Error::field(reference, field, "is missing"));
            }
            if matches!(rule.transform, Transform::Coordinate { .. }) {
                warnings.push(RowWarning::MissingCoordinate {
                    column: rule.column.clone(),
                });
            }
            return Ok(SqlValue::Null);
        };

        match &rule.transform {
            Transform::Text => Ok(SqlValue::Text(scalar_text(value, reference, field)?)),
            Transform::PlaceholderNull => {
                let text = scalar_text(value, reference, field)?;
                if text.trim() == PLACEHOLDER {
                    Ok(SqlValue::Null)
                } else {
                    Ok(SqlValue::Text(text))
                }
            }
            Transform::BlankNull => {
                let text = scalar_text(value, reference, field)?;
                if text.trim().is_empty() {
                    Ok(SqlValue::Null)
                } else {
                    Ok(SqlValue::Text(text))
                }
            }
            Transform::Integer => integer_literal(value, reference, field),
            Transform::Coordinate { min, max } => {
                let literal = match coordinate_literal(value, reference, field)? {
                    Coordinate::Literal(literal) => literal,
                    Coordinate::Blank => {
                        warnings.push(RowWarning::MissingCoordinate {
                            column: rule.column.clone(),
                        });
                        return Ok(SqlValue::Null);
                    }
                    Coordinate::Unparseable(text) => {
                        warnings.push(RowWarning::UnparseableCoordinate {
                            column: rule.column.clone(),
                            value: text,
                        });
                        return Ok(SqlValue::Null);
                    }
                };

                let parsed: f64 = literal.parse().unwrap_or(f64::NAN);
                if !(parsed >= *min && parsed <= *max) {
                    warnings.push(RowWarning::CoordinateOutOfRange {
                        column: rule.column.clone(),
                        value: parsed,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(SqlValue::Number(literal))
            }
            Transform::DatePrefix => {
                let text = scalar_text(value, reference, field)?;
                date_prefix(&text)
                    .map(SqlValue::Text)
                    .ok_or_else(|| {
                        Error::field(
                            reference,
                            field,
                            format!("value `{}` does not start with a YYYY-MM-DD calendar date", text),
                        )
                    })
            }
        }
    }
}

/// Text of a scalar; nested values have no column representation
fn scalar_text(value: &Value, reference: &RecordRef, field: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => {
            Err(Error::field(reference, field, "holds a nested value, expected a scalar"))
        }
    }
}

fn integer_literal(value: &Value, reference: &RecordRef, field: &str) -> Result<SqlValue> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };

    if INTEGER_REGEX.is_match(&text) {
        Ok(SqlValue::Number(text))
    } else {
        Err(Error::field(
            reference,
            field,
            format!("expected a whole number, found {}", value),
        ))
    }
}

enum Coordinate {
    Literal(String),
    Blank,
    Unparseable(String),
}

/// Classify a coordinate value. Only non-scalars are errors; text that is not
/// a decimal literal is left for the caller to flag.
fn coordinate_literal(value: &Value, reference: &RecordRef, field: &str) -> Result<Coordinate> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(Coordinate::Blank),
        Value::String(s) => s.trim().to_string(),
        Value::Null => return Ok(Coordinate::Blank),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            return Err(Error::field(
                reference,
                field,
                format!("expected decimal degrees, found {}", value),
            ))
        }
    };

    if DECIMAL_REGEX.is_match(&text) {
        Ok(Coordinate::Literal(text))
    } else {
        Ok(Coordinate::Unparseable(text))
    }
}

/// Calendar-date prefix of a combined date-time, with no timezone handling
fn date_prefix(text: &str) -> Option<String> {
    let prefix: String = text.chars().take(10).collect();
    if !ISO_DATE_REGEX.is_match(&prefix) {
        return None;
    }
    NaiveDate::parse_from_str(&prefix, "%Y-%m-%d").ok()?;
    Some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(position: usize, value: Value) -> FlatRecord {
        FlatRecord::new(position, serde_json::from_value(value).unwrap())
    }

    fn sample(overrides: Value) -> FlatRecord {
        let mut base = json!({
            "ColliRptNum": "3838031",
            "Jurisdiction": "City Street",
            "RegionName": "Northwest",
            "CountyName": "King",
            "CityName": "Seattle",
            "FullDate": "2025-02-21T00:00:00",
            "FullTime": "5:42 PM",
            "MostSevereInjuryType": "Suspected Minor Injury",
            "AgeGroup": "25-34",
            "InvolvedPersons": 2,
            "Latitude": 47.6062,
            "Longitude": -122.3321,
            "CrashStatePlaneX": 1270000.5
        });
        for (key, value) in overrides.as_object().unwrap() {
            base[key] = value.clone();
        }
        record(0, base)
    }

    fn map(record: &FlatRecord) -> Result<MappedRow> {
        let table = MappingTable::default();
        let mode = Mode::new("Pedestrian").unwrap();
        FieldMapper::new(&table, &mode).map_record(record)
    }

    fn column<'r>(row: &'r MappedRow, name: &str) -> &'r SqlValue {
        let table = MappingTable::default();
        let idx = table.column_names().position(|c| c == name).unwrap();
        &row.values[idx]
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_full_record_maps_in_column_order() {
        let row = map(&sample(json!({}))).unwrap();

        assert_eq!(row.record, RecordRef::Id("3838031".into()));
        assert_eq!(
            row.values,
            vec![
                text("3838031"),
                text("City Street"),
                text("Washington"),
                text("Northwest"),
                text("King"),
                text("Seattle"),
                text("2025-02-21T00:00:00"),
                text("2025-02-21"),
                text("5:42 PM"),
                text("Suspected Minor Injury"),
                text("25-34"),
                SqlValue::Number("2".into()),
                SqlValue::Number("47.6062".into()),
                SqlValue::Number("-122.3321".into()),
                text("Pedestrian"),
            ]
        );
        assert!(row.warnings.is_empty());
    }

    #[test]
    fn test_placeholder_region_and_city_become_null() {
        let row = map(&sample(json!({"RegionName": "'", "CityName": " ' "}))).unwrap();
        assert_eq!(column(&row, "RegionName"), &SqlValue::Null);
        assert_eq!(column(&row, "CityName"), &SqlValue::Null);
    }

    #[test]
    fn test_placeholder_rule_only_matches_lone_apostrophe() {
        let row = map(&sample(json!({"CityName": "O'Brien", "RegionName": "''"}))).unwrap();
        assert_eq!(column(&row, "CityName"), &text("O'Brien"));
        assert_eq!(column(&row, "RegionName"), &text("''"));
    }

    #[test]
    fn test_blank_age_group_becomes_null() {
        let row = map(&sample(json!({"AgeGroup": ""}))).unwrap();
        assert_eq!(column(&row, "AgeGroup"), &SqlValue::Null);

        let row = map(&sample(json!({"AgeGroup": "   "}))).unwrap();
        assert_eq!(column(&row, "AgeGroup"), &SqlValue::Null);
    }

    #[test]
    fn test_blank_rule_does_not_touch_other_columns() {
        let row = map(&sample(json!({"CountyName": ""}))).unwrap();
        assert_eq!(column(&row, "CountyName"), &text(""));
    }

    #[test]
    fn test_date_prefix_has_no_timezone_adjustment() {
        let row = map(&sample(json!({"FullDate": "2025-12-31T23:59:59-08:00"}))).unwrap();
        assert_eq!(column(&row, "CrashDate"), &text("2025-12-31"));
        assert_eq!(column(&row, "FullDate"), &text("2025-12-31T23:59:59-08:00"));
    }

    #[test]
    fn test_invalid_calendar_date_names_record_and_field() {
        let err = map(&sample(json!({"FullDate": "2025-02-30T00:00:00"}))).unwrap_err();
        match err {
            Error::FieldFormat { record, field, .. } => {
                assert_eq!(record, RecordRef::Id("3838031".into()));
                assert_eq!(field, "FullDate");
            }
            other => panic!("Expected FieldFormat, got: {:?}", other),
        }

        assert!(map(&sample(json!({"FullDate": "02/21/2025"}))).is_err());
    }

    #[test]
    fn test_missing_identifier_is_named_by_position() {
        let mut rec = sample(json!({}));
        rec.fields.remove("ColliRptNum");
        rec.position = 7;

        let err = map(&rec).unwrap_err();
        assert_eq!(err.to_string(), "record at position 7: field `ColliRptNum` is missing");
    }

    #[test]
    fn test_missing_optional_fields_become_null() {
        let mut rec = sample(json!({"FullTime": null}));
        rec.fields.remove("MostSevereInjuryType");

        let row = map(&rec).unwrap();
        assert_eq!(column(&row, "FullTime"), &SqlValue::Null);
        assert_eq!(column(&row, "MostSevereInjuryType"), &SqlValue::Null);
    }

    #[test]
    fn test_numeric_identifier_is_text() {
        let row = map(&sample(json!({"ColliRptNum": 3838031}))).unwrap();
        assert_eq!(column(&row, "ColliRptNum"), &text("3838031"));
    }

    #[test]
    fn test_involved_persons_accepts_digit_strings_only() {
        let row = map(&sample(json!({"InvolvedPersons": " 3 "}))).unwrap();
        assert_eq!(column(&row, "InvolvedPersons"), &SqlValue::Number("3".into()));

        let err = map(&sample(json!({"InvolvedPersons": "two"}))).unwrap_err();
        assert!(err.to_string().contains("`InvolvedPersons` expected a whole number"));

        assert!(map(&sample(json!({"InvolvedPersons": 2.5}))).is_err());
    }

    #[test]
    fn test_coordinates_keep_source_precision() {
        let rec = crate::normalize::parse_records(
            r#"[{"ColliRptNum": "P1", "FullDate": "2025-01-01T00:00:00", "Latitude": 47.606209999999990, "Longitude": "-122.33207"}]"#,
            Default::default(),
        )
        .unwrap();

        let row = map(&rec[0]).unwrap();
        assert_eq!(column(&row, "Latitude"), &SqlValue::Number("47.606209999999990".into()));
        assert_eq!(column(&row, "Longitude"), &SqlValue::Number("-122.33207".into()));
    }

    #[test]
    fn test_missing_coordinates_are_flagged_not_fatal() {
        let mut rec = sample(json!({"Longitude": ""}));
        rec.fields.remove("Latitude");

        let row = map(&rec).unwrap();
        assert_eq!(column(&row, "Latitude"), &SqlValue::Null);
        assert_eq!(column(&row, "Longitude"), &SqlValue::Null);
        assert_eq!(
            row.warnings,
            vec![
                RowWarning::MissingCoordinate { column: "Latitude".into() },
                RowWarning::MissingCoordinate { column: "Longitude".into() },
            ]
        );
    }

    #[test]
    fn test_out_of_range_coordinates_are_flagged_and_rendered() {
        let row = map(&sample(json!({"Latitude": 0.0, "Longitude": -122.3321}))).unwrap();
        assert_eq!(column(&row, "Latitude"), &SqlValue::Number("0.0".into()));
        assert_eq!(row.warnings.len(), 1);
        assert!(matches!(
            &row.warnings[0],
            RowWarning::CoordinateOutOfRange { column, .. } if column == "Latitude"
        ));
    }

    #[test]
    fn test_non_numeric_coordinate_is_flagged_and_null() {
        let row = map(&sample(json!({"Latitude": "47.6; DROP TABLE crashdata", "Longitude": "N/A"}))).unwrap();
        assert_eq!(column(&row, "Latitude"), &SqlValue::Null);
        assert_eq!(column(&row, "Longitude"), &SqlValue::Null);
        assert_eq!(
            row.warnings,
            vec![
                RowWarning::UnparseableCoordinate {
                    column: "Latitude".into(),
                    value: "47.6; DROP TABLE crashdata".into()
                },
                RowWarning::UnparseableCoordinate { column: "Longitude".into(), value: "N/A".into() },
            ]
        );

        let err = map(&sample(json!({"Latitude": true}))).unwrap_err();
        assert_eq!(err.kind(), "field_format");
        let err = map(&sample(json!({"Longitude": [47.6]}))).unwrap_err();
        assert_eq!(err.kind(), "field_format");
    }

    #[test]
    fn test_non_ascii_digits_never_render_as_numbers() {
        let err = map(&sample(json!({"InvolvedPersons": "２"}))).unwrap_err();
        match err {
            Error::FieldFormat { field, .. } => assert_eq!(field, "InvolvedPersons"),
            other => panic!("Expected FieldFormat, got: {:?}", other),
        }
        assert!(map(&sample(json!({"InvolvedPersons": "٣"}))).is_err());

        let row = map(&sample(json!({"Latitude": "٤٧.٥"}))).unwrap();
        assert_eq!(column(&row, "Latitude"), &SqlValue::Null);
        assert!(matches!(
            &row.warnings[..],
            [RowWarning::UnparseableCoordinate { column, .. }] if column == "Latitude"
        ));

        assert!(map(&sample(json!({"FullDate": "２０２５-02-21T00:00:00"}))).is_err());
    }

    #[test]
    fn test_nested_value_is_a_format_error() {
        let err = map(&sample(json!({"CountyName": {"name": "King"}}))).unwrap_err();
        assert!(err.to_string().contains("nested value"));
    }

    #[test]
    fn test_mode_is_stamped_on_every_row() {
        let table = MappingTable::default();
        let mode = Mode::new("Bicyclist").unwrap();
        let mapper = FieldMapper::new(&table, &mode);

        let records = vec![sample(json!({"ColliRptNum": "A"})), sample(json!({"ColliRptNum": "B"}))];
        let rows = mapper.map_all(&records).unwrap();
        assert!(rows.iter().all(|row| row.values.last() == Some(&text("Bicyclist"))));
    }

    #[test]
    fn test_map_all_aborts_on_first_bad_record() {
        let table = MappingTable::default();
        let mode = Mode::new("Pedestrian").unwrap();
        let mapper = FieldMapper::new(&table, &mode);

        let records = vec![
            sample(json!({"ColliRptNum": "A"})),
            sample(json!({"ColliRptNum": "B", "FullDate": "garbage"})),
            sample(json!({"ColliRptNum": "C"})),
        ];
        let err = mapper.map_all(&records).unwrap_err();
        assert!(err.to_string().starts_with("record B:"));
    }
}
