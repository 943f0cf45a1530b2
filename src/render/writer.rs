use chrono::NaiveDate;

use crate::mapping::MappingTable;
use crate::types::{MappedRow, Mode, SqlValue};

/// Single-quoted SQL string literal with embedded quotes doubled
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Double-quoted SQL identifier with embedded quotes doubled
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn render_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(text) => quote_literal(text),
        SqlValue::Number(literal) => literal.clone(),
    }
}

/// Three comment lines describing the document
pub fn render_header(mode: &Mode, generated_on: NaiveDate, record_count: usize) -> String {
    format!(
        "-- Mode: {}\n-- Generated: {}\n-- Records: {}\n",
        mode,
        generated_on.format("%Y-%m-%d"),
        record_count
    )
}

/// One INSERT for a batch of rows, skipping rows whose natural key already
/// exists so the statement can be re-applied safely.
pub fn render_statement(table: &MappingTable, rows: &[MappedRow]) -> String {
    let columns: Vec<String> = table.column_names().map(quote_identifier).collect();

    let mut sql = format!("INSERT INTO {} ({})\nVALUES\n", table.table, columns.join(", "));

    for (idx, row) in rows.iter().enumerate() {
        let values: Vec<String> = row.values.iter().map(render_value).collect();
        sql.push_str("  (");
        sql.push_str(&values.join(", "));
        sql.push_str(if idx + 1 < rows.len() { "),\n" } else { ")\n" });
    }

    sql.push_str("ON CONFLICT (");
    sql.push_str(&quote_identifier(&table.key_column));
    sql.push_str(") DO NOTHING;");
    sql
}
