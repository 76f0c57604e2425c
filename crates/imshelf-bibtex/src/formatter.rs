//! BibTeX formatting
//!
//! Converts [`Record`] structures back to BibTeX text. Output reparses
//! field-for-field equal to the input records, so files written by the
//! store stay consumable by other BibTeX tooling.

use crate::entry::Record;

/// Format a single record
pub fn format_record(record: &Record) -> String {
    let mut result = String::new();

    result.push('@');
    result.push_str(record.entry_type.as_str());
    result.push('{');
    result.push_str(&record.key);
    result.push_str(",\n");

    for field in &record.fields {
        result.push_str("    ");
        result.push_str(&field.name);
        result.push_str(" = ");
        result.push_str(&format_field_value(&field.value));
        result.push_str(",\n");
    }

    result.push('}');
    result
}

/// Format multiple records separated by blank lines
pub fn format_records(records: &[Record]) -> String {
    records
        .iter()
        .map(format_record)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Choose delimiters for a field value: bare for plain numbers, braces
/// otherwise (preserves LaTeX commands and case-protecting groups)
fn format_field_value(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len() + 2);
    result.push('{');
    result.push_str(value);
    result.push('}');
    result
}
