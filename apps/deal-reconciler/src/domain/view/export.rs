//! CSV export of a record page.
//!
//! Amounts use two decimals, identifiers and counts stay plain integers,
//! text-like values are always double-quoted with inner quotes doubled.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use rust_decimal::RoundingStrategy;

use super::{ViewError, ensure_field};
use crate::domain::fields::{FieldValue, Record};

/// Render `records` as CSV with one column per entry of `fields`.
///
/// The header row holds the field labels. Every field is validated before
/// anything is written.
pub fn to_csv<R: Record>(records: &[R], fields: &[&str]) -> Result<String, ViewError> {
    let mut labels = Vec::with_capacity(fields.len());
    for field in fields {
        ensure_field::<R>(field)?;
        if let Some(descriptor) = R::descriptor(field) {
            labels.push(descriptor.label);
        }
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(&labels)
        .map_err(|e| ViewError::Csv(e.to_string()))?;

    for record in records {
        let row: Vec<String> = fields
            .iter()
            .map(|field| record.value(field).map(render_cell).unwrap_or_default())
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| ViewError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ViewError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ViewError::Csv(e.to_string()))
}

fn render_cell(value: FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Numeric(v) => {
            format!("{:.2}", v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        }
        FieldValue::Flag(v) => v.to_string(),
        text @ (FieldValue::Text(_) | FieldValue::Enum(_) | FieldValue::Timestamp(_)) => {
            quote(&text.to_string())
        }
    }
}

fn quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}
