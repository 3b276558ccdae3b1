use crate::models::schema::{FieldKind, ResourceSchema};
use crate::models::Record;
use serde_json::Value;

/// Formats understood by `?export=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
        }
    }
}

/// Spreadsheet programs open UTF-8 CSV correctly only with a BOM.
const UTF8_BOM: &str = "\u{feff}";

/// Wraps a value in quotes when it contains a separator, quote or newline.
/// Values starting like a formula are prefixed with `'` so spreadsheets keep
/// them as text.
fn csv_escape(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) && value.parse::<f64>().is_err() {
        format!("'{}", value)
    } else {
        value.to_string()
    };
    if value.contains([';', ',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

fn json_value_to_csv(kind: Option<FieldKind>, value: Option<&Value>) -> String {
    match (kind, value) {
        (_, None) | (_, Some(Value::Null)) => String::new(),
        (Some(FieldKind::Boolean), Some(Value::Bool(b))) => (if *b { "Oui" } else { "Non" }).to_string(),
        (_, Some(Value::String(s))) => s.clone(),
        (_, Some(Value::Number(n))) => n.to_string(),
        (_, Some(Value::Bool(b))) => b.to_string(),
        (_, Some(other)) => other.to_string(),
    }
}

fn header_label(schema: &ResourceSchema, column: &str) -> String {
    match column {
        "id" => "ID".to_string(),
        "created_at" => "Créé le".to_string(),
        "updated_at" => "Modifié le".to_string(),
        _ => schema.field(column).map_or(column, |f| f.label).to_string(),
    }
}

/// Builds the CSV document for `records` with the exportable columns of `schema`.
pub fn build_csv(schema: &ResourceSchema, records: &[Record]) -> String {
    let columns = schema.export_columns();
    let mut lines = Vec::with_capacity(records.len() + 1);

    lines.push(
        columns
            .iter()
            .map(|c| csv_escape(&header_label(schema, c)))
            .collect::<Vec<_>>()
            .join(","),
    );

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                if *column == "id" {
                    return record.id.to_string();
                }
                let kind = schema.field(column).map(|f| f.kind);
                csv_escape(&json_value_to_csv(kind, record.fields.get(*column)))
            })
            .collect();
        lines.push(row.join(","));
    }

    format!("{}{}\r\n", UTF8_BOM, lines.join("\r\n"))
}

/// `actualites-20260301-0930.csv`
pub fn export_filename(schema: &ResourceSchema, format: ExportFormat) -> String {
    format!(
        "{}-{}.{}",
        schema.slug,
        chrono::Local::now().format("%Y%m%d-%H%M"),
        format.extension()
    )
}
