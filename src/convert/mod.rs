use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::StageError;

/// Spreadsheet columns carried into the output, by 0-based index and letter.
/// The letter doubles as the field name when the header cell is not text.
const SELECTED_COLUMNS: [(usize, &str); 11] = [
    (1, "B"),
    (4, "E"),
    (8, "I"),
    (9, "J"),
    (10, "K"),
    (12, "M"),
    (14, "O"),
    (15, "P"),
    (17, "R"),
    (22, "W"),
    (23, "X"),
];

/// Cell text treated as a null marker.
const NULL_MARKER: &str = "NA";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Output filename for a given run date, e.g. `desligados_05032024.json`.
pub fn output_name(date: NaiveDate) -> String {
    date.format("desligados_%d%m%Y.json").to_string()
}

/// Convert the downloaded spreadsheet into the dated JSON record file in
/// `out_dir`, overwriting any previous same-day output. Returns the path of
/// the written file.
pub fn convert(xlsx: &Path, out_dir: &Path, date: NaiveDate) -> Result<PathBuf, StageError> {
    convert_inner(xlsx, out_dir, date).map_err(StageError::Convert)
}

fn convert_inner(xlsx: &Path, out_dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let records = read_records(xlsx)?;
    let out_path = out_dir.join(output_name(date));
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(&out_path, json).with_context(|| format!("writing {}", out_path.display()))?;
    info!(records = records.len(), file = %out_path.display(), "wrote converted records");
    Ok(out_path)
}

/// Read the first worksheet and project each data row onto the selected
/// columns, in sheet order.
pub fn read_records(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("opening {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no sheets")??;
    records_from_range(&range)
}

fn records_from_range(range: &Range<Data>) -> Result<Vec<Map<String, Value>>> {
    let mut rows = range.rows();
    let header = rows.next().context("spreadsheet is empty")?;
    let fields: Vec<String> = SELECTED_COLUMNS
        .iter()
        .map(|&(idx, letter)| header_name(header.get(idx), letter))
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let blank = SELECTED_COLUMNS
            .iter()
            .all(|&(idx, _)| matches!(row.get(idx), None | Some(Data::Empty)));
        if blank {
            continue;
        }

        let mut record = Map::new();
        for (&(idx, _), field) in SELECTED_COLUMNS.iter().zip(&fields) {
            let value = match row.get(idx) {
                Some(cell) => cell_to_json(cell),
                None => Value::Null,
            };
            record.insert(field.clone(), value);
        }
        records.push(record);
    }

    Ok(records)
}

fn header_name(cell: Option<&Data>, letter: &str) -> String {
    match cell {
        Some(Data::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => letter.to_string(),
    }
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s == NULL_MARKER => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => float_value(*f),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::from(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::String(d.format(ISO_FORMAT).to_string()))
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

// Spreadsheet numerics arrive as floats; integral values read back as ints.
fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
