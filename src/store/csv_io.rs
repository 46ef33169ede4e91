//! CSV persistence for untyped rows.
//!
//! Rows are ordered JSON objects. The header of a written file is the key set
//! of its first row, so every file is as wide as its first record.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::frame::Frame;

pub type Row = Map<String, Value>;

/// Read a CSV file into one row per record, every value a string.
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_open_error(path, e))?;
    let headers = reader.headers().map_err(|e| Error::csv(path, e))?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Read a CSV file into a [`Frame`], turning numeric cells into numbers.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_open_error(path, e))?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| Error::csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        rows.push(record.iter().map(crate::util::coerce::coerce_cell).collect());
    }

    Frame::new(columns, rows)
}

/// Write rows to `path`, using the first row's keys as the header.
///
/// Keys missing from later rows become empty cells; extra keys are dropped.
pub fn write_rows(rows: &[Row], path: &Path) -> Result<()> {
    let first = rows
        .first()
        .ok_or_else(|| Error::Validation(format!("no rows to write to {}", path.display())))?;
    let header: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_open_error(path, e))?;
    writer
        .write_record(&header)
        .map_err(|e| Error::csv(path, e))?;

    for (i, row) in rows.iter().enumerate() {
        let extra = row.keys().filter(|k| !first.contains_key(*k)).count();
        if extra > 0 {
            debug!(row = i, extra, path = %path.display(), "Dropping columns not in header");
        }
        let record: Vec<String> = header
            .iter()
            .map(|key| row.get(*key).map(cell_text).unwrap_or_default())
            .collect();
        writer.write_record(&record).map_err(|e| Error::csv(path, e))?;
    }

    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Sum a list of rows into one. Only keys whose value in the first row is
/// numeric are summed; `only_keys` and `omit_keys` narrow that further.
pub fn sum_rows(rows: &[Row], only_keys: Option<&[&str]>, omit_keys: Option<&[&str]>) -> Result<Row> {
    let mut out = Row::new();
    let Some(first) = rows.first() else {
        return Ok(out);
    };

    for (key, value) in first {
        if !value.is_number() {
            continue;
        }
        if only_keys.is_some_and(|keys| !keys.contains(&key.as_str())) {
            continue;
        }
        if omit_keys.is_some_and(|keys| keys.contains(&key.as_str())) {
            continue;
        }
        out.insert(key.clone(), sum_column(rows, key)?);
    }

    Ok(out)
}

/// Sum one column across rows. Integers stay integers until a float shows
/// up or the total overflows `i64`.
pub(crate) fn sum_column(rows: &[Row], key: &str) -> Result<Value> {
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut is_float = false;

    for (i, row) in rows.iter().enumerate() {
        let value = row
            .get(key)
            .ok_or_else(|| Error::Parse(format!("row {i} is missing column '{key}'")))?;
        let checked = value.as_i64().and_then(|n| int_total.checked_add(n));
        match checked {
            Some(total) if !is_float => int_total = total,
            _ => {
                let f = value.as_f64().ok_or_else(|| {
                    Error::Parse(format!("row {i} column '{key}' is not numeric: {value}"))
                })?;
                if !is_float {
                    is_float = true;
                    float_total = int_total as f64;
                }
                float_total += f;
            }
        }
    }

    if is_float {
        Ok(serde_json::Number::from_f64(float_total)
            .map(Value::Number)
            .unwrap_or(Value::Null))
    } else {
        Ok(Value::from(int_total))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        nested => nested.to_string(),
    }
}

fn csv_open_error(path: &Path, err: csv::Error) -> Error {
    // Opening failures surface as I/O so a missing file reads as NotFound.
    match err.into_kind() {
        csv::ErrorKind::Io(io) => Error::io(path, io),
        other => Error::Parse(format!("{}: {other:?}", path.display())),
    }
}
