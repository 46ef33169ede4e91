//! Minimal column-ordered table used by the query layer and the form study.

use std::ops::Range;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::csv_io::Row;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(Error::Parse(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a frame whose columns are the first row's keys.
    pub fn from_rows(rows: &[Row]) -> Self {
        let columns: Vec<String> = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        let cells = rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self {
            columns,
            rows: cells,
        }
    }

    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// String form of a cell, as it would appear in the CSV.
    pub fn get_str(&self, row: usize, column: &str) -> Option<String> {
        self.get(row, column).map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Append a column; `values` must have one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::Validation(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        if self.column_index(name).is_some() {
            return Err(Error::Validation(format!("column '{name}' already exists")));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Keep only rows for which `keep(row_index)` is true.
    pub fn filter<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(usize) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, r)| r.clone())
            .collect();
        Frame {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> Frame {
        let start = self.rows.len().saturating_sub(n);
        self.slice(start..self.rows.len())
    }

    pub fn slice(&self, range: Range<usize>) -> Frame {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        Frame {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Columns holding a number in every non-empty cell (and at least one).
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(col, _)| {
                let mut seen = false;
                for row in &self.rows {
                    match &row[*col] {
                        Value::Number(_) => seen = true,
                        Value::Null => {}
                        Value::String(s) if s.is_empty() => {}
                        _ => return false,
                    }
                }
                seen
            })
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Mean of every numeric column over `range`, skipping empty cells.
    /// Column order follows the frame.
    pub fn mean_numeric(&self, range: Range<usize>) -> Vec<(String, f64)> {
        let window = self.slice(range);
        self.numeric_columns()
            .into_iter()
            .filter_map(|name| {
                let col = window.column_index(name)?;
                let values: Vec<f64> = window.rows.iter().filter_map(|r| r[col].as_f64()).collect();
                if values.is_empty() {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Some((name.to_string(), mean))
            })
            .collect()
    }

    /// Numeric cells of one row; non-numeric cells are dropped.
    pub fn row_numbers(&self, row: usize) -> Vec<(String, f64)> {
        let Some(cells) = self.rows.get(row) else {
            return Vec::new();
        };
        self.columns
            .iter()
            .zip(cells)
            .filter_map(|(name, v)| v.as_f64().map(|f| (name.clone(), f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Frame {
        Frame::new(
            vec!["h_a".into(), "xG".into(), "scored".into(), "date".into()],
            vec![
                vec![json!("h"), json!(1.0), json!(2), json!("2020-09-12")],
                vec![json!("a"), json!(2.0), json!(0), json!("2020-09-19")],
                vec![json!("h"), json!(3.0), json!(1), json!("2020-09-26")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Frame::new(vec!["a".into()], vec![vec![json!(1), json!(2)]]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseFailure);
    }

    #[test]
    fn test_numeric_columns() {
        assert_eq!(sample().numeric_columns(), vec!["xG", "scored"]);
    }

    #[test]
    fn test_mean_numeric_window() {
        let means = sample().mean_numeric(0..2);
        assert_eq!(means, vec![("xG".to_string(), 1.5), ("scored".to_string(), 1.0)]);
    }

    #[test]
    fn test_tail_and_filter() {
        let frame = sample();
        assert_eq!(frame.tail(2).get(0, "h_a"), Some(&json!("a")));
        assert_eq!(frame.tail(10).len(), 3);

        let home = frame.filter(|i| frame.get(i, "h_a") == Some(&json!("h")));
        assert_eq!(home.len(), 2);
        assert_eq!(home.get(1, "xG"), Some(&json!(3.0)));
    }

    #[test]
    fn test_push_column_length_checked() {
        let mut frame = sample();
        assert!(frame.push_column("opp", vec![json!("x")]).is_err());
        frame
            .push_column("opp", vec![json!("Arsenal"), json!("Chelsea"), json!("Everton")])
            .unwrap();
        assert_eq!(frame.get_str(2, "opp").as_deref(), Some("Everton"));
    }

    #[test]
    fn test_row_numbers_drops_text() {
        let nums = sample().row_numbers(1);
        assert_eq!(nums, vec![("xG".to_string(), 2.0), ("scored".to_string(), 0.0)]);
    }

    #[test]
    fn test_rows_round_trip() {
        let frame = sample();
        assert_eq!(Frame::from_rows(&frame.to_rows()), frame);
    }
}
