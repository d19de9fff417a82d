//! In-memory tabular dataset and its CSV form.

use crate::error::PipelineError;
use crate::persistence;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Rows of named columns. A `Null` cell is a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, in row order. Short rows yield `Null`.
    pub fn column_cells(&self, idx: usize) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Remove a column by name. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        true
    }

    /// Numeric view of a column: `None` for missing cells.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, PipelineError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PipelineError::schema(format!("column '{name}' not found")))?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let cell = row.get(idx).unwrap_or(&Value::Null);
                numeric_value(cell).ok_or_else(|| {
                    PipelineError::dataset(format!(
                        "non-numeric value {cell} in column '{name}' at row {row_idx}"
                    ))
                })
            })
            .collect()
    }

    /// A new dataset with the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Parse a CSV document with a header row.
    pub fn from_csv_reader<R: std::io::Read>(
        reader: R,
        delimiter: u8,
    ) -> Result<Self, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(parse_cell).collect());
        }
        Ok(Self { columns, rows })
    }

    /// Read a comma-separated file written by [`Dataset::write_csv`] (or any CSV with a header).
    pub fn read_csv(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::missing_resource(format!(
                "dataset not found: {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, b',')
    }

    /// Serialize to CSV bytes. Missing cells become empty fields.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(cell_to_field))?;
        }
        wtr.into_inner()
            .map_err(|e| PipelineError::dataset(format!("CSV flush failed: {e}")))
    }

    /// Write the dataset as CSV, creating parent directories.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let bytes = self.to_csv_bytes()?;
        persistence::atomic_write(path, &bytes)
    }
}

/// Infer a JSON value from a raw CSV field.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = s.parse::<f64>() {
        return serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(s.to_string()));
    }
    if s == "true" || s == "false" {
        return Value::Bool(s == "true");
    }
    Value::String(s.to_string())
}

/// Numeric value of a cell: `Some(None)` for missing, `None` if not numeric.
pub fn numeric_value(cell: &Value) -> Option<Option<f64>> {
    match cell {
        Value::Null => Some(None),
        Value::Number(n) => n.as_f64().map(Some),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(None);
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_nan() => Some(None),
                Ok(f) => Some(Some(f)),
                Err(_) => None,
            }
        }
        _ => None,
    }
}

/// Canonical text form of a cell, as used for CSV fields and label matching.
pub fn cell_to_field(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["a".into(), "b".into(), "Result".into()],
            vec![
                vec![json!(1), json!(0.5), json!("1")],
                vec![Value::Null, json!(-1), json!("-1")],
            ],
        )
    }

    #[test]
    fn test_csv_roundtrip_keeps_missing_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("split").join("train.csv");
        let ds = sample();
        ds.write_csv(&path).unwrap();

        let loaded = Dataset::read_csv(&path).unwrap();
        assert_eq!(loaded.columns, ds.columns);
        assert_eq!(loaded.rows[1][0], Value::Null);
        assert_eq!(loaded.rows[0][1], json!(0.5));
        // label strings that look numeric come back as numbers
        assert_eq!(loaded.rows[1][2], json!(-1));
    }

    #[test]
    fn test_numeric_column() {
        let ds = sample();
        assert_eq!(ds.numeric_column("a").unwrap(), vec![Some(1.0), None]);
        assert!(ds.numeric_column("missing").is_err());

        let mut bad = sample();
        bad.rows[0][0] = json!("abc");
        assert!(bad.numeric_column("a").is_err());
    }

    #[test]
    fn test_drop_and_select() {
        let mut ds = sample();
        assert!(ds.drop_column("b"));
        assert!(!ds.drop_column("b"));
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.rows[0].len(), 2);

        let picked = ds.select_rows(&[1, 0]);
        assert_eq!(picked.rows[0][1], json!("-1"));
    }

    #[test]
    fn test_cell_to_field_normalizes_integral_floats() {
        assert_eq!(cell_to_field(&json!(-1.0)), "-1");
        assert_eq!(cell_to_field(&json!(2.5)), "2.5");
        assert_eq!(cell_to_field(&Value::Null), "");
        assert_eq!(numeric_value(&json!("NaN")), Some(None));
    }
}
