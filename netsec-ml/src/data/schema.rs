//! Expected dataset schema and column type inference.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Unknown,
}

impl ColumnType {
    /// Map a pandas/numpy style dtype name (`int64`, `float64`, `object`, ...).
    pub fn from_dtype_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "int8" | "int16" | "int32" | "int64" | "integer" => Self::Integer,
            "float" | "float32" | "float64" | "double" => Self::Float,
            "object" | "str" | "string" | "category" => Self::String,
            "bool" | "boolean" => Self::Boolean,
            _ => Self::Unknown,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
}

/// On-disk YAML shape: `columns` is a list of single-key `{name: dtype}` maps.
#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    numerical_columns: Vec<String>,
    #[serde(default = "default_target_column")]
    target_column: String,
}

fn default_target_column() -> String {
    "Result".to_string()
}

/// The expected shape of every ingested split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    numerical_columns: Vec<String>,
    target_column: String,
}

impl Schema {
    pub fn new(
        columns: Vec<ColumnSchema>,
        numerical_columns: Vec<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            columns,
            numerical_columns,
            target_column: target_column.into(),
        }
    }

    /// Parse the YAML schema document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineError> {
        let raw: RawSchema = serde_yaml::from_str(yaml)?;
        let mut columns = Vec::with_capacity(raw.columns.len());
        for entry in raw.columns {
            if entry.len() != 1 {
                return Err(PipelineError::config(format!(
                    "schema column entries must have exactly one name, got {entry:?}"
                )));
            }
            for (name, dtype) in entry {
                columns.push(ColumnSchema {
                    dtype: ColumnType::from_dtype_name(&dtype),
                    name,
                });
            }
        }
        Ok(Self::new(columns, raw.numerical_columns, raw.target_column))
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::missing_resource(format!(
                "schema file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Declared numeric columns; falls back to integer/float typed columns.
    pub fn numeric_columns(&self) -> Vec<String> {
        if !self.numerical_columns.is_empty() {
            return self.numerical_columns.clone();
        }
        self.columns
            .iter()
            .filter(|c| c.dtype.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Infer column type from a sample of values.
pub fn infer_column_type(values: &[serde_json::Value]) -> ColumnType {
    let non_null: Vec<_> = values.iter().filter(|v| !v.is_null()).collect();
    if non_null.is_empty() {
        return ColumnType::Null;
    }

    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_string = false;

    for v in &non_null {
        match v {
            serde_json::Value::Number(n) => {
                if n.is_f64() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            serde_json::Value::Bool(_) => has_bool = true,
            serde_json::Value::String(s) => {
                // stores often hold numbers as text
                if s.trim().parse::<i64>().is_ok() {
                    has_int = true;
                } else if s.trim().parse::<f64>().is_ok() {
                    has_float = true;
                } else {
                    has_string = true;
                }
            }
            _ => has_string = true,
        }
    }

    if has_string {
        return ColumnType::String;
    }
    if has_float {
        return ColumnType::Float;
    }
    if has_int {
        return ColumnType::Integer;
    }
    if has_bool {
        return ColumnType::Boolean;
    }
    ColumnType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"
columns:
  - having_IP_Address: int64
  - URL_Length: int64
  - Page_Rank: float64
  - Result: int64
numerical_columns:
  - having_IP_Address
  - URL_Length
  - Page_Rank
  - Result
"#;

    #[test]
    fn test_parse_yaml_schema() {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        assert_eq!(schema.column_count(), 4);
        assert_eq!(schema.columns()[0].name, "having_IP_Address");
        assert_eq!(schema.columns()[2].dtype, ColumnType::Float);
        assert_eq!(schema.target_column(), "Result");
        assert_eq!(schema.numeric_columns().len(), 4);
    }

    #[test]
    fn test_numeric_columns_fall_back_to_dtypes() {
        let schema = Schema::from_yaml_str("columns:\n  - a: int64\n  - b: object\n").unwrap();
        assert_eq!(schema.numeric_columns(), vec!["a".to_string()]);
    }

    #[test]
    fn test_multi_key_entry_rejected() {
        let err = Schema::from_yaml_str("columns:\n  - {a: int64, b: int64}\n").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_infer_column_type() {
        assert_eq!(
            infer_column_type(&[json!(1), json!(2), json!(3)]),
            ColumnType::Integer
        );
        assert_eq!(
            infer_column_type(&[json!(1), json!(2.5), serde_json::Value::Null]),
            ColumnType::Float
        );
        assert_eq!(
            infer_column_type(&[json!("a"), json!("b")]),
            ColumnType::String
        );
        assert_eq!(infer_column_type(&[json!("-1"), json!("1")]), ColumnType::Integer);
        assert_eq!(
            infer_column_type(&[serde_json::Value::Null]),
            ColumnType::Null
        );
    }
}
