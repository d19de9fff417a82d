//! Document-store sources the ingestion stage reads from.
//!
//! The store is consumed through its export: a whole collection is read per run,
//! never queried incrementally.

use crate::data::dataset::Dataset;
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// The type of source to load from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSourceType {
    /// Flat CSV export with a header row.
    Csv {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// JSON array of documents (e.g. `mongoexport --jsonArray`).
    Json { path: PathBuf },
    /// One JSON document per line.
    Jsonl { path: PathBuf },
}

fn default_delimiter() -> char {
    ','
}

impl DataSourceType {
    /// Build the source this configuration describes.
    pub fn build(&self) -> Box<dyn DocumentSource> {
        match self {
            Self::Csv { path, delimiter } => Box::new(CsvSource {
                path: path.clone(),
                delimiter: *delimiter,
            }),
            Self::Json { path } => Box::new(JsonSource { path: path.clone() }),
            Self::Jsonl { path } => Box::new(JsonlSource { path: path.clone() }),
        }
    }
}

/// Information about a source for logging and tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for loading the full record set from a source.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load every record.
    async fn load(&self) -> Result<Dataset, PipelineError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

async fn read_source(path: &PathBuf) -> Result<Vec<u8>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::missing_resource(format!(
            "data source not found: {}",
            path.display()
        )));
    }
    Ok(tokio::fs::read(path).await?)
}

/// Flatten documents into a dataset. Columns follow first-seen key order;
/// a key absent from a document becomes a missing cell.
pub fn documents_to_dataset(documents: &[Value]) -> Result<Dataset, PipelineError> {
    let mut columns: Vec<String> = Vec::new();
    for (idx, doc) in documents.iter().enumerate() {
        let Value::Object(map) = doc else {
            return Err(PipelineError::dataset(format!(
                "document {idx} is not a JSON object"
            )));
        };
        for key in map.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = documents
        .iter()
        .map(|doc| {
            columns
                .iter()
                .map(|col| match doc.get(col) {
                    Some(v @ (Value::Object(_) | Value::Array(_))) => Value::String(v.to_string()),
                    Some(v) => v.clone(),
                    None => Value::Null,
                })
                .collect()
        })
        .collect();

    Ok(Dataset::new(columns, rows))
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV export source.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

#[async_trait]
impl DocumentSource for CsvSource {
    async fn load(&self) -> Result<Dataset, PipelineError> {
        let bytes = read_source(&self.path).await?;
        let delimiter = u8::try_from(self.delimiter).map_err(|_| {
            PipelineError::config(format!(
                "CSV delimiter must be a single-byte character, got {:?}",
                self.delimiter
            ))
        })?;
        Dataset::from_csv_reader(bytes.as_slice(), delimiter)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonSource
// ---------------------------------------------------------------------------

/// JSON array export source.
pub struct JsonSource {
    pub path: PathBuf,
}

#[async_trait]
impl DocumentSource for JsonSource {
    async fn load(&self) -> Result<Dataset, PipelineError> {
        let bytes = read_source(&self.path).await?;
        let value: Value = serde_json::from_slice(&bytes)?;
        match value {
            Value::Array(items) => documents_to_dataset(&items),
            obj @ Value::Object(_) => documents_to_dataset(&[obj]),
            _ => Err(PipelineError::dataset(
                "JSON export must be an array of documents or a single document",
            )),
        }
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "json".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonlSource
// ---------------------------------------------------------------------------

/// JSON Lines export source, one document per line.
pub struct JsonlSource {
    pub path: PathBuf,
}

#[async_trait]
impl DocumentSource for JsonlSource {
    async fn load(&self) -> Result<Dataset, PipelineError> {
        let bytes = read_source(&self.path).await?;
        let content = String::from_utf8(bytes)
            .map_err(|e| PipelineError::dataset(format!("JSONL export is not UTF-8: {e}")))?;
        let mut items = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let doc: Value = serde_json::from_str(line).map_err(|e| {
                PipelineError::dataset(format!("invalid JSON on line {}: {e}", line_no + 1))
            })?;
            items.push(doc);
        }
        documents_to_dataset(&items)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "jsonl".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}
