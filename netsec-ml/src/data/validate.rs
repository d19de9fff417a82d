//! Data validation stage: schema conformance and train/test drift.

use crate::artifact::{DataIngestionArtifact, DataValidationArtifact};
use crate::config::{ValidationConfig, ValidationPaths};
use crate::context::RunContext;
use crate::data::dataset::Dataset;
use crate::data::drift::{DriftReport, detect_drift};
use crate::data::schema::{Schema, infer_column_type};
use crate::error::PipelineError;
use crate::persistence;

/// `true` iff the dataset has exactly as many columns as the schema.
pub fn validate_number_of_columns(dataset: &Dataset, schema: &Schema) -> bool {
    dataset.column_count() == schema.column_count()
}

/// Every schema numeric column must exist and hold numbers (or be missing).
pub fn check_numeric_columns(dataset: &Dataset, schema: &Schema) -> Result<(), PipelineError> {
    let mut absent = Vec::new();
    for column in schema.numeric_columns() {
        let Some(idx) = dataset.column_index(&column) else {
            absent.push(column);
            continue;
        };
        let dtype = infer_column_type(&dataset.column_cells(idx));
        if !(dtype.is_numeric() || dtype == crate::data::schema::ColumnType::Null) {
            return Err(PipelineError::schema(format!(
                "column '{column}' is declared numeric but holds {dtype:?} values"
            )));
        }
    }
    if !absent.is_empty() {
        return Err(PipelineError::schema(format!(
            "numeric columns missing from dataset: {absent:?}"
        )));
    }
    Ok(())
}

/// Validates ingested splits and writes validated copies plus a drift report.
pub struct DataValidation {
    schema: Schema,
    config: ValidationConfig,
    paths: ValidationPaths,
}

impl DataValidation {
    pub fn new(schema: Schema, config: ValidationConfig, paths: ValidationPaths) -> Self {
        Self {
            schema,
            config,
            paths,
        }
    }

    pub fn initiate(
        &self,
        ingestion: &DataIngestionArtifact,
        ctx: &RunContext,
    ) -> Result<DataValidationArtifact, PipelineError> {
        let span = ctx.stage_span("data_validation");
        let _guard = span.enter();

        let train = Dataset::read_csv(&ingestion.train_file_path)?;
        let test = Dataset::read_csv(&ingestion.test_file_path)?;

        for (split, dataset) in [("train", &train), ("test", &test)] {
            if !validate_number_of_columns(dataset, &self.schema) {
                return Err(PipelineError::schema(format!(
                    "{split} dataset has {} columns, schema expects {}",
                    dataset.column_count(),
                    self.schema.column_count()
                )));
            }
            check_numeric_columns(dataset, &self.schema)?;
        }
        tracing::info!(
            columns = self.schema.column_count(),
            train_rows = train.row_count(),
            test_rows = test.row_count(),
            "schema checks passed"
        );

        let report = detect_drift(
            &train,
            &test,
            &self.schema.numeric_columns(),
            self.config.drift_threshold,
        )?;
        self.write_report(&report)?;

        let drifted = report.drifted_columns();
        if !drifted.is_empty() {
            tracing::warn!(columns = ?drifted, "drift detected between train and test");
            if self.config.drift_is_fatal {
                return Err(PipelineError::schema(format!(
                    "drift detected in columns {drifted:?} and drift is configured as fatal"
                )));
            }
        }

        persistence::copy_file(&ingestion.train_file_path, &self.paths.valid_train_file)?;
        persistence::copy_file(&ingestion.test_file_path, &self.paths.valid_test_file)?;

        let artifact = DataValidationArtifact {
            validation_status: !report.any_drift(),
            valid_train_file_path: self.paths.valid_train_file.clone(),
            valid_test_file_path: self.paths.valid_test_file.clone(),
            drift_report_file_path: self.paths.drift_report_file.clone(),
        };
        tracing::info!(validation_status = artifact.validation_status, "data validation completed");
        Ok(artifact)
    }

    fn write_report(&self, report: &DriftReport) -> Result<(), PipelineError> {
        persistence::atomic_write_yaml(&self.paths.drift_report_file, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, RunLayout};
    use crate::data::drift::DriftReport;
    use crate::data::schema::{ColumnSchema, ColumnType};
    use crate::error::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn schema() -> Schema {
        Schema::new(
            vec![
                ColumnSchema {
                    name: "a".into(),
                    dtype: ColumnType::Integer,
                },
                ColumnSchema {
                    name: "Result".into(),
                    dtype: ColumnType::Integer,
                },
            ],
            Vec::new(),
            "Result",
        )
    }

    fn write_splits(dir: &TempDir, shift: i64) -> DataIngestionArtifact {
        let train = Dataset::new(
            vec!["a".into(), "Result".into()],
            (0..60).map(|i| vec![json!(i % 10), json!(if i % 2 == 0 { 1 } else { -1 })]).collect(),
        );
        let test = Dataset::new(
            vec!["a".into(), "Result".into()],
            (0..30)
                .map(|i| vec![json!(i % 10 + shift), json!(if i % 2 == 0 { 1 } else { -1 })])
                .collect(),
        );
        let artifact = DataIngestionArtifact {
            feature_store_file_path: dir.path().join("fs.csv"),
            train_file_path: dir.path().join("train.csv"),
            test_file_path: dir.path().join("test.csv"),
        };
        train.write_csv(&artifact.train_file_path).unwrap();
        test.write_csv(&artifact.test_file_path).unwrap();
        artifact
    }

    fn stage(dir: &TempDir, fatal: bool) -> DataValidation {
        let mut config = PipelineConfig::default();
        config.artifact_dir = dir.path().join("Artifacts");
        config.validation.drift_is_fatal = fatal;
        let layout = RunLayout::from_timestamp(&config, "01_01_2025_00_00_00");
        DataValidation::new(schema(), config.validation.clone(), layout.validation())
    }

    #[test]
    fn test_column_count_check() {
        let ds = Dataset::new(vec!["a".into(), "Result".into()], Vec::new());
        assert!(validate_number_of_columns(&ds, &schema()));
        let ds = Dataset::new(vec!["a".into()], Vec::new());
        assert!(!validate_number_of_columns(&ds, &schema()));
    }

    #[test]
    fn test_string_column_declared_numeric() {
        let ds = Dataset::new(
            vec!["a".into(), "Result".into()],
            vec![vec![json!("http://x"), json!(1)]],
        );
        let err = check_numeric_columns(&ds, &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_clean_splits_pass_and_are_copied() {
        let dir = TempDir::new().unwrap();
        let ingestion = write_splits(&dir, 0);
        let ctx = RunContext::new("test", "01_01_2025_00_00_00");
        let artifact = stage(&dir, false).initiate(&ingestion, &ctx).unwrap();

        assert!(artifact.validation_status);
        assert!(artifact.valid_train_file_path.exists());
        assert!(artifact.valid_test_file_path.exists());

        let yaml = std::fs::read_to_string(&artifact.drift_report_file_path).unwrap();
        let report: DriftReport = serde_yaml::from_str(&yaml).unwrap();
        assert!(!report.any_drift());
        assert!(report.columns.contains_key("a"));
    }

    #[test]
    fn test_drift_is_informational_by_default() {
        let dir = TempDir::new().unwrap();
        let ingestion = write_splits(&dir, 500);
        let ctx = RunContext::new("test", "01_01_2025_00_00_00");
        let artifact = stage(&dir, false).initiate(&ingestion, &ctx).unwrap();
        assert!(!artifact.validation_status);
        assert!(artifact.valid_test_file_path.exists());
    }

    #[test]
    fn test_fatal_drift_aborts_after_report() {
        let dir = TempDir::new().unwrap();
        let ingestion = write_splits(&dir, 500);
        let ctx = RunContext::new("test", "01_01_2025_00_00_00");
        let validation = stage(&dir, true);
        let err = validation.initiate(&ingestion, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(validation.paths.drift_report_file.exists());
    }

    #[test]
    fn test_column_mismatch_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let ingestion = write_splits(&dir, 0);
        let extra = Dataset::new(
            vec!["a".into(), "b".into(), "Result".into()],
            vec![vec![json!(1), json!(2), json!(1)]],
        );
        extra.write_csv(&ingestion.test_file_path).unwrap();
        let ctx = RunContext::new("test", "01_01_2025_00_00_00");
        let err = stage(&dir, false).initiate(&ingestion, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
