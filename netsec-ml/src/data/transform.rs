//! Data transformation stage: impute features, encode the target, persist arrays.

use crate::artifact::{DataTransformationArtifact, DataValidationArtifact};
use crate::config::{TransformationConfig, TransformationPaths};
use crate::context::RunContext;
use crate::data::array::NumericArray;
use crate::data::dataset::Dataset;
use crate::data::impute::{FittedImputer, KnnImputer};
use crate::data::ingest::replace_missing_markers;
use crate::data::labels::LabelEncoder;
use crate::error::PipelineError;
use crate::persistence;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Separate the target column from the features.
pub fn split_features_target(
    dataset: &Dataset,
    target_column: &str,
) -> Result<(Dataset, Vec<Value>), PipelineError> {
    let idx = dataset.column_index(target_column).ok_or_else(|| {
        PipelineError::schema(format!("target column '{target_column}' not found"))
    })?;
    let target = dataset.column_cells(idx);
    let mut features = dataset.clone();
    features.drop_column(target_column);
    Ok((features, target))
}

/// Fitted feature preprocessing, persisted next to the model.
///
/// Holds everything inference needs to turn raw records into model input:
/// the feature column order, the missing-value markers applied at ingestion,
/// the imputer fitted on the training split and the label vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub feature_columns: Vec<String>,
    pub target_column: String,
    #[serde(default)]
    pub missing_markers: Vec<String>,
    pub imputer: FittedImputer,
    pub labels: LabelEncoder,
}

impl Preprocessor {
    /// Fit on the training split (features only, the target is ignored).
    pub fn fit(
        train: &Dataset,
        target_column: &str,
        imputer: KnnImputer,
        labels: LabelEncoder,
    ) -> Result<Self, PipelineError> {
        let (features, _) = split_features_target(train, target_column)?;
        let raw = numeric_rows(&features, &features.columns)?;
        let imputer = imputer.fit(&raw)?;
        Ok(Self {
            feature_columns: features.columns,
            target_column: target_column.to_string(),
            missing_markers: Vec::new(),
            imputer,
            labels,
        })
    }

    /// String cells matching one of `markers` count as missing in `transform`.
    pub fn with_missing_markers(mut self, markers: Vec<String>) -> Self {
        self.missing_markers = markers;
        self
    }

    /// Imputed feature matrix in fitted column order. Extra columns are ignored.
    pub fn transform(&self, dataset: &Dataset) -> Result<Vec<Vec<f64>>, PipelineError> {
        let raw = if self.missing_markers.is_empty() {
            numeric_rows(dataset, &self.feature_columns)?
        } else {
            let mut cleaned = dataset.clone();
            replace_missing_markers(&mut cleaned, &self.missing_markers);
            numeric_rows(&cleaned, &self.feature_columns)?
        };
        self.transform_rows(&raw)
    }

    /// Impute already-extracted feature rows.
    pub fn transform_rows(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>, PipelineError> {
        self.imputer.transform(rows)
    }

    /// Encoded target of a labelled dataset.
    pub fn encode_target(&self, dataset: &Dataset) -> Result<Vec<i32>, PipelineError> {
        let (_, target) = split_features_target(dataset, &self.target_column)?;
        target
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                self.labels
                    .encode(cell)
                    .map_err(|e| e.with_context(format!("row {row}")))
            })
            .collect()
    }

    /// Features followed by the encoded label, one row per record.
    pub fn transform_labelled(&self, dataset: &Dataset) -> Result<NumericArray, PipelineError> {
        let features = self.transform(dataset)?;
        let target = self.encode_target(dataset)?;
        let rows: Vec<Vec<f64>> = features
            .into_iter()
            .zip(target)
            .map(|(mut row, code)| {
                row.push(f64::from(code));
                row
            })
            .collect();
        NumericArray::from_rows(&rows)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        persistence::atomic_write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        persistence::load_json(path)
    }
}

fn numeric_rows(
    dataset: &Dataset,
    columns: &[String],
) -> Result<Vec<Vec<Option<f64>>>, PipelineError> {
    let mut by_column = Vec::with_capacity(columns.len());
    for column in columns {
        if !dataset.has_column(column) {
            return Err(PipelineError::schema(format!(
                "feature column '{column}' not found"
            )));
        }
        by_column.push(dataset.numeric_column(column)?);
    }
    Ok((0..dataset.row_count())
        .map(|row| by_column.iter().map(|col| col[row]).collect())
        .collect())
}

/// Fits the preprocessor on the validated train split and transforms both splits.
pub struct DataTransformation {
    config: TransformationConfig,
    target_column: String,
    missing_markers: Vec<String>,
    paths: TransformationPaths,
}

impl DataTransformation {
    pub fn new(
        config: TransformationConfig,
        target_column: impl Into<String>,
        paths: TransformationPaths,
    ) -> Self {
        Self {
            config,
            target_column: target_column.into(),
            missing_markers: Vec::new(),
            paths,
        }
    }

    /// Markers the ingestion stage replaced; carried into the preprocessor.
    pub fn with_missing_markers(mut self, markers: Vec<String>) -> Self {
        self.missing_markers = markers;
        self
    }

    pub fn initiate(
        &self,
        validation: &DataValidationArtifact,
        ctx: &RunContext,
    ) -> Result<DataTransformationArtifact, PipelineError> {
        let span = ctx.stage_span("data_transformation");
        let _guard = span.enter();

        let train = Dataset::read_csv(&validation.valid_train_file_path)?;
        let test = Dataset::read_csv(&validation.valid_test_file_path)?;

        let labels = LabelEncoder::new(self.config.labels.clone())?;
        let preprocessor = Preprocessor::fit(
            &train,
            &self.target_column,
            KnnImputer::new(self.config.imputer_neighbors),
            labels,
        )?
        .with_missing_markers(self.missing_markers.clone());
        tracing::info!(
            features = preprocessor.feature_columns.len(),
            neighbors = self.config.imputer_neighbors,
            "preprocessor fitted on train split"
        );

        let train_arr = preprocessor.transform_labelled(&train)?;
        let test_arr = preprocessor.transform_labelled(&test)?;

        train_arr.write_npy(&self.paths.transformed_train_file)?;
        test_arr.write_npy(&self.paths.transformed_test_file)?;
        preprocessor.save(&self.paths.transformed_object_file)?;
        tracing::info!(
            train_shape = ?train_arr.shape(),
            test_shape = ?test_arr.shape(),
            "transformed arrays written"
        );

        Ok(DataTransformationArtifact {
            transformed_object_file_path: self.paths.transformed_object_file.clone(),
            transformed_train_file_path: self.paths.transformed_train_file.clone(),
            transformed_test_file_path: self.paths.transformed_test_file.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, RunLayout};
    use crate::data::labels::LabelMapping;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn labels() -> LabelEncoder {
        LabelEncoder::new(vec![LabelMapping::new("1", 1), LabelMapping::new("-1", -1)]).unwrap()
    }

    fn train() -> Dataset {
        Dataset::new(
            vec!["a".into(), "b".into(), "Result".into()],
            vec![
                vec![json!(1), json!(10), json!(1)],
                vec![json!(2), json!(20), json!(-1)],
                vec![json!(3), Value::Null, json!(1)],
                vec![json!(4), json!(40), json!(-1)],
            ],
        )
    }

    #[test]
    fn test_split_features_target() {
        let (features, target) = split_features_target(&train(), "Result").unwrap();
        assert_eq!(features.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(target, vec![json!(1), json!(-1), json!(1), json!(-1)]);
        let err = split_features_target(&train(), "label").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_labelled_array_has_label_last() {
        let pre = Preprocessor::fit(&train(), "Result", KnnImputer::new(2), labels()).unwrap();
        let arr = pre.transform_labelled(&train()).unwrap();
        assert_eq!(arr.shape(), (4, 3));
        assert!(!arr.has_nan());
        assert_eq!(arr.row(0), &[1.0, 10.0, 1.0]);
        // row 3's neighbours on `a` are rows 2 and 4
        assert_eq!(arr.row(2), &[3.0, 30.0, 1.0]);
    }

    #[test]
    fn test_transform_uses_fitted_column_order() {
        let pre = Preprocessor::fit(&train(), "Result", KnnImputer::new(2), labels()).unwrap();
        let reordered = Dataset::new(
            vec!["b".into(), "extra".into(), "a".into()],
            vec![vec![json!(5), json!("ignored"), json!(6)]],
        );
        assert_eq!(pre.transform(&reordered).unwrap(), vec![vec![6.0, 5.0]]);
    }

    #[test]
    fn test_transform_treats_markers_as_missing() {
        let pre = Preprocessor::fit(&train(), "Result", KnnImputer::new(2), labels())
            .unwrap()
            .with_missing_markers(vec!["na".into(), "".into()]);
        let raw = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![json!(3), json!("na")], vec![json!(" "), json!(40)]],
        );
        let rows = pre.transform(&raw).unwrap();
        assert_eq!(rows[0], vec![3.0, 30.0]);
        assert!(rows[1].iter().all(|v| v.is_finite()));

        let unmarked = Preprocessor::fit(&train(), "Result", KnnImputer::new(2), labels()).unwrap();
        assert_eq!(unmarked.transform(&raw).unwrap_err().kind(), ErrorKind::Dataset);
    }

    #[test]
    fn test_unknown_label_fails() {
        let pre = Preprocessor::fit(&train(), "Result", KnnImputer::new(2), labels()).unwrap();
        let bad = Dataset::new(
            vec!["a".into(), "b".into(), "Result".into()],
            vec![vec![json!(1), json!(1), json!(0)]],
        );
        let err = pre.transform_labelled(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownLabel);
    }

    #[test]
    fn test_stage_writes_arrays_and_preprocessor() {
        let dir = TempDir::new().unwrap();
        let train_path = dir.path().join("train.csv");
        let test_path = dir.path().join("test.csv");
        train().write_csv(&train_path).unwrap();
        train().select_rows(&[0, 2]).write_csv(&test_path).unwrap();

        let mut config = PipelineConfig::default();
        config.artifact_dir = dir.path().join("Artifacts");
        let layout = RunLayout::from_timestamp(&config, "t");
        let stage = DataTransformation::new(
            config.transformation.clone(),
            "Result",
            layout.transformation(),
        )
        .with_missing_markers(vec!["na".into()]);
        let validation = DataValidationArtifact {
            validation_status: true,
            valid_train_file_path: train_path,
            valid_test_file_path: test_path,
            drift_report_file_path: dir.path().join("report.yaml"),
        };
        let artifact = stage
            .initiate(&validation, &RunContext::new("test", "t"))
            .unwrap();

        let train_arr = NumericArray::read_npy(&artifact.transformed_train_file_path).unwrap();
        let test_arr = NumericArray::read_npy(&artifact.transformed_test_file_path).unwrap();
        assert_eq!(train_arr.shape(), (4, 3));
        assert_eq!(test_arr.shape(), (2, 3));
        assert!(!test_arr.has_nan());

        let loaded = Preprocessor::load(&artifact.transformed_object_file_path).unwrap();
        assert_eq!(loaded.feature_columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(loaded.missing_markers, vec!["na".to_string()]);
    }
}
