//! The deployable model: fitted preprocessor plus fitted classifier.

use crate::data::dataset::Dataset;
use crate::data::transform::Preprocessor;
use crate::error::PipelineError;
use crate::persistence;
use crate::training::estimator::FittedModel;
use crate::training::registry::ParamSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raw records in, predicted label codes out.
#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkModel {
    pub model_name: String,
    pub params: ParamSet,
    preprocessor: Preprocessor,
    model: FittedModel,
}

impl NetworkModel {
    pub fn new(
        model_name: impl Into<String>,
        params: ParamSet,
        preprocessor: Preprocessor,
        model: FittedModel,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            params,
            preprocessor,
            model,
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Predict a batch addressed by column name. Columns the model was not
    /// trained on (the target included) are ignored.
    pub fn predict(&self, batch: &Dataset) -> Result<Vec<i32>, PipelineError> {
        let features = self.preprocessor.transform(batch)?;
        self.model.predict(&features)
    }

    /// Predict positional rows in the trained feature order; `None` is missing.
    pub fn predict_rows(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<i32>, PipelineError> {
        let features = self.preprocessor.transform_rows(rows)?;
        self.model.predict(&features)
    }

    /// Predictions decoded back to raw label text.
    pub fn predict_labels(&self, batch: &Dataset) -> Result<Vec<String>, PipelineError> {
        let codes = self.predict(batch)?;
        Ok(codes
            .into_iter()
            .map(|code| {
                self.preprocessor
                    .labels
                    .decode(code)
                    .map(str::to_string)
                    .unwrap_or_else(|| code.to_string())
            })
            .collect())
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        persistence::atomic_write(path, &self.to_json_bytes()?)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        persistence::load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::impute::KnnImputer;
    use crate::data::labels::{LabelEncoder, LabelMapping};
    use crate::training::registry::ModelKind;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn bundle() -> NetworkModel {
        let rows: Vec<Vec<Value>> = (0..20)
            .map(|i| {
                let high = i % 2 == 0;
                let base = if high { 10 } else { 0 };
                vec![json!(base + i % 3), json!(base), json!(if high { 1 } else { -1 })]
            })
            .collect();
        let train = Dataset::new(vec!["a".into(), "b".into(), "Result".into()], rows);
        let labels =
            LabelEncoder::new(vec![LabelMapping::new("1", 1), LabelMapping::new("-1", -1)]).unwrap();
        let pre = Preprocessor::fit(&train, "Result", KnnImputer::new(3), labels)
            .unwrap()
            .with_missing_markers(vec!["na".into(), "NA".into()]);
        let x = pre.transform(&train).unwrap();
        let y = pre.encode_target(&train).unwrap();
        let model = FittedModel::fit(ModelKind::DecisionTree, &ParamSet::new(), &x, &y).unwrap();
        NetworkModel::new("Decision Tree", ParamSet::new(), pre, model)
    }

    #[test]
    fn test_predict_by_name_and_position() {
        let model = bundle();
        let batch = Dataset::new(
            vec!["b".into(), "a".into()],
            vec![vec![json!(10), json!(11)], vec![json!(0), Value::Null]],
        );
        assert_eq!(model.predict(&batch).unwrap(), vec![1, -1]);
        assert_eq!(
            model.predict_rows(&[vec![Some(11.0), Some(10.0)], vec![None, Some(0.0)]]).unwrap(),
            vec![1, -1]
        );
        assert_eq!(model.predict_labels(&batch).unwrap(), vec!["1".to_string(), "-1".to_string()]);
    }

    #[test]
    fn test_predict_raw_rows_with_missing_markers() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("batch.csv");
        std::fs::write(&input, "a,b\n11,na\nNA,0\n").unwrap();
        let batch = Dataset::read_csv(&input).unwrap();

        let path = dir.path().join("model.json");
        bundle().save(&path).unwrap();
        let loaded = NetworkModel::load(&path).unwrap();
        assert_eq!(loaded.predict(&batch).unwrap(), vec![1, -1]);
    }

    #[test]
    fn test_missing_feature_column() {
        let batch = Dataset::new(vec!["a".into()], vec![vec![json!(1)]]);
        assert!(bundle().predict(&batch).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model_trainer").join("model.json");
        let model = bundle();
        model.save(&path).unwrap();

        let loaded = NetworkModel::load(&path).unwrap();
        assert_eq!(loaded.model_name, "Decision Tree");
        let rows = vec![vec![Some(2.0), Some(0.0)], vec![Some(12.0), Some(10.0)]];
        assert_eq!(loaded.predict_rows(&rows).unwrap(), model.predict_rows(&rows).unwrap());
    }

    #[test]
    fn test_empty_batch() {
        let batch = Dataset::new(vec!["a".into(), "b".into()], Vec::new());
        assert!(bundle().predict(&batch).unwrap().is_empty());
    }
}
