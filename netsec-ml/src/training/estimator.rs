//! Fitted `smartcore` classifiers behind one enum.

use crate::error::PipelineError;
use crate::training::registry::{ModelKind, ParamSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::metrics::distance::euclidian::Euclidian;
use smartcore::neighbors::knn_classifier::{KNNClassifier, KNNClassifierParameters};
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::fmt;

type Matrix = DenseMatrix<f64>;
type Labels = Vec<i32>;

/// A classifier fitted on integer-coded labels.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum FittedModel {
    RandomForest(RandomForestClassifier<f64, i32, Matrix, Labels>),
    DecisionTree(DecisionTreeClassifier<f64, i32, Matrix, Labels>),
    LogisticRegression(LogisticRegression<f64, i32, Matrix, Labels>),
    KNearestNeighbors(KNNClassifier<f64, i32, Matrix, Labels, Euclidian<f64>>),
}

impl fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FittedModel").field(&self.kind()).finish()
    }
}

impl FittedModel {
    /// Fit `kind` with `params` on feature rows `x` and labels `y`.
    pub fn fit(
        kind: ModelKind,
        params: &ParamSet,
        x: &[Vec<f64>],
        y: &[i32],
    ) -> Result<Self, PipelineError> {
        if x.len() != y.len() {
            return Err(PipelineError::training(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let matrix = to_matrix(x)?;
        let labels: Labels = y.to_vec();

        let model = match kind {
            ModelKind::RandomForest => {
                let n_trees = param_u16(params, "n_trees", 100)?;
                let parameters = RandomForestClassifierParameters::default().with_n_trees(n_trees);
                Self::RandomForest(RandomForestClassifier::fit(&matrix, &labels, parameters)?)
            }
            ModelKind::DecisionTree => {
                let criterion = match param_str(params, "criterion")?.unwrap_or("gini") {
                    "gini" => SplitCriterion::Gini,
                    "entropy" => SplitCriterion::Entropy,
                    other => {
                        return Err(PipelineError::training(format!(
                            "unknown split criterion '{other}'"
                        )));
                    }
                };
                let parameters = DecisionTreeClassifierParameters::default().with_criterion(criterion);
                Self::DecisionTree(DecisionTreeClassifier::fit(&matrix, &labels, parameters)?)
            }
            ModelKind::LogisticRegression => Self::LogisticRegression(LogisticRegression::fit(
                &matrix,
                &labels,
                LogisticRegressionParameters::default(),
            )?),
            ModelKind::KNearestNeighbors => {
                let k = param_usize(params, "k", 5)?;
                if k > x.len() {
                    return Err(PipelineError::training(format!(
                        "k={k} exceeds the {} training rows",
                        x.len()
                    )));
                }
                let parameters = KNNClassifierParameters::default().with_k(k);
                Self::KNearestNeighbors(KNNClassifier::fit(&matrix, &labels, parameters)?)
            }
        };
        Ok(model)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::DecisionTree(_) => ModelKind::DecisionTree,
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::KNearestNeighbors(_) => ModelKind::KNearestNeighbors,
        }
    }

    /// One predicted code per input row.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<i32>, PipelineError> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(x)?;
        let predicted = match self {
            Self::RandomForest(m) => m.predict(&matrix)?,
            Self::DecisionTree(m) => m.predict(&matrix)?,
            Self::LogisticRegression(m) => m.predict(&matrix)?,
            Self::KNearestNeighbors(m) => m.predict(&matrix)?,
        };
        Ok(predicted)
    }
}

/// Dense matrix from non-empty rows of equal width.
pub fn to_matrix(rows: &[Vec<f64>]) -> Result<Matrix, PipelineError> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if rows.is_empty() || width == 0 {
        return Err(PipelineError::training(format!(
            "cannot build a ({}, {width}) matrix",
            rows.len()
        )));
    }
    if let Some(pos) = rows.iter().position(|r| r.len() != width) {
        return Err(PipelineError::training(format!(
            "row {pos} has {} features, expected {width}",
            rows[pos].len()
        )));
    }
    Ok(DenseMatrix::from_2d_vec(&rows.to_vec()))
}

fn param_u64(params: &ParamSet, key: &str, default: u64) -> Result<u64, PipelineError> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v.as_u64().ok_or_else(|| {
            PipelineError::training(format!("parameter '{key}' must be a non-negative integer, got {v}"))
        }),
    }
}

fn param_u16(params: &ParamSet, key: &str, default: u16) -> Result<u16, PipelineError> {
    let v = param_u64(params, key, u64::from(default))?;
    u16::try_from(v)
        .map_err(|_| PipelineError::training(format!("parameter '{key}' is out of range: {v}")))
}

fn param_usize(params: &ParamSet, key: &str, default: usize) -> Result<usize, PipelineError> {
    let v = param_u64(params, key, default as u64)?;
    usize::try_from(v)
        .map_err(|_| PipelineError::training(format!("parameter '{key}' is out of range: {v}")))
}

fn param_str<'a>(params: &'a ParamSet, key: &str) -> Result<Option<&'a str>, PipelineError> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(v) => Err(PipelineError::training(format!(
            "parameter '{key}' must be a string, got {v}"
        ))),
    }
}
