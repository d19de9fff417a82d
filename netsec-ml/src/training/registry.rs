//! Candidate classifiers and their hyperparameter grids.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// One hyperparameter assignment.
pub type ParamSet = BTreeMap<String, Value>;

/// Classifier families the trainer can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    DecisionTree,
    LogisticRegression,
    KNearestNeighbors,
}

/// Ordered hyperparameter axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<Value>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, name: &str, values: Vec<Value>) -> Self {
        self.axes.push((name.to_string(), values));
        self
    }

    pub fn axes(&self) -> &[(String, Vec<Value>)] {
        &self.axes
    }

    /// Cartesian product of the axes. The last axis varies fastest, and an
    /// empty grid yields a single empty set.
    pub fn expand(&self) -> Vec<ParamSet> {
        let mut sets = vec![ParamSet::new()];
        for (key, values) in &self.axes {
            let mut next = Vec::with_capacity(sets.len() * values.len());
            for set in &sets {
                for value in values {
                    let mut s = set.clone();
                    s.insert(key.clone(), value.clone());
                    next.push(s);
                }
            }
            sets = next;
        }
        sets
    }
}

/// A named classifier with the grid it is tuned over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub name: String,
    pub kind: ModelKind,
    pub grid: ParamGrid,
}

impl ModelCandidate {
    pub fn new(name: &str, kind: ModelKind, grid: ParamGrid) -> Self {
        Self {
            name: name.to_string(),
            kind,
            grid,
        }
    }
}

/// The fixed candidate list, in evaluation order.
///
/// smartcore ships no gradient boosting or AdaBoost classifier, so
/// K-Nearest Neighbors stands in for the boosted ensembles.
pub fn default_registry() -> Vec<ModelCandidate> {
    vec![
        ModelCandidate::new(
            "Random Forest",
            ModelKind::RandomForest,
            ParamGrid::new().with_axis("n_trees", vec![json!(16), json!(32), json!(64)]),
        ),
        ModelCandidate::new(
            "Decision Tree",
            ModelKind::DecisionTree,
            ParamGrid::new().with_axis("criterion", vec![json!("gini"), json!("entropy")]),
        ),
        ModelCandidate::new(
            "Logistic Regression",
            ModelKind::LogisticRegression,
            ParamGrid::new(),
        ),
        ModelCandidate::new(
            "K-Nearest Neighbors",
            ModelKind::KNearestNeighbors,
            ParamGrid::new().with_axis("k", vec![json!(3), json!(5), json!(7)]),
        ),
    ]
}
