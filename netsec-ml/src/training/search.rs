//! Grid search with stratified k-fold cross-validation.

use crate::error::PipelineError;
use crate::training::estimator::FittedModel;
use crate::training::metrics::accuracy;
use crate::training::registry::{ModelKind, ParamSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CrossValidation {
    pub n_folds: usize,
}

impl Default for CrossValidation {
    fn default() -> Self {
        Self { n_folds: 3 }
    }
}

/// Cross-validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
            metric_name: metric_name.to_string(),
        }
    }
}

/// Held-out indices of each fold.
///
/// Rows are grouped by class (ascending), then dealt to folds round-robin
/// with one counter running across all classes, so every fold gets a
/// near-equal share of each class.
pub fn stratified_folds(y: &[i32], n_folds: usize) -> Result<Vec<Vec<usize>>, PipelineError> {
    if n_folds < 2 {
        return Err(PipelineError::config(format!(
            "cross-validation needs at least 2 folds, got {n_folds}"
        )));
    }
    if y.len() < n_folds {
        return Err(PipelineError::training(format!(
            "{} rows cannot fill {n_folds} folds",
            y.len()
        )));
    }
    let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }

    let mut folds = vec![Vec::new(); n_folds];
    let mut next = 0usize;
    for indices in by_class.values() {
        for &idx in indices {
            folds[next % n_folds].push(idx);
            next += 1;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Mean fold accuracy of one parameter set.
pub fn cross_validate(
    kind: ModelKind,
    params: &ParamSet,
    x: &[Vec<f64>],
    y: &[i32],
    folds: &[Vec<usize>],
) -> Result<CrossValidationResult, PipelineError> {
    let mut scores = Vec::with_capacity(folds.len());
    for held_out in folds {
        let mut is_held_out = vec![false; y.len()];
        for &i in held_out {
            is_held_out[i] = true;
        }
        let (mut x_fit, mut y_fit) = (Vec::new(), Vec::new());
        let (mut x_eval, mut y_eval) = (Vec::new(), Vec::new());
        for (i, row) in x.iter().enumerate() {
            if is_held_out[i] {
                x_eval.push(row.clone());
                y_eval.push(y[i]);
            } else {
                x_fit.push(row.clone());
                y_fit.push(y[i]);
            }
        }
        let model = FittedModel::fit(kind, params, &x_fit, &y_fit)?;
        scores.push(accuracy(&y_eval, &model.predict(&x_eval)?));
    }
    Ok(CrossValidationResult::from_scores(scores, "accuracy"))
}

/// Best parameter set by mean CV accuracy. Sets whose folds fail to fit
/// are skipped; `None` when every set failed.
pub fn grid_search(
    kind: ModelKind,
    candidates: &[ParamSet],
    x: &[Vec<f64>],
    y: &[i32],
    cv: CrossValidation,
) -> Result<Option<(ParamSet, CrossValidationResult)>, PipelineError> {
    let folds = stratified_folds(y, cv.n_folds)?;
    let mut scored = Vec::with_capacity(candidates.len());
    for params in candidates {
        match cross_validate(kind, params, x, y, &folds) {
            Ok(result) => {
                tracing::debug!(
                    model = ?kind,
                    params = ?params,
                    mean = result.mean_score,
                    std = result.std_score,
                    "parameter set scored"
                );
                let score = result.mean_score;
                scored.push(((params.clone(), result), score));
            }
            Err(e) => {
                tracing::warn!(model = ?kind, params = ?params, error = %e, "skipping parameter set");
            }
        }
    }
    Ok(select_best(scored).map(|(best, _)| best))
}

/// Strictly highest score wins; among equal scores the first one is kept.
pub fn select_best<T>(scored: impl IntoIterator<Item = (T, f64)>) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for (item, score) in scored {
        let better = match &best {
            None => true,
            Some((_, current)) => score > *current,
        };
        if better {
            best = Some((item, score));
        }
    }
    best
}
