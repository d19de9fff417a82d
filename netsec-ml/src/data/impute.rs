//! K-nearest-neighbour imputation of missing numeric features.
//!
//! [`KnnImputer::fit`] captures the training split; the resulting
//! [`FittedImputer`] only ever reads that state, so applying it to the test
//! split (or to inference batches) cannot leak anything back into it.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Unfitted imputer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnImputer {
    pub n_neighbors: usize,
}

impl Default for KnnImputer {
    fn default() -> Self {
        Self { n_neighbors: 3 }
    }
}

impl KnnImputer {
    pub fn new(n_neighbors: usize) -> Self {
        Self { n_neighbors }
    }

    /// Fit on the training split.
    pub fn fit(&self, train: &[Vec<Option<f64>>]) -> Result<FittedImputer, PipelineError> {
        if self.n_neighbors == 0 {
            return Err(PipelineError::config("imputer needs at least one neighbour"));
        }
        let width = train
            .first()
            .map(|r| r.len())
            .ok_or_else(|| PipelineError::dataset("cannot fit the imputer on an empty split"))?;
        if let Some(pos) = train.iter().position(|r| r.len() != width) {
            return Err(PipelineError::dataset(format!(
                "row {pos} has {} features, expected {width}",
                train[pos].len()
            )));
        }

        let mut column_means = Vec::with_capacity(width);
        for col in 0..width {
            let observed: Vec<f64> = train.iter().filter_map(|r| r[col]).collect();
            if observed.is_empty() {
                return Err(PipelineError::dataset(format!(
                    "feature {col} has no observed values in the training split"
                )));
            }
            column_means.push(observed.iter().sum::<f64>() / observed.len() as f64);
        }

        Ok(FittedImputer {
            n_neighbors: self.n_neighbors,
            width,
            donors: train.to_vec(),
            column_means,
        })
    }
}

/// Imputer state captured from the training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedImputer {
    n_neighbors: usize,
    width: usize,
    donors: Vec<Vec<Option<f64>>>,
    column_means: Vec<f64>,
}

impl FittedImputer {
    pub fn n_features(&self) -> usize {
        self.width
    }

    pub fn column_means(&self) -> &[f64] {
        &self.column_means
    }

    /// Fill every missing cell. Complete rows pass through unchanged.
    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>, PipelineError> {
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                if row.len() != self.width {
                    return Err(PipelineError::dataset(format!(
                        "row {idx} has {} features, imputer was fitted on {}",
                        row.len(),
                        self.width
                    )));
                }
                Ok(self.impute_row(row))
            })
            .collect()
    }

    fn impute_row(&self, row: &[Option<f64>]) -> Vec<f64> {
        if row.iter().all(Option::is_some) {
            return row.iter().map(|v| v.unwrap_or_default()).collect();
        }

        // distances to every donor, computed once per row
        let distances: Vec<Option<f64>> = self
            .donors
            .iter()
            .map(|donor| nan_euclidean(row, donor))
            .collect();

        row.iter()
            .enumerate()
            .map(|(col, value)| match value {
                Some(v) => *v,
                None => self.fill(col, &distances),
            })
            .collect()
    }

    fn fill(&self, col: usize, distances: &[Option<f64>]) -> f64 {
        let mut candidates: Vec<(usize, f64)> = distances
            .iter()
            .enumerate()
            .filter_map(|(i, d)| {
                let d = (*d)?;
                self.donors[i][col].map(|_| (i, d))
            })
            .collect();
        if candidates.is_empty() {
            return self.column_means[col];
        }
        // stable sort keeps training order among equal distances
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let chosen = &candidates[..candidates.len().min(self.n_neighbors)];
        let sum: f64 = chosen
            .iter()
            .filter_map(|(i, _)| self.donors[*i][col])
            .sum();
        sum / chosen.len() as f64
    }
}

/// Euclidean distance over co-observed coordinates, scaled up for the missing ones.
/// `None` when the two rows share no observed coordinate.
pub fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut present = 0usize;
    let mut sq = 0.0;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            present += 1;
            sq += (x - y).powi(2);
        }
    }
    if present == 0 {
        return None;
    }
    let weight = a.len() as f64 / present as f64;
    Some((weight * sq).sqrt())
}
