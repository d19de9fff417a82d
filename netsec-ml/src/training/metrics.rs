//! Classification metrics.

use serde::{Deserialize, Serialize};

/// Binary classification scores for the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

impl ClassificationMetrics {
    pub fn zero() -> Self {
        Self {
            f1_score: 0.0,
            precision_score: 0.0,
            recall_score: 0.0,
        }
    }
}

/// F1, precision and recall of `positive` predictions.
///
/// A zero denominator scores 0. When fewer than two distinct classes occur
/// across truths and predictions together, every score is 0.
pub fn classification_score(truth: &[i32], predicted: &[i32], positive: i32) -> ClassificationMetrics {
    let mut classes: Vec<i32> = truth.iter().chain(predicted).copied().collect();
    classes.sort_unstable();
    classes.dedup();
    if classes.len() < 2 {
        return ClassificationMetrics::zero();
    }

    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t == positive, p == positive) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassificationMetrics {
        f1_score: f1,
        precision_score: precision,
        recall_score: recall,
    }
}

/// Fraction of positions where prediction equals truth. Empty input scores 0.
pub fn accuracy(truth: &[i32], predicted: &[i32]) -> f64 {
    let n = truth.len().min(predicted.len());
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    ratio(correct, n)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
