//! Two-sample Kolmogorov–Smirnov drift detection.

use crate::data::dataset::Dataset;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a two-sample KS test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    /// Largest absolute gap between the two empirical CDFs.
    pub statistic: f64,
    pub p_value: f64,
}

/// Per-column drift outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_detected: bool,
    pub statistic: f64,
}

/// Drift outcome of every compared column, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftReport {
    pub columns: BTreeMap<String, ColumnDrift>,
}

impl DriftReport {
    pub fn any_drift(&self) -> bool {
        self.columns.values().any(|c| c.drift_detected)
    }

    pub fn drifted_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.drift_detected)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Two-sample KS test. NaNs must already be removed.
///
/// Returns `None` when either sample is empty.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> Option<KsResult> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    // step both CDFs past every copy of the next value so ties are handled
    while i < n && j < m {
        let v = a[i].min(b[j]);
        while i < n && a[i] <= v {
            i += 1;
        }
        while j < m && b[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    Some(KsResult {
        statistic: d,
        p_value: kolmogorov_survival(lambda).clamp(0.0, 1.0),
    })
}

/// `Q_KS(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`, the asymptotic KS tail probability.
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut term_prev: f64 = 0.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS1 * term_prev || term.abs() <= EPS2 * sum {
            return sum;
        }
        fac = -fac;
        term_prev = term.abs();
    }
    // series did not converge: λ is tiny and the samples are indistinguishable
    1.0
}

/// Compare `columns` between a base and a current dataset.
pub fn detect_drift(
    base: &Dataset,
    current: &Dataset,
    columns: &[String],
    threshold: f64,
) -> Result<DriftReport, PipelineError> {
    let mut report = DriftReport::default();
    for column in columns {
        if !base.has_column(column) || !current.has_column(column) {
            continue;
        }
        let a: Vec<f64> = base.numeric_column(column)?.into_iter().flatten().collect();
        let b: Vec<f64> = current
            .numeric_column(column)?
            .into_iter()
            .flatten()
            .collect();

        let entry = match ks_2samp(&a, &b) {
            Some(ks) => ColumnDrift {
                p_value: ks.p_value,
                drift_detected: ks.p_value < threshold,
                statistic: ks.statistic,
            },
            None => {
                tracing::warn!(column = %column, "no observed values to compare, skipping drift test");
                ColumnDrift {
                    p_value: 1.0,
                    drift_detected: false,
                    statistic: 0.0,
                }
            }
        };
        if entry.drift_detected {
            tracing::info!(column = %column, p_value = entry.p_value, "drift detected");
        }
        report.columns.insert(column.clone(), entry);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    #[test]
    fn test_identical_samples_have_no_gap() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let ks = ks_2samp(&a, &a).unwrap();
        assert_eq!(ks.statistic, 0.0);
        assert_eq!(ks.p_value, 1.0);
    }

    #[test]
    fn test_disjoint_samples() {
        let a: Vec<f64> = (0..50).map(f64::from).collect();
        let b: Vec<f64> = (100..150).map(f64::from).collect();
        let ks = ks_2samp(&a, &b).unwrap();
        assert_eq!(ks.statistic, 1.0);
        assert!(ks.p_value < 1e-6);
    }

    #[test]
    fn test_ties_are_handled() {
        let a = vec![0.0, 0.0, 1.0, 1.0];
        let b = vec![0.0, 1.0, 1.0, 1.0];
        let ks = ks_2samp(&a, &b).unwrap();
        assert!((ks.statistic - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sample() {
        assert!(ks_2samp(&[], &[1.0]).is_none());
    }

    #[test]
    fn test_survival_bounds() {
        assert_eq!(kolmogorov_survival(0.0), 1.0);
        assert!(kolmogorov_survival(3.0) < 1e-6);
        let mid = kolmogorov_survival(1.36);
        assert!((mid - 0.05).abs() < 0.01, "Q(1.36) ~ 0.05, got {mid}");
    }

    #[test]
    fn test_same_distribution_rarely_drifts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut no_drift = 0;
        for _ in 0..20 {
            let mut sample: Vec<f64> = (0..100).map(|_| rng.gen_range(0.0..1.0)).collect();
            sample.shuffle(&mut rng);
            let ks = ks_2samp(&sample[..70], &sample[70..]).unwrap();
            if ks.p_value >= 0.05 {
                no_drift += 1;
            }
        }
        assert!(no_drift >= 15, "only {no_drift}/20 trials reported no drift");
    }

    #[test]
    fn test_shifted_distribution_drifts() {
        let mut rng = StdRng::seed_from_u64(11);
        let a: Vec<f64> = (0..70).map(|_| rng.gen_range(0.0..1.0)).collect();
        let b: Vec<f64> = (0..30).map(|_| rng.gen_range(2.0..3.0)).collect();
        assert!(ks_2samp(&a, &b).unwrap().p_value < 0.05);
    }

    #[test]
    fn test_detect_drift_report() {
        let base = Dataset::new(
            vec!["x".into(), "y".into()],
            (0..40).map(|i| vec![json!(i), json!(i % 3)]).collect(),
        );
        let current = Dataset::new(
            vec!["x".into(), "y".into()],
            (0..20).map(|i| vec![json!(i + 1000), json!(i % 3)]).collect(),
        );
        let columns = vec!["x".to_string(), "y".to_string(), "absent".to_string()];
        let report = detect_drift(&base, &current, &columns, 0.05).unwrap();

        assert_eq!(report.columns.len(), 2);
        assert!(report.columns["x"].drift_detected);
        assert!(!report.columns["y"].drift_detected);
        assert_eq!(report.drifted_columns(), vec!["x"]);
        assert!(report.any_drift());
    }
}
