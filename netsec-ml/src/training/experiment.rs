//! Experiment tracking.
//!
//! The trainer reports each completed run through [`ExperimentTracker`].
//! [`FileTracker`] keeps runs on local disk, one directory per run:
//!
//! ```text
//! <dir>/<experiment>/runs.json
//! <dir>/<experiment>/<run_id>/run.json
//! <dir>/<experiment>/<run_id>/model.json
//! ```

use crate::error::PipelineError;
use crate::persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything logged for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRun {
    pub experiment_name: String,
    pub params: BTreeMap<String, Value>,
    pub metrics: BTreeMap<String, f64>,
    /// Serialized model bundle.
    pub model_blob: Vec<u8>,
}

/// Sink for completed runs.
pub trait ExperimentTracker: Send + Sync {
    fn log_run(&self, run: &TrackedRun) -> Result<(), PipelineError>;
}

/// Tracker used when tracking is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log_run(&self, _run: &TrackedRun) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Persisted record of one run (`run.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment_name: String,
    pub params: BTreeMap<String, Value>,
    pub metrics: BTreeMap<String, f64>,
    pub model_sha256: String,
    pub logged_at: DateTime<Utc>,
}

/// One line of the experiment index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub model_name: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub logged_at: DateTime<Utc>,
}

/// Index of all runs of one experiment (`runs.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentRegistry {
    pub runs: Vec<RunSummary>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn add(&mut self, run: RunSummary) {
        self.runs.push(run);
    }

    pub fn find(&self, run_id: &str) -> Option<&RunSummary> {
        self.runs.iter().find(|r| r.run_id == run_id)
    }

    /// Run with the highest value of `metric`; earlier runs win ties.
    pub fn best_by(&self, metric: &str) -> Option<&RunSummary> {
        let mut best: Option<(&RunSummary, f64)> = None;
        for run in &self.runs {
            if let Some(&value) = run.metrics.get(metric) {
                if best.is_none_or(|(_, b)| value > b) {
                    best = Some((run, value));
                }
            }
        }
        best.map(|(run, _)| run)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        persistence::load_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        persistence::atomic_write_json(path, self)
    }
}

/// Tracker writing runs under a local directory.
#[derive(Debug, Clone)]
pub struct FileTracker {
    dir: PathBuf,
}

impl FileTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn experiment_dir(&self, experiment_name: &str) -> PathBuf {
        self.dir.join(experiment_name)
    }

    pub fn registry(&self, experiment_name: &str) -> Result<ExperimentRegistry, PipelineError> {
        ExperimentRegistry::load(&self.experiment_dir(experiment_name).join("runs.json"))
    }
}

impl ExperimentTracker for FileTracker {
    fn log_run(&self, run: &TrackedRun) -> Result<(), PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let experiment_dir = self.experiment_dir(&run.experiment_name);
        let run_dir = experiment_dir.join(&run_id);
        let logged_at = Utc::now();

        persistence::atomic_write(&run_dir.join("model.json"), &run.model_blob)?;
        let record = RunRecord {
            run_id: run_id.clone(),
            experiment_name: run.experiment_name.clone(),
            params: run.params.clone(),
            metrics: run.metrics.clone(),
            model_sha256: persistence::hash_bytes(&run.model_blob),
            logged_at,
        };
        persistence::atomic_write_json(&run_dir.join("run.json"), &record)?;

        let index_path = experiment_dir.join("runs.json");
        let mut registry = ExperimentRegistry::load(&index_path)?;
        registry.add(RunSummary {
            run_id: run_id.clone(),
            model_name: run
                .params
                .get("model_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            metrics: run.metrics.clone(),
            logged_at,
        });
        registry.save(&index_path)?;

        tracing::info!(run_id = %run_id, experiment = %run.experiment_name, "run logged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn run(f1: f64) -> TrackedRun {
        TrackedRun {
            experiment_name: "NetworkSecurityExperiment".into(),
            params: BTreeMap::from([
                ("model_name".to_string(), json!("Random Forest")),
                ("n_trees".to_string(), json!(32)),
            ]),
            metrics: BTreeMap::from([("test_f1_score".to_string(), f1)]),
            model_blob: b"{\"model\":true}".to_vec(),
        }
    }

    #[test]
    fn test_file_tracker_layout() {
        let dir = TempDir::new().unwrap();
        let tracker = FileTracker::new(dir.path().join("mlruns"));
        tracker.log_run(&run(0.9)).unwrap();
        tracker.log_run(&run(0.95)).unwrap();

        let registry = tracker.registry("NetworkSecurityExperiment").unwrap();
        assert_eq!(registry.runs.len(), 2);
        let best = registry.best_by("test_f1_score").unwrap();
        assert_eq!(best.metrics["test_f1_score"], 0.95);
        assert_eq!(best.model_name.as_deref(), Some("Random Forest"));

        let run_dir = tracker
            .experiment_dir("NetworkSecurityExperiment")
            .join(&best.run_id);
        let record: RunRecord = persistence::load_json(&run_dir.join("run.json")).unwrap();
        assert_eq!(record.params["n_trees"], json!(32));
        assert_eq!(record.model_sha256, persistence::hash_bytes(b"{\"model\":true}"));
        assert_eq!(std::fs::read(run_dir.join("model.json")).unwrap(), b"{\"model\":true}");
    }

    #[test]
    fn test_missing_registry_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = ExperimentRegistry::load(&dir.path().join("runs.json")).unwrap();
        assert!(registry.runs.is_empty());
        assert!(registry.best_by("test_f1_score").is_none());
    }

    #[test]
    fn test_noop_tracker() {
        assert!(NoopTracker.log_run(&run(0.5)).is_ok());
    }
}
