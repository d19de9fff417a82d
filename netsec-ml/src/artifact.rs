//! Stage output artifacts.
//!
//! Each stage hands the next one exactly these paths and nothing else. An
//! artifact exists only if its stage completed.

use crate::training::metrics::ClassificationMetrics;
use crate::training::registry::ParamSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub feature_store_file_path: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    /// `true` when no column drifted between the splits.
    pub validation_status: bool,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub best_model_name: String,
    pub best_params: ParamSet,
    /// Held-out accuracy the model was selected on.
    pub test_score: f64,
    pub train_metric_artifact: ClassificationMetrics,
    pub test_metric_artifact: ClassificationMetrics,
}
