//! Configuration for the training pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace `netsec.toml` -> explicit file -> `NETSEC_*` environment.
//! [`RunLayout`] turns a loaded config plus a run timestamp into the
//! deterministic per-stage artifact paths.

use crate::data::source::DataSourceType;
use crate::data::labels::LabelMapping;
use crate::error::PipelineError;
use chrono::{DateTime, TimeZone};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Format of the per-run directory name.
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name used for the run span and tracking metadata.
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    /// Root under which each run gets a timestamped directory.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Expected-schema YAML file.
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Directory that receives a copy of the final bundle and preprocessor.
    #[serde(default)]
    pub publish_dir: Option<PathBuf>,
    /// Directory for run-scoped log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Exported document-store collection to ingest.
    #[serde(default = "default_source")]
    pub source: DataSourceType,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub transformation: TransformationConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: default_pipeline_name(),
            artifact_dir: default_artifact_dir(),
            schema_path: default_schema_path(),
            publish_dir: None,
            log_dir: default_log_dir(),
            source: default_source(),
            ingestion: IngestionConfig::default(),
            validation: ValidationConfig::default(),
            transformation: TransformationConfig::default(),
            trainer: TrainerConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

fn default_pipeline_name() -> String {
    "NetworkSecurity".to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("Artifacts")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("data_schema").join("schema.yaml")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_source() -> DataSourceType {
    DataSourceType::Json {
        path: PathBuf::from("Network_Data").join("NetworkData.json"),
    }
}

/// Data ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Fraction of rows held out as the test split.
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    /// Seed for the shuffle before splitting.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_feature_store_file_name")]
    pub feature_store_file_name: String,
    /// Columns removed right after loading (the store's document id).
    #[serde(default = "default_drop_columns")]
    pub drop_columns: Vec<String>,
    /// String cells treated as missing.
    #[serde(default = "default_missing_markers")]
    pub missing_markers: Vec<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            test_ratio: default_test_ratio(),
            seed: default_seed(),
            feature_store_file_name: default_feature_store_file_name(),
            drop_columns: default_drop_columns(),
            missing_markers: default_missing_markers(),
        }
    }
}

fn default_test_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_feature_store_file_name() -> String {
    "phisingData.csv".to_string()
}

fn default_drop_columns() -> Vec<String> {
    vec!["_id".to_string()]
}

fn default_missing_markers() -> Vec<String> {
    ["na", "NA", "NaN", "nan", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Data validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// KS-test significance level; a column drifts when its p-value is below it.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    /// Abort the run when any column drifts.
    #[serde(default)]
    pub drift_is_fatal: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            drift_threshold: default_drift_threshold(),
            drift_is_fatal: false,
        }
    }
}

fn default_drift_threshold() -> f64 {
    0.05
}

/// Data transformation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(default = "default_imputer_neighbors")]
    pub imputer_neighbors: usize,
    /// Target label vocabulary. Must be injective.
    #[serde(default = "default_labels")]
    pub labels: Vec<LabelMapping>,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            imputer_neighbors: default_imputer_neighbors(),
            labels: default_labels(),
        }
    }
}

fn default_imputer_neighbors() -> usize {
    3
}

fn default_labels() -> Vec<LabelMapping> {
    vec![LabelMapping::new("1", 1), LabelMapping::new("-1", -1)]
}

/// Model trainer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Folds used by the grid search on the training split.
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Encoded label treated as the positive class for f1/precision/recall.
    #[serde(default = "default_positive_code")]
    pub positive_code: i32,
    /// Minimum acceptable test accuracy for the winning model.
    #[serde(default)]
    pub expected_score: Option<f64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            cv_folds: default_cv_folds(),
            positive_code: default_positive_code(),
            expected_score: None,
        }
    }
}

fn default_cv_folds() -> usize {
    3
}

fn default_positive_code() -> i32 {
    1
}

/// Experiment tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tracking_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_tracking_dir(),
            experiment_name: default_experiment_name(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

fn default_experiment_name() -> String {
    "NetworkSecurityExperiment".to_string()
}

impl PipelineConfig {
    /// Reject settings no stage can run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let ratio = self.ingestion.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::config(format!(
                "ingestion.test_ratio must be in (0, 1), got {ratio}"
            )));
        }
        let threshold = self.validation.drift_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(PipelineError::config(format!(
                "validation.drift_threshold must be in (0, 1), got {threshold}"
            )));
        }
        if self.transformation.imputer_neighbors == 0 {
            return Err(PipelineError::config(
                "transformation.imputer_neighbors must be at least 1",
            ));
        }
        if self.trainer.cv_folds < 2 {
            return Err(PipelineError::config(format!(
                "trainer.cv_folds must be at least 2, got {}",
                self.trainer.cv_folds
            )));
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `NETSEC_`, nested keys split on `__`)
/// 2. Explicit config file (`--config`)
/// 3. Workspace config (`netsec.toml`)
/// 4. User config (`~/.config/netsec/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<PipelineConfig, PipelineError> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "netsec", "netsec") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join("netsec.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(PipelineError::missing_resource(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    // NETSEC_VALIDATION__DRIFT_THRESHOLD, NETSEC_TRAINER__CV_FOLDS, etc.
    figment = figment.merge(Env::prefixed("NETSEC_").split("__"));

    let config: PipelineConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Artifact paths of one run, keyed by stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLayout {
    pub timestamp: String,
    pub root: PathBuf,
    feature_store_file_name: String,
}

/// Output paths of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionPaths {
    pub feature_store_file: PathBuf,
    pub train_file: PathBuf,
    pub test_file: PathBuf,
}

/// Output paths of the validation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPaths {
    pub valid_train_file: PathBuf,
    pub valid_test_file: PathBuf,
    pub drift_report_file: PathBuf,
}

/// Output paths of the transformation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationPaths {
    pub transformed_train_file: PathBuf,
    pub transformed_test_file: PathBuf,
    pub transformed_object_file: PathBuf,
}

/// Output paths of the model trainer stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerPaths {
    pub trained_model_file: PathBuf,
}

impl RunLayout {
    /// Layout for a run started at `started_at`.
    pub fn new<Tz: TimeZone>(config: &PipelineConfig, started_at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let timestamp = started_at.format(TIMESTAMP_FORMAT).to_string();
        Self::from_timestamp(config, &timestamp)
    }

    /// Layout for an explicit, already formatted run timestamp.
    pub fn from_timestamp(config: &PipelineConfig, timestamp: &str) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            root: config.artifact_dir.join(timestamp),
            feature_store_file_name: config.ingestion.feature_store_file_name.clone(),
        }
    }

    pub fn ingestion(&self) -> IngestionPaths {
        let dir = self.root.join("data_ingestion");
        IngestionPaths {
            feature_store_file: dir
                .join("feature_store")
                .join(&self.feature_store_file_name),
            train_file: dir.join("ingested").join("train.csv"),
            test_file: dir.join("ingested").join("test.csv"),
        }
    }

    pub fn validation(&self) -> ValidationPaths {
        let dir = self.root.join("data_validation");
        ValidationPaths {
            valid_train_file: dir.join("validated").join("train.csv"),
            valid_test_file: dir.join("validated").join("test.csv"),
            drift_report_file: dir.join("drift_report").join("report.yaml"),
        }
    }

    pub fn transformation(&self) -> TransformationPaths {
        let dir = self.root.join("data_transformation");
        TransformationPaths {
            transformed_train_file: dir.join("transformed").join("train.npy"),
            transformed_test_file: dir.join("transformed").join("test.npy"),
            transformed_object_file: dir.join("transformed_object").join("preprocessing.json"),
        }
    }

    pub fn trainer(&self) -> TrainerPaths {
        TrainerPaths {
            trained_model_file: self
                .root
                .join("model_trainer")
                .join("trained_model")
                .join("model.json"),
        }
    }
}
