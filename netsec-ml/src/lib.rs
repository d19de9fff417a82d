//! # netsec-ml: network-security classifier training pipeline
//!
//! Turns an exported document collection of labelled network/URL features
//! into a deployable classifier in four strictly sequential stages:
//!
//! 1. **Ingestion**: load every record, persist a feature store, seeded train/test split.
//! 2. **Validation**: schema conformance and per-column KS drift between the splits.
//! 3. **Transformation**: KNN imputation fitted on train, label encoding, `.npy` arrays.
//! 4. **Training**: cross-validated grid search over several classifiers, best-model
//!    selection, bundling with the preprocessor and experiment tracking.
//!
//! Every stage writes its outputs under `<artifact_dir>/<timestamp>/` and hands the
//! next stage an artifact describing where they are.

pub mod artifact;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod persistence;
pub mod pipeline;
pub mod training;

pub use artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, ModelTrainerArtifact,
};
pub use config::{PipelineConfig, RunLayout, load_config};
pub use context::RunContext;
pub use data::{Dataset, DataSourceType, Schema};
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{PipelineOutcome, TrainingPipeline};
pub use training::{ExperimentTracker, FileTracker, NetworkModel, NoopTracker};
