//! Training: candidate models, grid search, selection, bundling, tracking.

pub mod bundle;
pub mod estimator;
pub mod experiment;
pub mod metrics;
pub mod registry;
pub mod search;
pub mod trainer;

pub use bundle::NetworkModel;
pub use estimator::FittedModel;
pub use experiment::{ExperimentRegistry, ExperimentTracker, FileTracker, NoopTracker, TrackedRun};
pub use metrics::{ClassificationMetrics, classification_score};
pub use registry::{ModelCandidate, ModelKind, ParamGrid, ParamSet, default_registry};
pub use search::{CrossValidation, CrossValidationResult};
pub use trainer::{CandidateReport, ModelTrainer};
