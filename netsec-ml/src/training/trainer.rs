//! Model trainer stage: tune every candidate, keep the best, bundle and log it.

use crate::artifact::{DataTransformationArtifact, ModelTrainerArtifact};
use crate::config::{TrainerConfig, TrainerPaths};
use crate::context::RunContext;
use crate::data::array::NumericArray;
use crate::data::transform::Preprocessor;
use crate::error::PipelineError;
use crate::persistence;
use crate::training::bundle::NetworkModel;
use crate::training::estimator::FittedModel;
use crate::training::experiment::{ExperimentTracker, TrackedRun};
use crate::training::metrics::{ClassificationMetrics, accuracy, classification_score};
use crate::training::registry::{ModelCandidate, ModelKind, ParamSet, default_registry};
use crate::training::search::{CrossValidation, CrossValidationResult, grid_search, select_best};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of tuning and refitting one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub name: String,
    pub kind: ModelKind,
    pub params: ParamSet,
    pub cv: CrossValidationResult,
    /// Accuracy on the test split after refitting on the full train split.
    pub test_score: f64,
}

struct TrainedCandidate {
    report: CandidateReport,
    model: FittedModel,
}

/// Labels stored as `f64` in the arrays, back to integer codes.
pub fn labels_from_column(values: &[f64]) -> Result<Vec<i32>, PipelineError> {
    values
        .iter()
        .enumerate()
        .map(|(row, &v)| {
            if v.fract() != 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
                Err(PipelineError::dataset(format!(
                    "label {v} at row {row} is not an integer code"
                )))
            } else {
                Ok(v as i32)
            }
        })
        .collect()
}

pub struct ModelTrainer {
    config: TrainerConfig,
    paths: TrainerPaths,
    publish_dir: Option<PathBuf>,
    experiment_name: String,
    registry: Vec<ModelCandidate>,
    tracker: Arc<dyn ExperimentTracker>,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig, paths: TrainerPaths, tracker: Arc<dyn ExperimentTracker>) -> Self {
        Self {
            config,
            paths,
            publish_dir: None,
            experiment_name: "NetworkSecurityExperiment".to_string(),
            registry: default_registry(),
            tracker,
        }
    }

    pub fn with_publish_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.publish_dir = dir;
        self
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Replace the candidate list (evaluated in the given order).
    pub fn with_registry(mut self, registry: Vec<ModelCandidate>) -> Self {
        self.registry = registry;
        self
    }

    pub fn initiate(
        &self,
        transformation: &DataTransformationArtifact,
        ctx: &RunContext,
    ) -> Result<ModelTrainerArtifact, PipelineError> {
        let span = ctx.stage_span("model_trainer");
        let _guard = span.enter();

        let train = NumericArray::read_npy(&transformation.transformed_train_file_path)?;
        let test = NumericArray::read_npy(&transformation.transformed_test_file_path)?;
        let (x_train, y_train) = train.split_last_column()?;
        let (x_test, y_test) = test.split_last_column()?;
        let y_train = labels_from_column(&y_train)?;
        let y_test = labels_from_column(&y_test)?;

        let best = self.select_model(&x_train, &y_train, &x_test, &y_test)?;
        let report = &best.report;

        let positive = self.config.positive_code;
        let train_metrics = classification_score(&y_train, &best.model.predict(&x_train)?, positive);
        let test_metrics = classification_score(&y_test, &best.model.predict(&x_test)?, positive);
        tracing::info!(
            model = %report.name,
            test_score = report.test_score,
            train_f1 = train_metrics.f1_score,
            test_f1 = test_metrics.f1_score,
            "best model selected"
        );

        let preprocessor = Preprocessor::load(&transformation.transformed_object_file_path)?;
        let TrainedCandidate { report, model } = best;
        let bundle = NetworkModel::new(report.name.clone(), report.params.clone(), preprocessor, model);
        let blob = bundle.to_json_bytes()?;
        persistence::atomic_write(&self.paths.trained_model_file, &blob)?;

        if let Some(dir) = &self.publish_dir {
            persistence::atomic_write(&dir.join("model.json"), &blob)?;
            persistence::copy_file(
                &transformation.transformed_object_file_path,
                &dir.join("preprocessor.json"),
            )?;
            tracing::info!(dir = %dir.display(), "final model published");
        }

        self.track(&report, &train_metrics, &test_metrics, blob);

        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.paths.trained_model_file.clone(),
            best_model_name: report.name,
            best_params: report.params,
            test_score: report.test_score,
            train_metric_artifact: train_metrics,
            test_metric_artifact: test_metrics,
        })
    }

    /// Tune and score every candidate, in registry order.
    pub fn evaluate_candidates(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[i32],
        x_test: &[Vec<f64>],
        y_test: &[i32],
    ) -> Result<Vec<CandidateReport>, PipelineError> {
        Ok(self
            .train_candidates(x_train, y_train, x_test, y_test)?
            .into_iter()
            .map(|c| c.report)
            .collect())
    }

    fn train_candidates(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[i32],
        x_test: &[Vec<f64>],
        y_test: &[i32],
    ) -> Result<Vec<TrainedCandidate>, PipelineError> {
        let cv = CrossValidation {
            n_folds: self.config.cv_folds,
        };
        let mut trained = Vec::with_capacity(self.registry.len());
        for candidate in &self.registry {
            let sets = candidate.grid.expand();
            let (params, cv_result) = match grid_search(candidate.kind, &sets, x_train, y_train, cv) {
                Ok(Some(best)) => best,
                Ok(None) => {
                    tracing::warn!(model = %candidate.name, "no parameter set could be fitted, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(model = %candidate.name, error = %e, "cross-validation failed, skipping");
                    continue;
                }
            };
            let model = match FittedModel::fit(candidate.kind, &params, x_train, y_train) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(model = %candidate.name, error = %e, "refit failed, skipping");
                    continue;
                }
            };
            let test_score = accuracy(y_test, &model.predict(x_test)?);
            tracing::info!(
                model = %candidate.name,
                params = ?params,
                cv_mean = cv_result.mean_score,
                test_score,
                "candidate trained"
            );
            trained.push(TrainedCandidate {
                report: CandidateReport {
                    name: candidate.name.clone(),
                    kind: candidate.kind,
                    params,
                    cv: cv_result,
                    test_score,
                },
                model,
            });
        }
        Ok(trained)
    }

    fn select_model(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[i32],
        x_test: &[Vec<f64>],
        y_test: &[i32],
    ) -> Result<TrainedCandidate, PipelineError> {
        let trained = self.train_candidates(x_train, y_train, x_test, y_test)?;
        let scored = trained.into_iter().map(|c| {
            let score = c.report.test_score;
            (c, score)
        });
        let (best, score) = select_best(scored)
            .ok_or_else(|| PipelineError::model_selection("no candidate model could be trained"))?;

        if let Some(expected) = self.config.expected_score {
            if score < expected {
                return Err(PipelineError::model_selection(format!(
                    "best model {} scored {score:.4}, below the expected {expected:.4}",
                    best.report.name
                )));
            }
        }
        Ok(best)
    }

    fn track(
        &self,
        report: &CandidateReport,
        train: &ClassificationMetrics,
        test: &ClassificationMetrics,
        model_blob: Vec<u8>,
    ) {
        let mut params = report.params.clone();
        params.insert("model_name".to_string(), json!(report.name));
        let metrics = BTreeMap::from([
            ("train_f1_score".to_string(), train.f1_score),
            ("train_precision".to_string(), train.precision_score),
            ("train_recall".to_string(), train.recall_score),
            ("test_f1_score".to_string(), test.f1_score),
            ("test_precision".to_string(), test.precision_score),
            ("test_recall".to_string(), test.recall_score),
        ]);
        let run = TrackedRun {
            experiment_name: self.experiment_name.clone(),
            params,
            metrics,
            model_blob,
        };
        if let Err(e) = self.tracker.log_run(&run) {
            tracing::warn!(error = %e, "experiment tracking failed, continuing");
        }
    }
}
