//! End-to-end training pipeline.

use crate::artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, ModelTrainerArtifact,
};
use crate::config::{PipelineConfig, RunLayout};
use crate::context::RunContext;
use crate::data::ingest::DataIngestion;
use crate::data::schema::Schema;
use crate::data::source::DataSourceType;
use crate::data::transform::DataTransformation;
use crate::data::validate::DataValidation;
use crate::error::PipelineError;
use crate::training::experiment::{ExperimentTracker, FileTracker, NoopTracker};
use crate::training::trainer::ModelTrainer;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Artifacts of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub timestamp: String,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub trainer: ModelTrainerArtifact,
}

/// Runs ingestion, validation, transformation and training in order.
pub struct TrainingPipeline {
    config: PipelineConfig,
    schema: Schema,
    tracker: Arc<dyn ExperimentTracker>,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig, schema: Schema, tracker: Arc<dyn ExperimentTracker>) -> Self {
        Self {
            config,
            schema,
            tracker,
        }
    }

    /// Pipeline with the tracker the config asks for.
    pub fn from_config(config: PipelineConfig, schema: Schema) -> Self {
        let tracker: Arc<dyn ExperimentTracker> = if config.tracking.enabled {
            Arc::new(FileTracker::new(config.tracking.dir.clone()))
        } else {
            Arc::new(NoopTracker)
        };
        Self::new(config, schema, tracker)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, source: &DataSourceType) -> Result<PipelineOutcome, PipelineError> {
        self.run_at(&Local::now(), source).await
    }

    /// Run with the artifact directory named after `started_at`.
    pub async fn run_at<Tz: TimeZone>(
        &self,
        started_at: &DateTime<Tz>,
        source: &DataSourceType,
    ) -> Result<PipelineOutcome, PipelineError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let layout = RunLayout::new(&self.config, started_at);
        self.run_with_layout(layout, source).await
    }

    /// Run under an explicit, already formatted timestamp.
    pub async fn run_with_timestamp(
        &self,
        timestamp: &str,
        source: &DataSourceType,
    ) -> Result<PipelineOutcome, PipelineError> {
        let layout = RunLayout::from_timestamp(&self.config, timestamp);
        self.run_with_layout(layout, source).await
    }

    async fn run_with_layout(
        &self,
        layout: RunLayout,
        source: &DataSourceType,
    ) -> Result<PipelineOutcome, PipelineError> {
        let ctx = RunContext::new(&self.config.pipeline_name, &layout.timestamp);
        {
            let _guard = ctx.span().enter();
            tracing::info!(root = %layout.root.display(), "training pipeline started");
        }

        let ingestion = DataIngestion::new(
            self.config.ingestion.clone(),
            layout.ingestion(),
            source.build(),
        )
        .initiate(&ctx)
        .await
        .map_err(|e| e.with_context("data ingestion"))?;

        let validation = DataValidation::new(
            self.schema.clone(),
            self.config.validation.clone(),
            layout.validation(),
        )
        .initiate(&ingestion, &ctx)
        .map_err(|e| e.with_context("data validation"))?;

        let transformation = DataTransformation::new(
            self.config.transformation.clone(),
            self.schema.target_column(),
            layout.transformation(),
        )
        .with_missing_markers(self.config.ingestion.missing_markers.clone())
        .initiate(&validation, &ctx)
        .map_err(|e| e.with_context("data transformation"))?;

        let trainer = ModelTrainer::new(
            self.config.trainer.clone(),
            layout.trainer(),
            Arc::clone(&self.tracker),
        )
        .with_publish_dir(self.config.publish_dir.clone())
        .with_experiment_name(self.config.tracking.experiment_name.clone())
        .initiate(&transformation, &ctx)
        .map_err(|e| e.with_context("model trainer"))?;

        {
            let _guard = ctx.span().enter();
            tracing::info!(
                model = %trainer.best_model_name,
                test_score = trainer.test_score,
                "training pipeline completed"
            );
        }

        Ok(PipelineOutcome {
            run_id: ctx.run_id().to_string(),
            timestamp: layout.timestamp,
            ingestion,
            validation,
            transformation,
            trainer,
        })
    }
}
