//! Data ingestion stage: pull the collection, persist the feature store, split.

use crate::artifact::DataIngestionArtifact;
use crate::config::{IngestionConfig, IngestionPaths};
use crate::context::RunContext;
use crate::data::dataset::Dataset;
use crate::data::source::DocumentSource;
use crate::error::PipelineError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::Instrument;

/// Turn string cells equal to one of `markers` into missing cells.
/// Returns how many cells were replaced.
pub fn replace_missing_markers(dataset: &mut Dataset, markers: &[String]) -> usize {
    let mut replaced = 0;
    for row in &mut dataset.rows {
        for cell in row.iter_mut() {
            if let Value::String(s) = cell {
                if markers.iter().any(|m| m == s.trim()) {
                    *cell = Value::Null;
                    replaced += 1;
                }
            }
        }
    }
    replaced
}

/// Seeded shuffle split. The test split gets `ceil(n * test_ratio)` rows.
pub fn split_train_test(
    dataset: &Dataset,
    test_ratio: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), PipelineError> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(PipelineError::config(format!(
            "test_ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    let n = dataset.row_count();
    if n == 0 {
        return Err(PipelineError::dataset("cannot split an empty dataset"));
    }
    let n_test = (n as f64 * test_ratio).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::dataset(format!(
            "splitting {n} rows with test_ratio {test_ratio} leaves an empty split"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((dataset.select_rows(train_idx), dataset.select_rows(test_idx)))
}

/// Reads the source, writes the feature store and the two splits.
pub struct DataIngestion {
    config: IngestionConfig,
    paths: IngestionPaths,
    source: Box<dyn DocumentSource>,
}

impl DataIngestion {
    pub fn new(
        config: IngestionConfig,
        paths: IngestionPaths,
        source: Box<dyn DocumentSource>,
    ) -> Self {
        Self {
            config,
            paths,
            source,
        }
    }

    pub async fn initiate(&self, ctx: &RunContext) -> Result<DataIngestionArtifact, PipelineError> {
        let span = ctx.stage_span("data_ingestion");
        async move {
            let info = self.source.source_info();
            tracing::info!(source = %info.source_type, location = %info.location, "loading records");

            let mut dataset = self.source.load().await?;
            if dataset.row_count() == 0 {
                return Err(PipelineError::dataset(format!(
                    "source {} returned no records",
                    info.location
                )));
            }
            for column in &self.config.drop_columns {
                if dataset.drop_column(column) {
                    tracing::debug!(column = %column, "dropped column");
                }
            }
            let replaced = replace_missing_markers(&mut dataset, &self.config.missing_markers);
            tracing::info!(
                rows = dataset.row_count(),
                columns = dataset.column_count(),
                missing_markers_replaced = replaced,
                "records loaded"
            );

            dataset.write_csv(&self.paths.feature_store_file)?;

            let (train, test) =
                split_train_test(&dataset, self.config.test_ratio, self.config.seed)?;
            train.write_csv(&self.paths.train_file)?;
            test.write_csv(&self.paths.test_file)?;
            tracing::info!(
                train_rows = train.row_count(),
                test_rows = test.row_count(),
                "train/test split written"
            );

            Ok(DataIngestionArtifact {
                feature_store_file_path: self.paths.feature_store_file.clone(),
                train_file_path: self.paths.train_file.clone(),
                test_file_path: self.paths.test_file.clone(),
            })
        }
        .instrument(span)
        .await
    }
}
