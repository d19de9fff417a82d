//! Full pipeline runs against exported collections on disk.

use std::sync::Arc;

use netsec_ml::data::NumericArray;
use netsec_ml::data::drift::DriftReport;
use netsec_ml::training::experiment::ExperimentRegistry;
use netsec_ml::{
    DataSourceType, Dataset, ErrorKind, FileTracker, NetworkModel, NoopTracker, PipelineConfig,
    Schema, TrainingPipeline,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const SCHEMA_YAML: &str = r#"
columns:
  - having_IP_Address: int64
  - URL_Length: int64
  - SSLfinal_State: int64
  - Prefix_Suffix: int64
  - web_traffic: int64
  - Result: int64
numerical_columns:
  - having_IP_Address
  - URL_Length
  - SSLfinal_State
  - Prefix_Suffix
  - web_traffic
  - Result
target_column: Result
"#;

/// 100 phishing-style records, 5 features, `Result` in {1, -1},
/// 5% of `SSLfinal_State` missing.
fn records() -> Vec<Value> {
    (0..100i64)
        .map(|i| {
            let label = if (i * 7) % 10 < 5 { 1 } else { -1 };
            let ssl = match i % 40 {
                3 => json!("na"),
                23 => Value::Null,
                _ => json!(label * ((i % 2) + 1)),
            };
            json!({
                "_id": format!("65f0c0de{i:04}"),
                "having_IP_Address": if label == 1 { 1 } else { -1 },
                "URL_Length": (i % 3) - 1,
                "SSLfinal_State": ssl,
                "Prefix_Suffix": label * (i % 2),
                "web_traffic": (i % 5) - 2,
                "Result": label,
            })
        })
        .collect()
}

fn setup(dir: &TempDir) -> (PipelineConfig, Schema, DataSourceType) {
    let source_path = dir.path().join("Network_Data").join("NetworkData.json");
    std::fs::create_dir_all(source_path.parent().unwrap()).unwrap();
    std::fs::write(&source_path, serde_json::to_vec(&records()).unwrap()).unwrap();

    let mut config = PipelineConfig::default();
    config.artifact_dir = dir.path().join("Artifacts");
    config.publish_dir = Some(dir.path().join("final_model"));
    config.tracking.dir = dir.path().join("mlruns");
    config.ingestion.test_ratio = 0.3;

    let schema = Schema::from_yaml_str(SCHEMA_YAML).unwrap();
    (config, schema, DataSourceType::Json { path: source_path })
}

#[tokio::test]
async fn test_full_pipeline_trains_and_publishes_a_usable_model() {
    let dir = TempDir::new().unwrap();
    let (config, schema, source) = setup(&dir);
    let tracker = Arc::new(FileTracker::new(config.tracking.dir.clone()));
    let pipeline = TrainingPipeline::new(config.clone(), schema, tracker.clone());

    let outcome = pipeline
        .run_with_timestamp("03_15_2025_10_30_00", &source)
        .await
        .unwrap();

    // ingestion
    let store = Dataset::read_csv(&outcome.ingestion.feature_store_file_path).unwrap();
    assert_eq!(store.row_count(), 100);
    assert!(!store.has_column("_id"));
    assert_eq!(Dataset::read_csv(&outcome.ingestion.test_file_path).unwrap().row_count(), 30);
    assert!(
        outcome
            .ingestion
            .train_file_path
            .starts_with(dir.path().join("Artifacts").join("03_15_2025_10_30_00"))
    );

    // validation
    assert!(outcome.validation.validation_status);
    let report: DriftReport = serde_yaml::from_str(
        &std::fs::read_to_string(&outcome.validation.drift_report_file_path).unwrap(),
    )
    .unwrap();
    assert_eq!(report.columns.len(), 6);
    assert!(!report.any_drift());

    // transformation
    let train = NumericArray::read_npy(&outcome.transformation.transformed_train_file_path).unwrap();
    let test = NumericArray::read_npy(&outcome.transformation.transformed_test_file_path).unwrap();
    assert_eq!(train.shape(), (70, 6));
    assert_eq!(test.shape(), (30, 6));
    assert!(!train.has_nan());
    assert!(!test.has_nan());

    // training
    let metrics = outcome.trainer.test_metric_artifact;
    assert!((0.0..=1.0).contains(&metrics.f1_score));
    assert!((0.0..=1.0).contains(&metrics.precision_score));
    assert!((0.0..=1.0).contains(&metrics.recall_score));
    assert!(dir.path().join("final_model").join("model.json").exists());
    assert!(dir.path().join("final_model").join("preprocessor.json").exists());

    // the persisted bundle predicts raw records, target column included
    let model = NetworkModel::load(&outcome.trainer.trained_model_file_path).unwrap();
    let predictions = model.predict(&store).unwrap();
    assert_eq!(predictions.len(), store.row_count());
    assert!(predictions.iter().all(|p| *p == 1 || *p == -1));

    // missing markers in a raw export are handled the way ingestion handles them
    let raw_path = dir.path().join("raw_batch.csv");
    std::fs::write(
        &raw_path,
        "having_IP_Address,URL_Length,SSLfinal_State,Prefix_Suffix,web_traffic\n1,0,na,1,0\n",
    )
    .unwrap();
    let raw = Dataset::read_csv(&raw_path).unwrap();
    assert_eq!(model.predict(&raw).unwrap().len(), 1);

    let registry = ExperimentRegistry::load(
        &config
            .tracking
            .dir
            .join(&config.tracking.experiment_name)
            .join("runs.json"),
    )
    .unwrap();
    assert_eq!(registry.runs.len(), 1);
    assert_eq!(
        registry.runs[0].model_name.as_deref(),
        Some(outcome.trainer.best_model_name.as_str())
    );
}

#[tokio::test]
async fn test_full_pipeline_from_csv_export() {
    let dir = TempDir::new().unwrap();
    let (config, schema, _) = setup(&dir);

    let documents = records();
    let csv_path = dir.path().join("phisingData.csv");
    let dataset = netsec_ml::data::source::documents_to_dataset(&documents).unwrap();
    dataset.write_csv(&csv_path).unwrap();

    let pipeline = TrainingPipeline::new(config, schema, Arc::new(NoopTracker));
    let outcome = pipeline
        .run_with_timestamp(
            "03_15_2025_11_00_00",
            &DataSourceType::Csv {
                path: csv_path,
                delimiter: ',',
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.transformation.transformed_test_file_path.extension().unwrap(), "npy");
}

#[tokio::test]
async fn test_full_pipeline_schema_mismatch_aborts_in_validation() {
    let dir = TempDir::new().unwrap();
    let (config, _, source) = setup(&dir);
    let narrow = Schema::from_yaml_str(
        "columns:\n  - having_IP_Address: int64\n  - Result: int64\ntarget_column: Result\n",
    )
    .unwrap();

    let pipeline = TrainingPipeline::new(config, narrow, Arc::new(NoopTracker));
    let err = pipeline
        .run_with_timestamp("03_15_2025_12_00_00", &source)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.message().starts_with("data validation"));
}

#[tokio::test]
async fn test_full_pipeline_missing_source_is_reported() {
    let dir = TempDir::new().unwrap();
    let (config, schema, _) = setup(&dir);
    let pipeline = TrainingPipeline::new(config, schema, Arc::new(NoopTracker));
    let err = pipeline
        .run_with_timestamp(
            "03_15_2025_13_00_00",
            &DataSourceType::Jsonl {
                path: dir.path().join("absent.jsonl"),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingResource);
    assert!(err.message().starts_with("data ingestion"));
}
