//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, SourceFormat};
use chrono::{DateTime, Local};
use netsec_ml::{DataSourceType, Dataset, NetworkModel, PipelineConfig, Schema, TrainingPipeline};
use std::path::{Path, PathBuf};

/// Column appended to prediction output.
const PREDICTED_COLUMN: &str = "predicted_column";

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: PipelineConfig,
    workspace: &Path,
    started_at: &DateTime<Local>,
) -> anyhow::Result<()> {
    match command {
        Commands::Train {
            source,
            format,
            schema,
        } => handle_train(config, source, format, schema, started_at).await,
        Commands::Predict {
            model,
            input,
            output,
        } => handle_predict(&model, &input, &output),
        Commands::Config { action } => {
            handle_config(action.unwrap_or(ConfigAction::Show), &config, workspace)
        }
    }
}

async fn handle_train(
    config: PipelineConfig,
    source: Option<PathBuf>,
    format: Option<SourceFormat>,
    schema_path: Option<PathBuf>,
    started_at: &DateTime<Local>,
) -> anyhow::Result<()> {
    let source = match source {
        Some(path) => source_for(path, format)?,
        None => config.source.clone(),
    };
    let schema_path = schema_path.unwrap_or_else(|| config.schema_path.clone());
    let schema = Schema::load(&schema_path)?;

    let pipeline = TrainingPipeline::from_config(config, schema);
    let outcome = pipeline.run_at(started_at, &source).await?;

    tracing::info!(
        run_id = %outcome.run_id,
        validation_status = outcome.validation.validation_status,
        "run finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome.trainer)?);
    Ok(())
}

/// Build a source for an explicit path, inferring the format from its extension.
fn source_for(path: PathBuf, format: Option<SourceFormat>) -> anyhow::Result<DataSourceType> {
    let format = match format {
        Some(f) => f,
        None => match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => SourceFormat::Csv,
            Some("json") => SourceFormat::Json,
            Some("jsonl") | Some("ndjson") => SourceFormat::Jsonl,
            _ => anyhow::bail!(
                "cannot infer the format of {}; pass --format",
                path.display()
            ),
        },
    };
    Ok(match format {
        SourceFormat::Csv => DataSourceType::Csv {
            path,
            delimiter: ',',
        },
        SourceFormat::Json => DataSourceType::Json { path },
        SourceFormat::Jsonl => DataSourceType::Jsonl { path },
    })
}

fn handle_predict(model_path: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let model = NetworkModel::load(model_path)?;
    let mut batch = Dataset::read_csv(input)?;
    let labels = model.predict_labels(&batch)?;
    tracing::info!(rows = batch.row_count(), model = %model.model_name, "batch predicted");

    append_predictions(&mut batch, labels);
    batch.write_csv(output)?;
    println!(
        "Wrote {} predictions to {}",
        batch.row_count(),
        output.display()
    );
    Ok(())
}

fn append_predictions(batch: &mut Dataset, labels: Vec<String>) {
    batch.drop_column(PREDICTED_COLUMN);
    batch.columns.push(PREDICTED_COLUMN.to_string());
    for (row, label) in batch.rows.iter_mut().zip(labels) {
        row.push(netsec_ml::data::dataset::parse_cell(&label));
    }
}

fn handle_config(
    action: ConfigAction,
    config: &PipelineConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        ConfigAction::Init => {
            let path = workspace.join("netsec.toml");
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            std::fs::write(&path, toml::to_string_pretty(&PipelineConfig::default())?)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn test_source_format_inference() {
        assert!(matches!(
            source_for(PathBuf::from("a/NetworkData.json"), None).unwrap(),
            DataSourceType::Json { .. }
        ));
        assert!(matches!(
            source_for(PathBuf::from("export.jsonl"), None).unwrap(),
            DataSourceType::Jsonl { .. }
        ));
        assert!(matches!(
            source_for(PathBuf::from("export.txt"), Some(SourceFormat::Csv)).unwrap(),
            DataSourceType::Csv { delimiter: ',', .. }
        ));
        assert!(source_for(PathBuf::from("export"), None).is_err());
    }

    #[test]
    fn test_append_predictions_replaces_stale_column() {
        let mut batch = Dataset::new(
            vec!["a".into(), PREDICTED_COLUMN.into()],
            vec![vec![Value::from(1), Value::from(0)]],
        );
        append_predictions(&mut batch, vec!["-1".to_string()]);
        assert_eq!(batch.columns, vec!["a".to_string(), PREDICTED_COLUMN.to_string()]);
        assert_eq!(batch.rows[0], vec![Value::from(1), Value::from(-1)]);
    }

    #[test]
    fn test_config_init_writes_loadable_toml() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, &PipelineConfig::default(), dir.path()).unwrap();
        let text = std::fs::read_to_string(dir.path().join("netsec.toml")).unwrap();
        assert!(text.contains("pipeline_name"));
        let loaded = netsec_ml::load_config(Some(dir.path()), None).unwrap();
        assert_eq!(loaded.trainer.cv_folds, 3);
    }
}
