//! netsec CLI: train the network-security classifier and run batch predictions.

mod commands;

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Network-security classifier training pipeline
#[derive(Parser, Debug)]
#[command(name = "netsec", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `netsec.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors to the terminal
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run ingestion, validation, transformation and training
    Train {
        /// Exported collection to ingest (overrides the configured source)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Format of --source; inferred from the extension when omitted
        #[arg(short, long, value_enum)]
        format: Option<SourceFormat>,

        /// Expected-schema YAML (overrides `schema_path`)
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Predict a CSV batch with a trained model bundle
    Predict {
        /// Model bundle (`model.json`)
        #[arg(short, long)]
        model: PathBuf,

        /// CSV file with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV (input columns plus `predicted_column`)
        #[arg(short, long, default_value = "prediction_output/output.csv")]
        output: PathBuf,
    },
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to `<workspace>/netsec.toml`
    Init,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceFormat {
    Csv,
    Json,
    Jsonl,
}

/// Human-readable stderr plus a JSON log file per invocation.
fn init_tracing(verbose: u8, quiet: bool, log_dir: &Path, timestamp: &str) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    if std::fs::create_dir_all(log_dir).is_err() {
        tracing_subscriber::registry().with(stderr_layer).init();
        return None;
    }
    let file_appender = tracing_appender::rolling::never(log_dir, format!("{timestamp}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());
    let config = netsec_ml::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

    let started_at = chrono::Local::now();
    let timestamp = started_at
        .format(netsec_ml::config::TIMESTAMP_FORMAT)
        .to_string();
    let _guard = init_tracing(cli.verbose, cli.quiet, &config.log_dir, &timestamp);

    let result = commands::handle_command(cli.command, config, &workspace, &started_at).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "command failed");
    }
    result
}
