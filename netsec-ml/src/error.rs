//! Error types for the netsec-ml crate.
//!
//! Every stage returns [`PipelineError`]. It records what went wrong, where it
//! was raised (file and line, captured with `#[track_caller]`, including at `?`
//! sites through the `From` conversions) and, optionally, the underlying cause.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Broad category of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dataset columns disagree with the expected schema, or drift was fatal.
    Schema,
    /// A target value outside the configured label vocabulary.
    UnknownLabel,
    /// A file or credential the run depends on does not exist.
    MissingResource,
    /// No candidate model could be trained, or the best one is not good enough.
    ModelSelection,
    Dataset,
    Config,
    Io,
    Serialization,
    Training,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Schema => "Schema",
            Self::UnknownLabel => "Unknown label",
            Self::MissingResource => "Missing resource",
            Self::ModelSelection => "Model selection",
            Self::Dataset => "Dataset",
            Self::Config => "Configuration",
            Self::Io => "IO",
            Self::Serialization => "Serialization",
            Self::Training => "Training",
        };
        f.write_str(name)
    }
}

/// Source location an error was raised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    pub file: &'static str,
    pub line: u32,
}

impl ErrorLocation {
    #[track_caller]
    fn caller() -> Self {
        let loc = Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

/// The single error type threaded through every stage.
#[derive(Debug, Error)]
#[error("{kind} error in [{}] line [{}]: {message}", .location.file, .location.line)]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    location: ErrorLocation,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl PipelineError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: ErrorLocation::caller(),
            source: None,
        }
    }

    #[track_caller]
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, msg)
    }

    #[track_caller]
    pub fn unknown_label(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownLabel, msg)
    }

    #[track_caller]
    pub fn missing_resource(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingResource, msg)
    }

    #[track_caller]
    pub fn model_selection(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModelSelection, msg)
    }

    #[track_caller]
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dataset, msg)
    }

    #[track_caller]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    #[track_caller]
    pub fn training(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Training, msg)
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Prefix the message with the name of the stage or operation that failed.
    /// The original raise location is kept.
    pub fn with_context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> ErrorLocation {
        self.location
    }
}

impl From<std::io::Error> for PipelineError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::MissingResource
        } else {
            ErrorKind::Io
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, err.to_string()).with_source(err)
    }
}

impl From<serde_yaml::Error> for PipelineError {
    #[track_caller]
    fn from(err: serde_yaml::Error) -> Self {
        Self::new(ErrorKind::Serialization, err.to_string()).with_source(err)
    }
}

impl From<csv::Error> for PipelineError {
    #[track_caller]
    fn from(err: csv::Error) -> Self {
        Self::new(ErrorKind::Dataset, format!("CSV error: {err}")).with_source(err)
    }
}

impl From<smartcore::error::Failed> for PipelineError {
    #[track_caller]
    fn from(err: smartcore::error::Failed) -> Self {
        Self::new(ErrorKind::Training, err.to_string())
    }
}

impl From<figment::Error> for PipelineError {
    #[track_caller]
    fn from(err: figment::Error) -> Self {
        Self::new(ErrorKind::Config, err.to_string())
    }
}
