//! Run-scoped logging context handed to every stage.

use tracing::Span;

/// Identity of one pipeline run plus its root tracing span.
///
/// Stages log through [`RunContext::stage_span`], so every event carries the
/// run id and timestamp without any global logger state.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    timestamp: String,
    span: Span,
}

impl RunContext {
    pub fn new(pipeline_name: &str, timestamp: &str) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "run",
            pipeline = %pipeline_name,
            run_id = %run_id,
            timestamp = %timestamp
        );
        Self {
            run_id,
            timestamp: timestamp.to_string(),
            span,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Child span for one stage of this run.
    pub fn stage_span(&self, stage: &str) -> Span {
        tracing::info_span!(parent: &self.span, "stage", stage = %stage)
    }
}
