use autopilot_core::error::CoreError;
use autopilot_core::types::SiteId;

/// Errors raised while running the pipeline or applying queue items.
///
/// Inside the module loop every variant is caught and recorded as a module
/// error; only [`PipelineError::SiteNotFound`] and store failures during
/// setup end a run in `error`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Site not found: {0}")]
    SiteNotFound(SiteId),

    #[error("An optimization run is already in progress for site {0}")]
    RunInProgress(SiteId),

    #[error("Module {module} failed: {message}")]
    Module { module: &'static str, message: String },

    /// The completion response did not match the expected shape.
    #[error("Invalid completion response: {0}")]
    Validation(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("Rank source error: {0}")]
    RankFetch(String),

    #[error("Content publisher error: {0}")]
    Publish(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    pub fn module(module: &'static str, message: impl Into<String>) -> Self {
        Self::Module {
            module,
            message: message.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
