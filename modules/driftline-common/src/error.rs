use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriftlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Run aborted")]
    Aborted,

    #[error("Run exceeded safety timeout of {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl DriftlineError {
    /// True for the cancellation outcome, which callers must be able to
    /// distinguish from a generic failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, DriftlineError::Aborted)
    }
}
