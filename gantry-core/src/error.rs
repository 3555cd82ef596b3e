// Crate-level error taxonomy
// InvalidMatrix and InvalidWorkflow abort a run before any job starts;
// everything that happens inside a job is reported through StepResult instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// Malformed or empty matrix definition. Fatal before dispatch.
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    /// Workflow declaration failed semantic validation.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A job task panicked or was torn down by the runtime.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
