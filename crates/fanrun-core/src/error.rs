use thiserror::Error;

use fanrun_model::ConfigError;

/// Run-level failures. Per-task failures are reported as outcomes instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("runner '{runner}' rejected the task set: {source}")]
    Runner {
        runner: &'static str,
        #[source]
        source: RunnerError,
    },
}

/// Rejection of a descriptor set by a runner before anything is dispatched.
#[derive(Debug, Error, PartialEq)]
pub enum RunnerError {
    #[error("invalid task: {0}")]
    InvalidTask(String),
    #[error("{count} task(s) failed validation: {first}")]
    Validation { count: usize, first: String },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink failed: {0}")]
    Failed(String),
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),
}
