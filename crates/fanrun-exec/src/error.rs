use thiserror::Error;

/// Per-task execution failures.
///
/// These never leave the executor as errors: each one is turned into a terminal outcome with
/// [`ExecError::outcome_message`] as its message.
#[derive(Error, Debug, PartialEq)]
pub enum ExecError {
    #[error("{0}")]
    Security(String),
    #[error("unmatched placeholders: {}", .0.join(", "))]
    UnmatchedPlaceholders(Vec<String>),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("timeout after {0}s")]
    Timeout(u64),
}

impl ExecError {
    pub fn security(msg: impl Into<String>) -> Self {
        ExecError::Security(msg.into())
    }

    /// Message recorded in the task outcome.
    pub fn outcome_message(&self) -> String {
        match self {
            ExecError::Security(msg) => format!("Security error: {msg}"),
            ExecError::Timeout(secs) => format!("Timeout after {secs}s"),
            other => format!("Error: {other}"),
        }
    }
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}
