use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution state of a single task.
///
/// Outcomes always carry one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is queued or about to start.
    Pending,
    /// Child process is running.
    Running,
    /// Process exited with code 0.
    Success,
    /// Process exited with a non-zero code or was killed by a signal it did not get from us.
    Failed,
    /// Process exceeded its deadline and was terminated.
    Timeout,
    /// The task could not be run: validation, spawn or I/O fault.
    Error,
    /// Cancelled before or during execution.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` if the task is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// Returns `true` only for [`TaskStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    /// Returns `true` for terminal states counted as failures in the run summary.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Timeout => "TIMEOUT",
            TaskStatus::Error => "ERROR",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
