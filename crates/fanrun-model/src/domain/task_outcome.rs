use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{TaskDescriptor, TaskIndex, TaskStatus, WorkerId};

/// Terminal result record for exactly one dispatched task.
///
/// Every field always holds a defined value so sinks can serialize unconditionally:
/// strings default to empty, numbers to zero, and `exit_code`/`child_pid` serialize as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub status: TaskStatus,
    /// Pid of the engine process that ran the task.
    pub process_id: u32,
    /// Pid of the child process, if one was spawned.
    pub child_pid: Option<u32>,
    pub worker_id: WorkerId,
    pub task_index: TaskIndex,
    /// Task identity, see [`TaskDescriptor::identity`].
    pub task: String,
    /// Shell-quoted rendering of the executed argv; empty when the command was never built.
    pub command: String,
    /// Present only when the process exited on its own.
    pub exit_code: Option<i32>,
    pub duration_secs: f64,
    /// Peak resident memory observed, in MB.
    pub memory_mb: f64,
    /// Peak CPU usage observed, in percent.
    pub cpu_percent: f64,
    pub error_message: String,
    /// Last `max_output_capture` characters of stdout.
    pub stdout: String,
    /// Last `max_output_capture` characters of stderr.
    pub stderr: String,
}

impl TaskOutcome {
    /// Start a new record for `task`, stamped with the current time and status [`TaskStatus::Pending`].
    pub fn started(task: &TaskDescriptor, task_index: TaskIndex, worker_id: WorkerId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            start_time: now,
            end_time: now,
            status: TaskStatus::Pending,
            process_id: std::process::id(),
            child_pid: None,
            worker_id,
            task_index,
            task: task.identity(),
            command: String::new(),
            exit_code: None,
            duration_secs: 0.0,
            memory_mb: 0.0,
            cpu_percent: 0.0,
            error_message: String::new(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Seal the record with a terminal status and message, stamping end time and duration.
    pub fn finish(mut self, status: TaskStatus, message: impl Into<String>) -> Self {
        debug_assert!(status.is_terminal());
        self.end_time = OffsetDateTime::now_utc();
        self.duration_secs = (self.end_time - self.start_time).as_seconds_f64().max(0.0);
        self.status = status;
        self.error_message = message.into();
        self
    }

    /// Keep the larger of the current and the sampled resource figures.
    pub fn observe_resources(&mut self, memory_mb: f64, cpu_percent: f64) {
        if memory_mb > self.memory_mb {
            self.memory_mb = memory_mb;
        }
        if cpu_percent > self.cpu_percent {
            self.cpu_percent = cpu_percent;
        }
    }
}
