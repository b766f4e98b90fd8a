use async_trait::async_trait;
use tracing::{error, info, warn};

use fanrun_core::{ResultSink, SinkError};
use fanrun_model::{RunSummary, TaskOutcome, TaskStatus};

/// Result sink that reports every outcome through `tracing`.
///
/// Successes log at `info`, failed, timed-out and cancelled tasks at `warn`, and errors at `error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResultSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn record(&self, outcome: &TaskOutcome) -> Result<(), SinkError> {
        log_outcome(outcome);
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> Result<(), SinkError> {
        log_summary(summary);
        Ok(())
    }
}

#[inline]
fn message_for(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Success => "task succeeded",
        TaskStatus::Failed => "task failed",
        TaskStatus::Timeout => "task exceeded its timeout",
        TaskStatus::Cancelled => "task cancelled",
        TaskStatus::Error => "task could not be run",
        TaskStatus::Pending | TaskStatus::Running => "task outcome is not terminal",
    }
}

/// Log one outcome with its resource figures at a level matching its status.
pub fn log_outcome(o: &TaskOutcome) {
    let msg = message_for(o.status);
    match o.status {
        TaskStatus::Success => info!(
            target: "fanrun.outcome",
            task = %o.task,
            index = o.task_index,
            worker = o.worker_id,
            duration_secs = o.duration_secs,
            memory_mb = o.memory_mb,
            cpu_percent = o.cpu_percent,
            "{msg}"
        ),
        TaskStatus::Error => error!(
            target: "fanrun.outcome",
            task = %o.task,
            index = o.task_index,
            worker = o.worker_id,
            reason = %o.error_message,
            "{msg}"
        ),
        _ => warn!(
            target: "fanrun.outcome",
            task = %o.task,
            index = o.task_index,
            worker = o.worker_id,
            status = %o.status,
            exit_code = ?o.exit_code,
            duration_secs = o.duration_secs,
            reason = %o.error_message,
            "{msg}"
        ),
    }
}

/// Log the run summary; early stops are reported at `warn`.
pub fn log_summary(s: &RunSummary) {
    let success_rate = format!("{:.1}%", s.success_rate());
    if s.stop_reason.is_early() {
        warn!(
            target: "fanrun.summary",
            total = s.total,
            completed = s.completed,
            failed = s.failed,
            cancelled = s.cancelled,
            success_rate = %success_rate,
            reason = %s.stop_reason,
            "run stopped early"
        );
    } else {
        info!(
            target: "fanrun.summary",
            total = s.total,
            completed = s.completed,
            failed = s.failed,
            cancelled = s.cancelled,
            success_rate = %success_rate,
            "run completed"
        );
    }
}
