use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fanrun_model::{TaskDescriptor, TaskIndex, TaskOutcome, WorkerId};

use crate::error::RunnerError;

/// One descriptor handed to a runner, together with its dispatch coordinates.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub descriptor: TaskDescriptor,
    /// 1-based dispatch order.
    pub task_index: TaskIndex,
    /// Worker slot the task occupies while in flight.
    pub worker_id: WorkerId,
}

/// Stop requests observed by a running task.
///
/// `cancel` asks the task to stop and terminate its process politely;
/// `force` asks it to skip whatever grace period is left.
/// Both are idempotent: cancelling twice has the effect of cancelling once.
#[derive(Debug, Clone, Default)]
pub struct StopSignals {
    cancel: CancellationToken,
    force: CancellationToken,
}

impl StopSignals {
    pub fn new(cancel: CancellationToken, force: CancellationToken) -> Self {
        Self { cancel, force }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[inline]
    pub fn is_forced(&self) -> bool {
        self.force.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Resolves once a forced stop is requested.
    pub async fn forced(&self) {
        self.force.cancelled().await
    }

    /// Request cancellation of this task only.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Executes single tasks on behalf of the scheduler.
///
/// Implementations never fail at the call boundary: every fault of a task ends up in the returned
/// [`TaskOutcome`] with a terminal status.
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Validate the whole descriptor set before anything is dispatched.
    fn check(&self, _tasks: &[TaskDescriptor]) -> Result<(), RunnerError> {
        Ok(())
    }

    /// Run one task to a terminal outcome.
    async fn execute(&self, dispatch: Dispatch, signals: StopSignals) -> TaskOutcome;
}
