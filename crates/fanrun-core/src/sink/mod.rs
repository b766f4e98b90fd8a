use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use fanrun_model::{RunSummary, TaskOutcome};

use crate::error::SinkError;

/// Consumer of task outcomes.
///
/// The scheduler calls [`record`](ResultSink::record) once per outcome, in completion order,
/// and [`finish`](ResultSink::finish) once with the summary. Errors are logged by the scheduler and never abort a run.
#[async_trait]
pub trait ResultSink: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn record(&self, outcome: &TaskOutcome) -> Result<(), SinkError>;

    async fn finish(&self, _summary: &RunSummary) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every outcome in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    outcomes: Mutex<Vec<TaskOutcome>>,
    summary: Mutex<Option<RunSummary>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes recorded so far, in completion order.
    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summary passed to `finish`, if the run has ended.
    pub fn summary(&self) -> Option<RunSummary> {
        *self.summary.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn record(&self, outcome: &TaskOutcome) -> Result<(), SinkError> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> Result<(), SinkError> {
        *self.summary.lock().unwrap_or_else(PoisonError::into_inner) = Some(*summary);
        Ok(())
    }
}
