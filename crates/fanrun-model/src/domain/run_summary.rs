use std::fmt;

use serde::{Deserialize, Serialize};

/// Which auto-stop condition tripped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BreakerTrip {
    /// `count` consecutive non-successful outcomes reached `limit`.
    ConsecutiveFailures { count: u32, limit: u32 },
    /// Failure `rate` over `completed` outcomes exceeded `limit`.
    FailureRate { rate: f64, limit: f64, completed: u64 },
}

impl fmt::Display for BreakerTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerTrip::ConsecutiveFailures { count, limit } => {
                write!(f, "{count} consecutive failures (limit: {limit})")
            }
            BreakerTrip::FailureRate {
                rate,
                limit,
                completed,
            } => write!(
                f,
                "{:.1}% failure rate over {completed} tasks exceeds limit ({:.0}%)",
                rate * 100.0,
                limit * 100.0
            ),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum StopReason {
    /// Every descriptor was dispatched and finished.
    Completed,
    /// The circuit breaker tripped; remaining work was cancelled.
    AutoStop { trip: BreakerTrip },
    /// An operator requested shutdown.
    Shutdown,
    /// A repeated shutdown request forced immediate termination.
    ForcedShutdown,
}

impl StopReason {
    pub fn is_early(&self) -> bool {
        !matches!(self, StopReason::Completed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => f.write_str("completed"),
            StopReason::AutoStop { trip } => write!(f, "auto-stop: {trip}"),
            StopReason::Shutdown => f.write_str("shutdown requested"),
            StopReason::ForcedShutdown => f.write_str("forced shutdown"),
        }
    }
}

/// Aggregate result of one run.
///
/// `completed + failed + cancelled == total` holds for every summary built through [`RunSummary::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    /// Successful outcomes.
    pub completed: usize,
    /// Failed, timed-out and errored outcomes.
    pub failed: usize,
    /// Never-dispatched descriptors plus cancelled outcomes.
    pub cancelled: usize,
    pub stop_reason: StopReason,
}

impl RunSummary {
    pub fn new(total: usize, completed: usize, failed: usize, stop_reason: StopReason) -> Self {
        Self {
            total,
            completed,
            failed,
            cancelled: total.saturating_sub(completed + failed),
            stop_reason,
        }
    }

    /// Percentage of all descriptors that succeeded; 0 for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    pub fn is_consistent(&self) -> bool {
        self.completed + self.failed + self.cancelled == self.total
    }
}
