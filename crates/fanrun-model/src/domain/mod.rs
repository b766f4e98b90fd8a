mod task_descriptor;
pub use task_descriptor::TaskDescriptor;

mod task_status;
pub use task_status::TaskStatus;

mod task_outcome;
pub use task_outcome::TaskOutcome;

mod run_summary;
pub use run_summary::{BreakerTrip, RunSummary, StopReason};

/// Identifier of a worker slot (`1..=max_workers`).
///
/// Slots are reused across the run; a slot id is bound to one dispatched task at a time.
pub type WorkerId = usize;

/// Dispatch sequence number of a task within a run, starting at 1.
pub type TaskIndex = usize;
