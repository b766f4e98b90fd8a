use std::collections::{BTreeSet, HashMap, VecDeque};

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use fanrun_model::{RunSummary, StopReason, TaskDescriptor, TaskIndex, TaskOutcome, WorkerId};

use crate::runner::Dispatch;

/// Key of an in-flight execution inside one run.
pub type FlightKey = u64;

/// Bookkeeping for one dispatched, not yet completed task.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub descriptor: TaskDescriptor,
    pub task_index: TaskIndex,
    pub worker_id: WorkerId,
    pub started_at: OffsetDateTime,
    pub cancel: CancellationToken,
}

impl InFlight {
    /// Outcome for an execution that ended without reporting one.
    pub fn lost(&self, reason: &str) -> TaskOutcome {
        let mut outcome = TaskOutcome::started(&self.descriptor, self.task_index, self.worker_id);
        outcome.start_time = self.started_at;
        outcome.finish(fanrun_model::TaskStatus::Error, format!("Error: {reason}"))
    }
}

/// Mutable state of one scheduler run.
///
/// Owned exclusively by the coordinating loop; nothing here is shared across tasks.
#[derive(Debug)]
pub struct SchedulerState {
    total: usize,
    pending: VecDeque<TaskDescriptor>,
    in_flight: HashMap<FlightKey, InFlight>,
    free_slots: BTreeSet<WorkerId>,
    next_key: FlightKey,
    dispatched: usize,

    /// Outcomes consolidated so far, whatever their status.
    pub total_completed: u64,
    /// Non-successful outcomes since the last success.
    pub consecutive_failures: u32,
    pub completed: usize,
    pub failed: usize,
    pub cancelled_outcomes: usize,
    pub shutdown_requested: bool,
}

impl SchedulerState {
    pub fn new(tasks: Vec<TaskDescriptor>, max_workers: usize) -> Self {
        Self {
            total: tasks.len(),
            pending: tasks.into(),
            in_flight: HashMap::new(),
            free_slots: (1..=max_workers).collect(),
            next_key: 0,
            dispatched: 0,
            total_completed: 0,
            consecutive_failures: 0,
            completed: 0,
            failed: 0,
            cancelled_outcomes: 0,
            shutdown_requested: false,
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    #[inline]
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Returns `true` while another task may be started right now.
    pub fn can_dispatch(&self) -> bool {
        !self.shutdown_requested && !self.pending.is_empty() && !self.free_slots.is_empty()
    }

    /// Move the next pending descriptor into flight on the lowest free worker slot.
    ///
    /// The task's cancel token is a child of `parent`, so cancelling the parent reaches it too.
    pub fn dispatch_next(
        &mut self,
        parent: &CancellationToken,
    ) -> Option<(FlightKey, Dispatch, CancellationToken)> {
        if !self.can_dispatch() {
            return None;
        }
        let worker_id = self.free_slots.pop_first()?;
        let Some(descriptor) = self.pending.pop_front() else {
            self.free_slots.insert(worker_id);
            return None;
        };

        self.dispatched += 1;
        self.next_key += 1;
        let key = self.next_key;
        let cancel = parent.child_token();

        self.in_flight.insert(
            key,
            InFlight {
                descriptor: descriptor.clone(),
                task_index: self.dispatched,
                worker_id,
                started_at: OffsetDateTime::now_utc(),
                cancel: cancel.clone(),
            },
        );

        let dispatch = Dispatch {
            descriptor,
            task_index: self.dispatched,
            worker_id,
        };
        Some((key, dispatch, cancel))
    }

    /// Remove an execution from flight and free its worker slot.
    pub fn complete(&mut self, key: FlightKey) -> Option<InFlight> {
        let entry = self.in_flight.remove(&key)?;
        self.free_slots.insert(entry.worker_id);
        Some(entry)
    }

    /// Fold one outcome into the counters.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.total_completed += 1;

        if outcome.status.is_success() {
            self.completed += 1;
            self.consecutive_failures = 0;
            return;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if outcome.status.is_failure() {
            self.failed += 1;
        } else {
            self.cancelled_outcomes += 1;
        }
    }

    /// Stop dispatching and cancel every in-flight execution.
    ///
    /// Returns `false` if shutdown was already requested. Cancelling is idempotent either way.
    pub fn request_shutdown(&mut self) -> bool {
        let first = !self.shutdown_requested;
        self.shutdown_requested = true;
        for entry in self.in_flight.values() {
            entry.cancel.cancel();
        }
        first
    }

    /// Take every execution still in flight.
    pub fn take_in_flight(&mut self) -> Vec<InFlight> {
        let mut lost: Vec<(FlightKey, InFlight)> = self.in_flight.drain().collect();
        lost.sort_by_key(|(key, _)| *key);
        lost.into_iter()
            .map(|(_, entry)| {
                self.free_slots.insert(entry.worker_id);
                entry
            })
            .collect()
    }

    pub fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary::new(self.total, self.completed, self.failed, stop_reason)
    }
}
