use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::{
    task::{self, JoinError, JoinSet},
    time::{Instant, sleep, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use fanrun_model::{
    BreakerTrip, EngineConfig, RunSummary, StopReason, TaskDescriptor, TaskOutcome,
};

use crate::{
    breaker,
    error::CoreError,
    runner::{Dispatch, Runner, StopSignals},
    shutdown::ShutdownHandle,
    sink::ResultSink,
    state::{FlightKey, SchedulerState},
};

/// Outcome of one executor, or why it produced none.
type Joined = Result<TaskOutcome, String>;

/// Bounded-concurrency dispatcher.
///
/// A scheduler drives one run at a time. Its [`ShutdownHandle`] stays requested once used,
/// so create a new scheduler (or pass a fresh handle) for every run.
pub struct Scheduler {
    cfg: EngineConfig,
    runner: Arc<dyn Runner>,
    sinks: Vec<Arc<dyn ResultSink>>,
    shutdown: ShutdownHandle,
}

impl Scheduler {
    /// Validate `cfg` and build a scheduler; an invalid configuration is fatal.
    pub fn new(
        cfg: EngineConfig,
        runner: Arc<dyn Runner>,
        sinks: Vec<Arc<dyn ResultSink>>,
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            runner,
            sinks,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Use an externally created shutdown handle, e.g. one already wired to OS signals.
    pub fn with_shutdown(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Run every descriptor to an outcome, or until the breaker trips or a shutdown is requested.
    #[instrument(level = "debug", skip_all, fields(runner = self.runner.name(), total = tasks.len()))]
    pub async fn run(&self, tasks: Vec<TaskDescriptor>) -> Result<RunSummary, CoreError> {
        self.runner
            .check(&tasks)
            .map_err(|source| CoreError::Runner {
                runner: self.runner.name(),
                source,
            })?;

        let limits = &self.cfg.limits;
        let delay = limits.task_start_delay();
        let poll = limits.wait_time();

        let mut state = SchedulerState::new(tasks, limits.max_workers);
        let mut set: JoinSet<Joined> = JoinSet::new();
        let mut keys: HashMap<task::Id, FlightKey> = HashMap::new();
        let mut trip: Option<BreakerTrip> = None;
        let mut next_dispatch: Option<Instant> = None;

        info!(
            target: "fanrun.core.scheduler",
            total = state.total(),
            max_workers = limits.max_workers,
            auto_stop = self.cfg.auto_stop.enabled,
            "run started"
        );

        loop {
            if self.shutdown.is_requested() && state.request_shutdown() {
                info!(
                    target: "fanrun.core.scheduler",
                    in_flight = state.in_flight_len(),
                    pending = state.pending_len(),
                    "shutdown requested, cancelling running tasks"
                );
            }

            while state.can_dispatch() {
                if let Some(at) = next_dispatch
                    && Instant::now() < at
                {
                    break;
                }
                let Some((key, dispatch, cancel)) =
                    state.dispatch_next(self.shutdown.graceful_token())
                else {
                    break;
                };
                let id = self.spawn(&mut set, dispatch, cancel);
                keys.insert(id, key);
                if !delay.is_zero() {
                    next_dispatch = Some(Instant::now() + delay);
                }
            }

            if set.is_empty() && !state.can_dispatch() {
                break;
            }

            let delayed = next_dispatch.filter(|_| state.can_dispatch());
            tokio::select! {
                Some(joined) = set.join_next_with_id(), if !set.is_empty() => {
                    if let Some((key, result)) = settle(joined, &mut keys) {
                        self.consolidate(&mut state, key, result, &mut trip).await;
                    }
                }
                _ = self.shutdown.requested(), if !state.shutdown_requested => {}
                _ = sleep_until(delayed.unwrap_or_else(Instant::now)), if delayed.is_some() => {}
                _ = sleep(poll) => {}
            }
        }

        for entry in state.take_in_flight() {
            let outcome = entry.lost("executor terminated without reporting an outcome");
            error!(
                target: "fanrun.core.scheduler",
                task_index = entry.task_index,
                task = %outcome.task,
                "synthesizing outcome for lost executor"
            );
            state.record(&outcome);
            self.publish(&outcome).await;
        }

        let reason = match trip {
            Some(trip) => StopReason::AutoStop { trip },
            None if self.shutdown.is_forced() => StopReason::ForcedShutdown,
            None if state.shutdown_requested => StopReason::Shutdown,
            None => StopReason::Completed,
        };
        let summary = state.summary(reason);

        info!(
            target: "fanrun.core.scheduler",
            total = summary.total,
            dispatched = state.dispatched(),
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            reason = %summary.stop_reason,
            "run finished"
        );
        for sink in &self.sinks {
            if let Err(e) = sink.finish(&summary).await {
                warn!(target: "fanrun.core.scheduler", sink = sink.name(), error = %e, "failed to finish sink");
            }
        }
        Ok(summary)
    }

    fn spawn(
        &self,
        set: &mut JoinSet<Joined>,
        dispatch: Dispatch,
        cancel: CancellationToken,
    ) -> task::Id {
        debug!(
            target: "fanrun.core.scheduler",
            task_index = dispatch.task_index,
            worker_id = dispatch.worker_id,
            kind = dispatch.descriptor.kind(),
            task = %dispatch.descriptor.identity(),
            "dispatching task"
        );

        let runner = Arc::clone(&self.runner);
        let signals = StopSignals::new(cancel, self.shutdown.force_token().clone());
        set.spawn(async move {
            AssertUnwindSafe(runner.execute(dispatch, signals))
                .catch_unwind()
                .await
                .map_err(|panic| format!("executor panicked: {}", panic_message(panic)))
        })
        .id()
    }

    async fn consolidate(
        &self,
        state: &mut SchedulerState,
        key: FlightKey,
        result: Joined,
        trip: &mut Option<BreakerTrip>,
    ) {
        let Some(entry) = state.complete(key) else {
            warn!(target: "fanrun.core.scheduler", key, "outcome for unknown execution, ignoring");
            return;
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(reason) => {
                error!(target: "fanrun.core.scheduler", task_index = entry.task_index, %reason, "executor produced no outcome");
                entry.lost(&reason)
            }
        };

        state.record(&outcome);
        debug!(
            target: "fanrun.core.scheduler",
            task_index = outcome.task_index,
            status = %outcome.status,
            consecutive_failures = state.consecutive_failures,
            completed = state.total_completed,
            "task finished"
        );
        self.publish(&outcome).await;

        if !self.cfg.auto_stop.enabled || state.shutdown_requested {
            return;
        }
        if let Some(t) = breaker::evaluate(
            state.consecutive_failures,
            state.total_completed,
            state.failed as u64,
            &self.cfg.auto_stop,
        ) {
            warn!(
                target: "fanrun.core.scheduler",
                trip = %t,
                in_flight = state.in_flight_len(),
                pending = state.pending_len(),
                "auto-stop triggered, cancelling remaining work"
            );
            *trip = Some(t);
            state.request_shutdown();
            // an operator signal during this drain now forces termination
            self.shutdown.request();
        }
    }

    async fn publish(&self, outcome: &TaskOutcome) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(outcome).await {
                warn!(
                    target: "fanrun.core.scheduler",
                    sink = sink.name(),
                    task_index = outcome.task_index,
                    error = %e,
                    "failed to record outcome"
                );
            }
        }
    }
}

/// Map a finished executor back to its flight key; a join failure becomes a reason without outcome.
fn settle(
    joined: Result<(task::Id, Joined), JoinError>,
    keys: &mut HashMap<task::Id, FlightKey>,
) -> Option<(FlightKey, Joined)> {
    match joined {
        Ok((id, result)) => keys.remove(&id).map(|key| (key, result)),
        Err(e) => {
            error!(target: "fanrun.core.scheduler", error = %e, "executor task failed to join");
            let key = keys.remove(&e.id())?;
            Some((key, Err(format!("executor task failed: {e}"))))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
