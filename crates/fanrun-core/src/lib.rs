//! Scheduling side of the fanrun engine.
//!
//! The [`Scheduler`] keeps a bounded number of tasks in flight, hands each one to a [`Runner`],
//! consolidates the outcomes, forwards them to [`ResultSink`]s and stops early when the
//! circuit breaker trips or a shutdown is requested through the [`ShutdownHandle`].

pub mod breaker;

mod error;
pub use error::{CoreError, RunnerError, SinkError};

pub mod runner;
pub use runner::{Dispatch, Runner, StopSignals};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod shutdown;
pub use shutdown::{ShutdownHandle, listen_for_signals};

pub mod sink;
pub use sink::{MemorySink, ResultSink};

pub mod state;
pub use state::SchedulerState;
