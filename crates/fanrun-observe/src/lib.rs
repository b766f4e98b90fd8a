//! Logging for fanrun: subscriber initialisation and a result sink that logs every outcome.
mod logger;
pub use logger::*;

mod sink;
pub use sink::{LogSink, log_outcome, log_summary};
