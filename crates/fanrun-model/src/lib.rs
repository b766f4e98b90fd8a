//! Shared types of the fanrun engine: task descriptors, outcomes, run summaries
//! and the typed engine configuration.

mod config;
pub use config::*;

mod domain;
pub use domain::*;
