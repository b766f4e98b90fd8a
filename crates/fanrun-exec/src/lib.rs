//! Process execution for the fanrun engine.
//!
//! [`CommandTemplate`] renders a task descriptor into an argv vector without ever going through a shell;
//! [`ProcRunner`] spawns it, captures its output under a deadline and terminates its process group
//! when it times out or is cancelled.

pub mod command;
pub use command::{CommandTemplate, RenderedCommand};

mod error;
pub use error::ExecError;

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::ProcRunner;

pub mod utils;

pub mod prelude {
    pub use crate::command::{CommandTemplate, RenderedCommand};
    pub use crate::error::ExecError;
    #[cfg(feature = "proc")]
    pub use crate::proc::ProcRunner;
}
