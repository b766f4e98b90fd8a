pub mod limits;
pub use limits::attach_rlimits;

pub mod workspace;
pub use workspace::{resolve_workdir, worker_dir};
