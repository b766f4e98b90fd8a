use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MAX_GRACE_SECS: f64 = 3600.0;

/// Process and workspace settings applied to every spawned task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Start every child in its own session/process group and signal the whole group on termination.
    pub use_process_groups: bool,
    /// Give every worker slot its own directory below `workspace_root`.
    pub workspace_isolation: bool,
    pub workspace_root: PathBuf,
    /// Time between the polite and the forceful termination signal.
    pub termination_grace_secs: f64,
    pub rlimits: RlimitConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            use_process_groups: true,
            workspace_isolation: false,
            workspace_root: default_workspace_root(),
            termination_grace_secs: 5.0,
            rlimits: RlimitConfig::default(),
        }
    }
}

impl ExecutionConfig {
    #[inline]
    pub fn termination_grace(&self) -> Duration {
        Duration::try_from_secs_f64(self.termination_grace_secs.min(MAX_GRACE_SECS))
            .unwrap_or_default()
    }

    pub(crate) fn collect_errors(&self, errors: &mut Vec<String>) {
        if !self.termination_grace_secs.is_finite() || self.termination_grace_secs <= 0.0 {
            errors.push("termination_grace_secs must be positive".into());
        } else if self.termination_grace_secs > MAX_GRACE_SECS {
            errors.push(format!(
                "termination_grace_secs cannot exceed {MAX_GRACE_SECS} seconds"
            ));
        }
        if self.workspace_root.as_os_str().is_empty() {
            errors.push("workspace_root cannot be empty".into());
        }
        if self.rlimits.max_open_files == Some(0) {
            errors.push("rlimits.max_open_files must be positive".into());
        }
        if self.rlimits.memory_limit_mb == Some(0) {
            errors.push("rlimits.memory_limit_mb must be positive".into());
        }
    }
}

fn default_workspace_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fanrun")
        .join("workspace")
}

/// Declarative rlimits for a child process.
///
/// `None` leaves the inherited limit unchanged; `disable_core_dumps = false` keeps the OS default.
/// Only honoured on Unix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlimitConfig {
    /// `RLIMIT_NOFILE`.
    pub max_open_files: Option<u64>,
    /// `RLIMIT_FSIZE`, in bytes.
    pub max_file_size_bytes: Option<u64>,
    /// `RLIMIT_AS`, in megabytes.
    pub memory_limit_mb: Option<u64>,
    /// `RLIMIT_CORE = 0`.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    /// Returns `true` if no explicit limits are configured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none()
            && self.max_file_size_bytes.is_none()
            && self.memory_limit_mb.is_none()
            && !self.disable_core_dumps
    }

    /// Address-space limit in bytes, if configured.
    #[inline]
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_root_ends_with_fanrun_workspace() {
        let cfg = ExecutionConfig::default();
        assert!(cfg.workspace_root.ends_with("fanrun/workspace"));
        assert_eq!(cfg.termination_grace(), Duration::from_secs(5));
    }

    #[test]
    fn rlimits_default_is_empty() {
        let r = RlimitConfig::default();
        assert!(r.is_empty());
        assert_eq!(r.memory_limit_bytes(), None);

        let r = RlimitConfig {
            memory_limit_mb: Some(2),
            ..Default::default()
        };
        assert!(!r.is_empty());
        assert_eq!(r.memory_limit_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn zero_grace_is_rejected() {
        let cfg = ExecutionConfig {
            termination_grace_secs: 0.0,
            ..Default::default()
        };
        let mut errors = Vec::new();
        cfg.collect_errors(&mut errors);
        assert_eq!(errors, vec!["termination_grace_secs must be positive"]);
    }

    #[test]
    fn huge_grace_is_rejected() {
        for grace in [1e300, 3600.5] {
            let cfg = ExecutionConfig {
                termination_grace_secs: grace,
                ..Default::default()
            };
            let mut errors = Vec::new();
            cfg.collect_errors(&mut errors);
            assert_eq!(errors, vec!["termination_grace_secs cannot exceed 3600 seconds"]);
        }
    }
}
