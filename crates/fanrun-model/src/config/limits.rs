use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard upper bound for any per-task timeout: 30 days.
pub const MAX_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

/// Concurrency, timing and capture limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of tasks in flight.
    pub max_workers: usize,
    /// Per-task wall-clock timeout, measured from the task's own start.
    pub timeout_secs: u64,
    /// Poll interval of the scheduler and sampling interval of executors (0.01..=10).
    pub wait_time_secs: f64,
    /// Pause between two consecutive dispatches (0..=60). Not applied before the first one.
    pub task_start_delay_secs: f64,
    /// Number of trailing characters of stdout/stderr kept per task.
    pub max_output_capture: usize,
    /// Ceiling for `max_workers`.
    pub max_allowed_workers: usize,
    /// Ceiling for `timeout_secs`.
    pub max_allowed_timeout: u64,
    /// Ceiling for `max_output_capture`.
    pub max_allowed_output: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_workers: 20,
            timeout_secs: 600,
            wait_time_secs: 0.1,
            task_start_delay_secs: 0.0,
            max_output_capture: 1000,
            max_allowed_workers: 100,
            max_allowed_timeout: 3600,
            max_allowed_output: 10_000,
        }
    }
}

impl LimitsConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[inline]
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs_f64(self.wait_time_secs)
    }

    #[inline]
    pub fn task_start_delay(&self) -> Duration {
        Duration::from_secs_f64(self.task_start_delay_secs)
    }

    /// Lower values above their `max_allowed_*` ceiling to the ceiling, with a warning.
    pub fn clamp_to_ceilings(&mut self) {
        if self.max_workers > self.max_allowed_workers {
            warn!(
                target: "fanrun.model.config",
                requested = self.max_workers,
                limit = self.max_allowed_workers,
                "max_workers exceeds limit, using limit"
            );
            self.max_workers = self.max_allowed_workers;
        }
        if self.timeout_secs > self.max_allowed_timeout {
            warn!(
                target: "fanrun.model.config",
                requested = self.timeout_secs,
                limit = self.max_allowed_timeout,
                "timeout_secs exceeds limit, using limit"
            );
            self.timeout_secs = self.max_allowed_timeout;
        }
        if self.max_output_capture > self.max_allowed_output {
            warn!(
                target: "fanrun.model.config",
                requested = self.max_output_capture,
                limit = self.max_allowed_output,
                "max_output_capture exceeds limit, using limit"
            );
            self.max_output_capture = self.max_allowed_output;
        }
    }

    pub(crate) fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.max_workers == 0 {
            errors.push("max_workers must be positive".into());
        }
        if self.timeout_secs == 0 {
            errors.push("timeout_secs must be positive".into());
        }
        if self.timeout_secs > self.max_allowed_timeout {
            errors.push(format!(
                "timeout_secs cannot exceed max_allowed_timeout ({})",
                self.max_allowed_timeout
            ));
        }
        if self.max_allowed_timeout > MAX_TIMEOUT_SECS {
            errors.push(format!(
                "max_allowed_timeout cannot exceed {MAX_TIMEOUT_SECS} seconds"
            ));
        }
        if self.wait_time_secs.is_nan() || self.wait_time_secs < 0.01 {
            errors.push("wait_time_secs must be at least 0.01 seconds".into());
        }
        if self.wait_time_secs > 10.0 {
            errors.push("wait_time_secs cannot exceed 10 seconds".into());
        }
        if self.task_start_delay_secs.is_nan() || self.task_start_delay_secs < 0.0 {
            errors.push("task_start_delay_secs cannot be negative".into());
        }
        if self.task_start_delay_secs > 60.0 {
            errors.push("task_start_delay_secs cannot exceed 60 seconds".into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_time_bounds() {
        let mut errors = Vec::new();
        let cfg = LimitsConfig {
            wait_time_secs: 0.001,
            ..Default::default()
        };
        cfg.collect_errors(&mut errors);
        assert_eq!(errors, vec!["wait_time_secs must be at least 0.01 seconds"]);

        errors.clear();
        let cfg = LimitsConfig {
            wait_time_secs: 11.0,
            ..Default::default()
        };
        cfg.collect_errors(&mut errors);
        assert_eq!(errors, vec!["wait_time_secs cannot exceed 10 seconds"]);
    }

    #[test]
    fn timeout_above_ceiling_is_rejected() {
        let mut errors = Vec::new();
        let cfg = LimitsConfig {
            timeout_secs: u64::MAX,
            ..Default::default()
        };
        cfg.collect_errors(&mut errors);
        assert_eq!(
            errors,
            vec!["timeout_secs cannot exceed max_allowed_timeout (3600)"]
        );

        errors.clear();
        let cfg = LimitsConfig {
            timeout_secs: u64::MAX,
            max_allowed_timeout: u64::MAX,
            ..Default::default()
        };
        cfg.collect_errors(&mut errors);
        assert_eq!(
            errors,
            vec!["max_allowed_timeout cannot exceed 2592000 seconds"]
        );

        errors.clear();
        let cfg = LimitsConfig {
            timeout_secs: 3600,
            ..Default::default()
        };
        cfg.collect_errors(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut errors = Vec::new();
        let cfg = LimitsConfig {
            task_start_delay_secs: -1.0,
            ..Default::default()
        };
        cfg.collect_errors(&mut errors);
        assert_eq!(errors, vec!["task_start_delay_secs cannot be negative"]);
    }

    #[test]
    fn clamp_lowers_only_values_above_ceiling() {
        let mut cfg = LimitsConfig {
            max_workers: 8,
            timeout_secs: 10_000,
            max_output_capture: 20_000,
            ..Default::default()
        };
        cfg.clamp_to_ceilings();
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.timeout_secs, 3600);
        assert_eq!(cfg.max_output_capture, 10_000);
    }

    #[test]
    fn durations() {
        let cfg = LimitsConfig {
            timeout_secs: 3,
            wait_time_secs: 0.25,
            task_start_delay_secs: 1.5,
            ..Default::default()
        };
        assert_eq!(cfg.timeout(), Duration::from_secs(3));
        assert_eq!(cfg.wait_time(), Duration::from_millis(250));
        assert_eq!(cfg.task_start_delay(), Duration::from_millis(1500));
    }
}
