use serde::{Deserialize, Serialize};

/// Circuit-breaker thresholds.
///
/// Either condition alone trips the breaker:
/// - `max_consecutive_failures` non-successful outcomes in a row;
/// - once `min_tasks_for_rate_check` tasks completed, a failure rate strictly above `max_failure_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStopConfig {
    pub enabled: bool,
    pub max_consecutive_failures: u32,
    pub max_failure_rate: f64,
    pub min_tasks_for_rate_check: u64,
}

impl Default for AutoStopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_consecutive_failures: 5,
            max_failure_rate: 0.5,
            min_tasks_for_rate_check: 10,
        }
    }
}

impl AutoStopConfig {
    pub(crate) fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.max_consecutive_failures == 0 {
            errors.push("max_consecutive_failures must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.max_failure_rate) {
            errors.push("max_failure_rate must be between 0 and 1".into());
        }
    }
}
