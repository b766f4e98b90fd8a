mod auto_stop;
pub use auto_stop::AutoStopConfig;

mod error;
pub use error::ConfigError;

mod execution;
pub use execution::{ExecutionConfig, RlimitConfig};

mod limits;
pub use limits::{LimitsConfig, MAX_TIMEOUT_SECS};

mod security;
pub use security::SecurityConfig;

use serde::{Deserialize, Serialize};

/// Fully resolved engine configuration.
///
/// Loading and merging configuration files happens outside the engine; the result is deserialized into this struct
/// (missing fields take their defaults) and checked once with [`EngineConfig::validate`] before any task starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: LimitsConfig,
    pub security: SecurityConfig,
    pub execution: ExecutionConfig,
    pub auto_stop: AutoStopConfig,
}

impl EngineConfig {
    /// Check every section and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.limits.collect_errors(&mut errors);
        self.security.collect_errors(&mut errors);
        self.execution.collect_errors(&mut errors);
        self.auto_stop.collect_errors(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Lower values that exceed the configured ceilings (see [`LimitsConfig::clamp_to_ceilings`]).
    pub fn clamped(mut self) -> Self {
        self.limits.clamp_to_ceilings();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_reports_every_violation() {
        let mut cfg = EngineConfig::default();
        cfg.limits.max_workers = 0;
        cfg.limits.timeout_secs = 0;
        cfg.limits.task_start_delay_secs = 61.0;
        cfg.auto_stop.max_failure_rate = 1.5;

        let err = cfg.validate().unwrap_err();
        let ConfigError::Invalid(list) = &err;
        assert_eq!(list.len(), 4);

        let msg = err.to_string();
        assert!(msg.contains("max_workers must be positive"));
        assert!(msg.contains("timeout_secs must be positive"));
        assert!(msg.contains("task_start_delay_secs cannot exceed 60"));
        assert!(msg.contains("max_failure_rate must be between 0 and 1"));
    }

    #[test]
    fn missing_sections_take_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"limits": {"max_workers": 4}, "auto_stop": {"enabled": true}}"#)
                .unwrap();
        assert_eq!(cfg.limits.max_workers, 4);
        assert_eq!(cfg.limits.timeout_secs, 600);
        assert!(cfg.auto_stop.enabled);
        assert_eq!(cfg.auto_stop.max_consecutive_failures, 5);
        assert!(cfg.execution.use_process_groups);
    }

    #[test]
    fn clamped_applies_ceilings() {
        let mut cfg = EngineConfig::default();
        cfg.limits.max_workers = 500;
        let cfg = cfg.clamped();
        assert_eq!(cfg.limits.max_workers, cfg.limits.max_allowed_workers);
    }
}
