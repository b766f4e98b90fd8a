//! Failure-rate circuit breaker.
//!
//! Pure functions over the scheduler counters; the breaker keeps no state of its own.
use fanrun_model::{AutoStopConfig, BreakerTrip};

/// Returns the first tripped condition, if any.
///
/// The consecutive-failure condition is checked first. The rate condition only applies once
/// `total_completed` reached `min_tasks_for_rate_check` and trips on a rate strictly above the limit.
pub fn evaluate(
    consecutive_failures: u32,
    total_completed: u64,
    failed: u64,
    cfg: &AutoStopConfig,
) -> Option<BreakerTrip> {
    if consecutive_failures >= cfg.max_consecutive_failures {
        return Some(BreakerTrip::ConsecutiveFailures {
            count: consecutive_failures,
            limit: cfg.max_consecutive_failures,
        });
    }

    if total_completed > 0 && total_completed >= cfg.min_tasks_for_rate_check {
        let rate = failed as f64 / total_completed as f64;
        if rate > cfg.max_failure_rate {
            return Some(BreakerTrip::FailureRate {
                rate,
                limit: cfg.max_failure_rate,
                completed: total_completed,
            });
        }
    }
    None
}

#[inline]
pub fn should_stop(
    consecutive_failures: u32,
    total_completed: u64,
    failed: u64,
    cfg: &AutoStopConfig,
) -> bool {
    evaluate(consecutive_failures, total_completed, failed, cfg).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AutoStopConfig {
        AutoStopConfig {
            enabled: true,
            max_consecutive_failures: 5,
            max_failure_rate: 0.5,
            min_tasks_for_rate_check: 10,
        }
    }

    #[test]
    fn consecutive_limit_trips_at_threshold() {
        assert!(!should_stop(4, 4, 4, &cfg()));
        assert_eq!(
            evaluate(5, 5, 5, &cfg()),
            Some(BreakerTrip::ConsecutiveFailures { count: 5, limit: 5 })
        );
    }

    #[test]
    fn rate_is_ignored_below_minimum_sample() {
        assert!(!should_stop(0, 9, 8, &cfg()));
    }

    #[test]
    fn rate_must_strictly_exceed_limit() {
        assert!(!should_stop(0, 10, 5, &cfg()));
        assert_eq!(
            evaluate(1, 10, 6, &cfg()),
            Some(BreakerTrip::FailureRate {
                rate: 0.6,
                limit: 0.5,
                completed: 10
            })
        );
    }

    #[test]
    fn zero_minimum_does_not_divide_by_zero() {
        let cfg = AutoStopConfig {
            min_tasks_for_rate_check: 0,
            ..cfg()
        };
        assert!(!should_stop(0, 0, 0, &cfg));
    }
}
