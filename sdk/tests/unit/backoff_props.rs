//! Property-based tests for the retry backoff schedule

use baas_sdk::{BackoffSchedule, RetryPlan};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn prop_schedule_allows_max_minus_one_sleeps(max in 1u32..10, initial_ms in 1u64..5000) {
        let mut schedule = BackoffSchedule::new(max, Duration::from_millis(initial_ms));
        let mut delays = Vec::new();
        while let Some(delay) = schedule.after_failure() {
            delays.push(delay);
        }
        prop_assert_eq!(delays.len() as u32, max - 1);
        prop_assert_eq!(schedule.failed_attempts(), max);
    }

    #[test]
    fn prop_delays_double(max in 2u32..10, initial_ms in 1u64..5000) {
        let mut schedule = BackoffSchedule::new(max, Duration::from_millis(initial_ms));
        let mut previous = schedule.after_failure().unwrap();
        prop_assert_eq!(previous, Duration::from_millis(initial_ms));
        while let Some(delay) = schedule.after_failure() {
            prop_assert_eq!(delay, previous * 2);
            previous = delay;
        }
    }

    #[test]
    fn prop_initial_delay_within_jitter(base_ms in 0u64..5000, jitter_ms in 0u64..2000) {
        let plan = RetryPlan::new(
            5,
            Duration::from_millis(base_ms),
            Duration::from_millis(jitter_ms),
        )
        .unwrap();
        let delay = plan.initial_delay(&mut rand::thread_rng());
        prop_assert!(delay >= Duration::from_millis(base_ms));
        prop_assert!(delay <= Duration::from_millis(base_ms + jitter_ms));
    }
}
