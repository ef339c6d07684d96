//! Property tests for the adaptive tick interval.

use proptest::prelude::*;
use std::time::Duration;

use duskshift::core::adaptive_interval;

const MIN: Duration = Duration::from_millis(50);
const MAX: Duration = Duration::from_millis(500);

fn duration_strategy() -> impl Strategy<Value = Duration> {
    (1u64..=4 * 3600).prop_map(Duration::from_secs)
}

proptest! {
    #[test]
    fn test_interval_stays_in_bounds(
        delta in 0u32..10_000,
        duration in duration_strategy(),
        monitors in 0usize..16,
        avg in prop_oneof![0.0..500.0, Just(f64::NAN), Just(f64::INFINITY), Just(-3.0)],
    ) {
        let interval = adaptive_interval(delta, duration, monitors, avg);
        prop_assert!(interval >= MIN && interval <= MAX, "{interval:?}");
    }

    #[test]
    fn test_more_monitors_never_shorten(
        delta in 0u32..10_000,
        duration in duration_strategy(),
        monitors in 1usize..12,
        avg in 0.0..50.0f64,
    ) {
        let fewer = adaptive_interval(delta, duration, monitors, avg);
        let more = adaptive_interval(delta, duration, monitors + 1, avg);
        prop_assert!(more >= fewer);
    }

    #[test]
    fn test_slower_writes_never_shorten(
        delta in 0u32..10_000,
        duration in duration_strategy(),
        monitors in 1usize..8,
        avg in 0.0..100.0f64,
        extra in 0.0..100.0f64,
    ) {
        let fast = adaptive_interval(delta, duration, monitors, avg);
        let slow = adaptive_interval(delta, duration, monitors, avg + extra);
        prop_assert!(slow >= fast);
    }

    #[test]
    fn test_larger_delta_never_lengthens(
        delta in 0u32..9_000,
        step in 0u32..1_000,
        duration in duration_strategy(),
        monitors in 1usize..8,
        avg in 0.0..20.0f64,
    ) {
        let near = adaptive_interval(delta, duration, monitors, avg);
        let far = adaptive_interval(delta + step, duration, monitors, avg);
        prop_assert!(far <= near);
    }
}
