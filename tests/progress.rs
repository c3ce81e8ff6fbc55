// ABOUTME: Property tests for transfer progress snapshots.
// ABOUTME: Percentages stay in range and never go backwards for monotone input.

use dockside::progress::{ProgressSnapshot, ProgressTracker};
use proptest::prelude::*;
use std::time::{Duration, Instant};

const MIB: u64 = 1024 * 1024;

proptest! {
    #[test]
    fn percentage_is_always_within_bounds(
        done in any::<u64>(),
        total in proptest::option::of(any::<u64>()),
        rate in any::<f64>(),
    ) {
        let snapshot = ProgressSnapshot::compute(done, total, Duration::from_secs(1), rate);
        let pct = snapshot.percentage();
        prop_assert!((0.0..=100.0).contains(&pct), "percentage {pct} out of range");
    }

    #[test]
    fn percentage_is_monotone_for_monotone_input(
        total in 1u64..=u64::MAX / 2,
        mut steps in proptest::collection::vec(any::<u64>(), 1..50),
    ) {
        steps.sort_unstable();
        let start = Instant::now();
        let mut tracker = ProgressTracker::starting_at(Some(total), start).window(Duration::ZERO);

        let mut last = 0.0;
        for (i, done) in steps.into_iter().enumerate() {
            let now = start + Duration::from_millis(i as u64 + 1);
            if let Some(snapshot) = tracker.record_at(done, now) {
                let pct = snapshot.percentage();
                prop_assert!(pct >= last, "{pct} < {last}");
                last = pct;
            }
        }
    }

    #[test]
    fn eta_is_never_negative_or_nan(
        done in any::<u64>(),
        total in any::<u64>(),
        rate in any::<f64>(),
    ) {
        let snapshot = ProgressSnapshot::compute(done, Some(total), Duration::from_secs(1), rate);
        if let Some(eta) = snapshot.eta() {
            prop_assert!(eta.as_secs_f64().is_finite());
        }
        prop_assert!(snapshot.to_string().contains("ETA"));
    }
}

#[test]
fn half_of_100_mib_at_10_mib_per_second() {
    let snapshot = ProgressSnapshot::compute(
        50 * MIB,
        Some(100 * MIB),
        Duration::from_secs(5),
        (10 * MIB) as f64,
    );
    assert!((snapshot.percentage() - 50.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.eta(), Some(Duration::from_secs(5)));
}

#[test]
fn tracker_measures_rate_over_its_window() {
    let start = Instant::now();
    let mut tracker =
        ProgressTracker::starting_at(Some(100 * MIB), start).window(Duration::from_secs(1));

    assert!(tracker.record_at(5 * MIB, start + Duration::from_millis(500)).is_none());
    let snapshot = tracker
        .record_at(10 * MIB, start + Duration::from_secs(1))
        .unwrap();

    assert!((snapshot.rate - (10 * MIB) as f64).abs() < 1.0);
    assert_eq!(snapshot.eta(), Some(Duration::from_secs(9)));
}
