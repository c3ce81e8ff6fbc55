// ABOUTME: Byte-count progress tracking for transfers: percentage, throughput, ETA.
// ABOUTME: Snapshots are pure values; the tracker throttles how often they are produced.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Default sampling window for the instantaneous rate.
pub const SAMPLE_WINDOW: Duration = Duration::from_millis(100);

const MIN_RATE: f64 = 1e-6;

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub bytes_done: u64,
    /// `None` when neither the transfer nor an estimate gave a size.
    pub bytes_total: Option<u64>,
    /// The total came from an out-of-band estimate and may be wrong.
    pub total_is_estimate: bool,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Bytes per second over the last sampling window.
    pub rate: f64,
}

impl ProgressSnapshot {
    pub fn compute(
        bytes_done: u64,
        bytes_total: Option<u64>,
        elapsed: Duration,
        rate: f64,
    ) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 0.0 };
        Self {
            bytes_done,
            bytes_total,
            total_is_estimate: false,
            elapsed,
            rate,
        }
    }

    /// Completion in percent, always within `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        match self.bytes_total {
            Some(total) if total > 0 => {
                let pct = self.bytes_done as f64 / total as f64 * 100.0;
                pct.clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }

    /// Remaining time at the current rate.
    ///
    /// `None` while the rate is unknown or the estimate does not fit in a `Duration`.
    pub fn eta(&self) -> Option<Duration> {
        let total = self.bytes_total?;
        if !self.rate.is_finite() || self.rate < MIN_RATE {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_done) as f64;
        Duration::try_from_secs_f64(remaining / self.rate).ok()
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes_total {
            Some(total) => write!(
                f,
                "{:.1}% ({} / {}{})",
                self.percentage(),
                format_bytes(self.bytes_done),
                if self.total_is_estimate { "~" } else { "" },
                format_bytes(total)
            )?,
            None => write!(f, "{}", format_bytes(self.bytes_done))?,
        }
        write!(f, " at {}/s", format_bytes(self.rate as u64))?;
        match self.eta() {
            Some(eta) => write!(f, ", ETA {}", format_duration(eta)),
            None => write!(f, ", ETA unknown"),
        }
    }
}

/// Turns a stream of cumulative byte counts into throttled snapshots.
#[derive(Debug)]
pub struct ProgressTracker {
    total: Option<u64>,
    estimated: bool,
    window: Duration,
    started: Instant,
    sample_at: Instant,
    sample_bytes: u64,
    bytes_done: u64,
    rate: f64,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self::starting_at(total, Instant::now())
    }

    pub fn starting_at(total: Option<u64>, started: Instant) -> Self {
        Self {
            total,
            estimated: false,
            window: SAMPLE_WINDOW,
            started,
            sample_at: started,
            sample_bytes: 0,
            bytes_done: 0,
            rate: 0.0,
        }
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Use `estimate` as the total when the real size is unknown.
    pub fn with_estimate(mut self, estimate: Option<u64>) -> Self {
        if self.total.is_none() && estimate.is_some() {
            self.total = estimate;
            self.estimated = true;
        }
        self
    }

    pub fn record(&mut self, bytes_done: u64) -> Option<ProgressSnapshot> {
        self.record_at(bytes_done, Instant::now())
    }

    /// Record the cumulative count; returns a snapshot once per sampling window.
    pub fn record_at(&mut self, bytes_done: u64, now: Instant) -> Option<ProgressSnapshot> {
        self.bytes_done = self.bytes_done.max(bytes_done);
        let dt = now.saturating_duration_since(self.sample_at);
        if dt < self.window {
            return None;
        }
        let delta = self.bytes_done.saturating_sub(self.sample_bytes);
        self.rate = delta as f64 / dt.as_secs_f64();
        self.sample_at = now;
        self.sample_bytes = self.bytes_done;
        Some(self.snapshot_at(now))
    }

    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot::compute(
            self.bytes_done,
            self.total,
            now.saturating_duration_since(self.started),
            self.rate,
        );
        snapshot.total_is_estimate = self.estimated;
        snapshot
    }

    /// Final snapshot, emitted regardless of the window.
    pub fn finish(&mut self) -> ProgressSnapshot {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed > 0.0 {
            self.rate = self.bytes_done as f64 / elapsed;
        }
        self.snapshot_at(now)
    }
}

/// Render a byte count such as `12.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Render a duration such as `1m 05s` or `1h 02m 03s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn half_done_at_ten_mib_per_second() {
        let snap = ProgressSnapshot::compute(
            50 * MIB,
            Some(100 * MIB),
            Duration::from_secs(5),
            (10 * MIB) as f64,
        );
        assert_eq!(snap.percentage(), 50.0);
        assert_eq!(snap.eta(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn eta_unknown_without_rate_or_total() {
        let idle = ProgressSnapshot::compute(10, Some(100), Duration::ZERO, 0.0);
        assert_eq!(idle.eta(), None);
        let nan = ProgressSnapshot::compute(10, Some(100), Duration::ZERO, f64::NAN);
        assert_eq!(nan.rate, 0.0);
        assert_eq!(nan.eta(), None);
        let open = ProgressSnapshot::compute(10, None, Duration::ZERO, 5.0);
        assert_eq!(open.eta(), None);
        assert_eq!(open.percentage(), 0.0);
    }

    #[test]
    fn eta_too_large_for_a_duration_is_unknown() {
        let slow = ProgressSnapshot::compute(0, Some(u64::MAX), Duration::ZERO, MIN_RATE);
        assert_eq!(slow.eta(), None);
        assert!(slow.to_string().contains("ETA unknown"));
    }

    #[test]
    fn percentage_clamped_when_estimate_is_low() {
        let snap = ProgressSnapshot::compute(150, Some(100), Duration::ZERO, 1.0);
        assert_eq!(snap.percentage(), 100.0);
        assert_eq!(snap.eta(), Some(Duration::ZERO));
        let empty = ProgressSnapshot::compute(0, Some(0), Duration::ZERO, 0.0);
        assert_eq!(empty.percentage(), 0.0);
    }

    #[test]
    fn tracker_throttles_to_window() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::starting_at(Some(1000), start);
        assert!(tracker.record_at(100, start + Duration::from_millis(50)).is_none());
        let snap = tracker
            .record_at(200, start + Duration::from_millis(200))
            .unwrap();
        assert_eq!(snap.bytes_done, 200);
        assert!((snap.rate - 1000.0).abs() < 1e-6);
        assert!(tracker.record_at(300, start + Duration::from_millis(250)).is_none());
    }

    #[test]
    fn estimate_only_applies_to_unknown_total() {
        let tracker = ProgressTracker::new(None).with_estimate(Some(4096));
        let snap = tracker.snapshot_at(Instant::now());
        assert_eq!(snap.bytes_total, Some(4096));
        assert!(snap.total_is_estimate);

        let known = ProgressTracker::new(Some(10)).with_estimate(Some(4096));
        assert_eq!(known.snapshot_at(Instant::now()).bytes_total, Some(10));
    }

    #[test]
    fn human_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(13_107_200), "12.5 MB");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
