//! Injectable clock
//!
//! Feeds never read wall-clock time directly; they go through a `Clock`
//! handle injected at construction. Production uses `SystemClock`, tests
//! and deterministic replays use `ManualClock`, which only moves when told
//! to.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Timelike, Utc};

/// Source of "now" in Unix milliseconds.
pub trait Clock: Send + Sync {
    /// Current time according to this clock.
    fn now_ms(&self) -> i64;

    /// Identifier for debugging.
    fn name(&self) -> &'static str {
        "clock"
    }
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// A clock that only advances when explicitly moved. Shared freely across
/// a feed and its driver via `Arc`.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock at the given instant.
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicI64::new(start_ms),
        })
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by a delta, returning the new time.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// UTC hour of day (0..24) for a Unix-millisecond timestamp.
///
/// Drives the intraday volume/spread curves, so it is derived from the
/// feed's simulated time rather than the host clock.
pub fn hour_of_day(timestamp_ms: i64) -> u32 {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.hour())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000); // after Sep 2020
    }

    #[test]
    fn test_manual_clock_control() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);

        clock.set(10_000);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn test_hour_of_day() {
        // 2024-02-16 00:00:00 UTC
        let midnight = 1_708_041_600_000;
        assert_eq!(hour_of_day(midnight), 0);
        assert_eq!(hour_of_day(midnight + 9 * 3_600_000), 9);
        assert_eq!(hour_of_day(midnight + 23 * 3_600_000 + 59 * 60_000), 23);
    }
}
