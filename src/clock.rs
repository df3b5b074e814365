//! Time sources for the cache.
//!
//! Every freshness decision goes through a [`Clock`], so tests can drive entries
//! through their fresh, stale and expired phases without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of unix timestamps in milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(duration_ms)
            .unwrap_or_default()
    }
}

/// A manually advanced clock for deterministic tests.
///
/// ```
/// use std::time::Duration;
/// use swr_engine::{Clock, TestClock};
///
/// let clock = TestClock::at(1_000);
/// clock.tick(Duration::from_secs(2));
/// assert_eq!(clock.now_ms(), 3_000);
/// ```
#[derive(Debug)]
pub struct TestClock {
    now: AtomicI64,
}

impl TestClock {
    /// Create a clock frozen at the current wall time.
    pub fn new() -> Self {
        Self::at(SystemClock.now_ms())
    }

    /// Create a clock frozen at the given timestamp.
    pub fn at(now_ms: i64) -> Self {
        TestClock {
            now: AtomicI64::new(now_ms),
        }
    }

    /// Advance the clock.
    pub fn tick(&self, by: Duration) {
        self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a duration to whole milliseconds, saturating at `i64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_positive() {
        assert!(SystemClock.now_ms() > 0);
    }

    #[test]
    fn test_test_clock_tick_and_set() {
        let clock = TestClock::at(0);
        assert_eq!(clock.now_ms(), 0);

        clock.tick(Duration::from_millis(1500));
        assert_eq!(clock.now_ms(), 1500);

        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_secs(60)), 60_000);
        assert_eq!(duration_ms(Duration::MAX), i64::MAX);
    }
}
