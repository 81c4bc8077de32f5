//! Time source abstraction.
//!
//! Record timestamps, staleness checks and eviction all read the clock
//! through [`TimeSource`], so tests can drive time explicitly with a
//! [`ManualClock`] while production uses the [`SystemClock`].
//!
//! All times are UTC milliseconds since the Unix epoch.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over the wall clock.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Real time source using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    #[allow(clippy::cast_possible_truncation)] // Milliseconds won't overflow i64 for millions of years
    fn now_ms(&self) -> i64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_millis() as i64)
    }
}

/// A clock that only moves when told to.
///
/// Shared between the writer task, the eviction task and the test driving
/// them, so the current time is held atomically.
///
/// # Example
///
/// ```
/// use aggregator::storage::{ManualClock, TimeSource};
///
/// let clock = ManualClock::new(1000);
/// clock.advance(250);
/// assert_eq!(clock.now_ms(), 1250);
///
/// clock.set(5000);
/// assert_eq!(clock.now_ms(), 5000);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    current_ms: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(initial_ms: i64) -> Self {
        Self {
            current_ms: AtomicI64::new(initial_ms),
        }
    }

    /// Start at `1_700_000_000_000` (November 2023).
    #[must_use]
    pub const fn default_start() -> Self {
        Self::new(1_700_000_000_000)
    }

    /// Move time forward by `ms`, saturating at `i64::MAX`.
    pub fn advance(&self, ms: i64) {
        // fetch_update only fails when the closure returns None.
        let _ = self
            .current_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(ms))
            });
    }

    /// Jump to an absolute time. May move backwards.
    pub fn set(&self, time_ms: i64) {
        self.current_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::default_start()
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> i64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}
