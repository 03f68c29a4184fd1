//! Time source abstraction.
//!
//! Every timing decision in the firmware (poll intervals, settle delays,
//! enrollment deadlines, reconnect cool-downs) goes through the [`Clock`]
//! trait instead of reading the system clock directly. Production code uses
//! [`SystemClock`]; tests drive state machines deterministically with
//! [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    fn elapsed_ms(&self, earlier: Instant) -> u64 {
        self.now().saturating_duration_since(earlier).as_millis() as u64
    }
}

/// Real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// Starts at an arbitrary fixed instant and only moves when [`advance`]
/// is called. Cloning shares the underlying offset, so a machine under test
/// and the test body observe the same time.
///
/// [`advance`]: ManualClock::advance
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.elapsed_ms(start), 0);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(1500);
        assert_eq!(clock.elapsed_ms(start), 1500);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = clock.now();
        other.advance(42);
        assert_eq!(clock.elapsed_ms(start), 42);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
