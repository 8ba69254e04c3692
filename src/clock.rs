//! Abstract monotonic time source.
//!
//! The engines only need a non-decreasing `now()` and a cancellable sleep;
//! abstracting over it lets the controller/agent state machines run against
//! a virtual clock in tests instead of real wall time (spec §4.8).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// A monotonic time source usable by the engines.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns a monotonically non-decreasing instant.
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`, or until woken for a manual
    /// clock implementation used in tests.
    async fn sleep(&self, duration: Duration);
}

/// The real wall-clock-backed [`Clock`], using `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A manually-advanced clock for deterministic tests.
///
/// `now()` is computed as a fixed epoch plus an atomically-tracked offset;
/// `sleep` advances the offset immediately rather than actually waiting,
/// so retry-backoff tests run instantly.
#[derive(Debug)]
pub struct ManualClock {
    epoch: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    /// Advances the clock by `duration` without suspending the caller.
    pub fn advance(&self, duration: Duration) {
        self.offset_millis
            .fetch_add(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.now(), start + Duration::from_secs(5));
    }

    #[tokio::test]
    async fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        clock.sleep(Duration::from_millis(1)).await;
        let b = clock.now();
        assert!(b >= a);
    }
}
