//! Microsecond clock sources for the cycle scheduler.
//!
//! The scheduler only needs a non-blocking, monotonic `u64` microsecond
//! counter. Wraparound of the counter is handled by the scheduler with
//! wrapping subtraction, so clocks are free to overflow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic microsecond counter.
pub trait Clock {
    /// Current reading in microseconds. Must not block.
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Host monotonic clock, counting microseconds since construction.
///
/// Reads `CLOCK_MONOTONIC` on Linux and falls back to [`Instant`] elsewhere.
/// The reading is truncated to 64 bits and wraps like the hardware timer it
/// stands in for.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin_us: u64,
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Start a clock reading 0 now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin_us: raw_monotonic_us().unwrap_or(0),
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn now_us(&self) -> u64 {
        match raw_monotonic_us() {
            Some(now) => now.wrapping_sub(self.origin_us),
            None => self.origin.elapsed().as_micros() as u64,
        }
    }
}

#[cfg(target_os = "linux")]
#[inline]
#[allow(clippy::cast_sign_loss)]
fn raw_monotonic_us() -> Option<u64> {
    use nix::time::{clock_gettime, ClockId};

    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC).ok()?;
    let secs = ts.tv_sec() as u64;
    let micros = (ts.tv_nsec() / 1_000) as u64;
    Some(secs.wrapping_mul(1_000_000).wrapping_add(micros))
}

#[cfg(not(target_os = "linux"))]
#[inline]
fn raw_monotonic_us() -> Option<u64> {
    None
}

/// Manually advanced clock for tests and simulation.
///
/// Clones share the same counter, so a test can keep one handle and move
/// time forward while the scheduler (or a task) holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start_us`.
    #[must_use]
    pub fn new(start_us: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_us)),
        }
    }

    /// Jump to an absolute reading.
    pub fn set(&self, now_us: u64) {
        self.now.store(now_us, Ordering::Relaxed);
    }

    /// Move time forward, wrapping on overflow.
    pub fn advance(&self, delta_us: u64) {
        self.now.fetch_add(delta_us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}
