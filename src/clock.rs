//! Monotonic tick sources and interval throttles.
//!
//! The stage never reads the wall clock directly. All time-driven behavior
//! (cache expiry, alarm sampling) runs off an abstract tick counter so tests
//! can drive it deterministically.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// A monotonic tick counter.
pub trait TickSource {
    /// Current tick count. Never decreases.
    fn now(&self) -> u64;

    /// Number of ticks in one second.
    fn ticks_per_second(&self) -> u64;
}

/// Nanosecond ticks from the process monotonic clock.
#[derive(Debug)]
pub struct MonotonicTicks {
    origin: Instant,
}

impl MonotonicTicks {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MonotonicTicks {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn ticks_per_second(&self) -> u64 {
        1_000_000_000
    }
}

/// Manually advanced tick source for tests and simulation.
///
/// Clones share the same counter, so a test can keep a handle and advance
/// time while the stage holds its own copy.
#[derive(Debug, Clone)]
pub struct ManualTicks {
    now: Rc<Cell<u64>>,
    ticks_per_second: u64,
}

impl ManualTicks {
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            ticks_per_second,
        }
    }

    /// Advance the counter by `ticks`.
    pub fn advance(&self, ticks: u64) {
        self.now.set(self.now.get() + ticks);
    }

    /// Advance the counter by `seconds` worth of ticks.
    pub fn advance_seconds(&self, seconds: u64) {
        self.advance(seconds * self.ticks_per_second);
    }
}

impl TickSource for ManualTicks {
    fn now(&self) -> u64 {
        self.now.get()
    }

    fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }
}

/// Fires at most once per interval.
#[derive(Debug)]
pub struct Throttle {
    interval: u64,
    last: u64,
}

impl Throttle {
    pub fn new(interval: u64) -> Self {
        Self { interval, last: 0 }
    }

    /// True when `interval` ticks have passed since the last firing; arms the
    /// next interval as a side effect.
    pub fn elapsed(&mut self, now: u64) -> bool {
        if now.saturating_sub(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_ticks_advance() {
        let tsc = MonotonicTicks::new();
        let a = tsc.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = tsc.now();
        assert!(b > a);
    }

    #[test]
    fn test_manual_ticks_shared_counter() {
        let tsc = ManualTicks::new(1000);
        let handle = tsc.clone();
        handle.advance_seconds(3);
        assert_eq!(tsc.now(), 3000);
    }

    #[test]
    fn test_throttle_fires_once_per_interval() {
        let mut throttle = Throttle::new(100);
        assert!(throttle.elapsed(100));
        assert!(!throttle.elapsed(150));
        assert!(!throttle.elapsed(199));
        assert!(throttle.elapsed(200));
        assert!(!throttle.elapsed(250));
    }
}
