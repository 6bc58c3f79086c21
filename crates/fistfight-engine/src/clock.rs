//! Monotonic UTC time source, injectable for tests (spec.md §4.1).

use std::sync::atomic::{AtomicI64, Ordering};

use fistfight_types::UtcMillis;

/// A source of the current UTC instant. All deadline comparisons in the
/// store and services go through this trait exclusively — nothing reads
/// `SystemTime::now()` directly outside of `SystemClock`.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcMillis;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcMillis {
        UtcMillis::from_system_now()
    }
}

/// A controllable clock for tests: starts at a fixed instant and only
/// advances when told to.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(start: UtcMillis) -> Self {
        Self { millis: AtomicI64::new(start.0) }
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_seconds(&self, delta: u32) {
        self.advance_millis(i64::from(delta) * 1000);
    }

    pub fn set(&self, to: UtcMillis) {
        self.millis.store(to.0, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> UtcMillis {
        UtcMillis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(UtcMillis(1_000));
        assert_eq!(clock.now(), UtcMillis(1_000));
        clock.advance_seconds(10);
        assert_eq!(clock.now(), UtcMillis(11_000));
    }
}
