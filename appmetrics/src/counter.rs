//! A signed integer accumulator.

use parking_lot::Mutex;

use crate::snapshot::Snapshot;

/// A signed integer accumulator. `observe(v)` adds `v` (truncated towards
/// zero) to the running total.
pub struct Counter {
    value: Mutex<i64>,
}

impl Counter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self { value: Mutex::new(0) }
    }

    /// Adds `value` (truncated to an integer) to the running total.
    pub fn observe(&self, value: f64) {
        *self.value.lock() += value as i64;
    }

    /// Increments by one.
    pub fn inc(&self) {
        *self.value.lock() += 1;
    }

    /// Decrements by one.
    pub fn dec(&self) {
        *self.value.lock() -= 1;
    }

    /// Resets the accumulator to zero.
    pub fn reset(&self) {
        *self.value.lock() = 0;
    }

    /// Current accumulated value.
    pub fn get(&self) -> i64 {
        *self.value.lock()
    }

    /// Takes a point-in-time snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::Counter { value: self.get() }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_deltas() {
        let c = Counter::new();
        c.observe(5.0);
        c.observe(-2.0);
        c.inc();
        c.dec();
        c.dec();
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn reset_zeroes_the_total() {
        let c = Counter::new();
        c.observe(10.0);
        c.reset();
        assert_eq!(c.get(), 0);
    }
}
