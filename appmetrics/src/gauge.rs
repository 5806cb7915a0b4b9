//! A last-value holder for arbitrary numeric readings.

use parking_lot::Mutex;

use crate::snapshot::Snapshot;

/// Holds the most recently observed value, or `None` before the first
/// observation.
pub struct Gauge {
    value: Mutex<Option<f64>>,
}

impl Gauge {
    /// Creates an unset gauge.
    pub fn new() -> Self {
        Self { value: Mutex::new(None) }
    }

    /// Sets the gauge's current value.
    pub fn observe(&self, value: f64) {
        *self.value.lock() = Some(value);
    }

    /// The last-observed value, or `None` if never observed.
    pub fn get(&self) -> Option<f64> {
        *self.value.lock()
    }

    /// Takes a point-in-time snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::Gauge { value: self.get() }
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}
