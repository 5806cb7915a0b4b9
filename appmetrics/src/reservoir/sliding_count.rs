//! FIFO window over the last `N` observations, in arrival order.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{Reservoir, ReservoirSpec};

/// A bounded FIFO queue of capacity `window_size`. `add` appends; the
/// oldest entry is dropped once the queue is full.
pub struct SlidingCountReservoir {
    window_size: usize,
    values: Mutex<VecDeque<f64>>,
}

impl SlidingCountReservoir {
    /// Creates a reservoir retaining the most recent `window_size` samples.
    pub fn new(window_size: usize) -> Self {
        Self { window_size, values: Mutex::new(VecDeque::with_capacity(window_size)) }
    }
}

impl Reservoir for SlidingCountReservoir {
    fn add(&self, value: f64) -> bool {
        let mut values = self.values.lock();
        if values.len() == self.window_size {
            values.pop_front();
        }
        values.push_back(value);
        true
    }

    fn values(&self) -> Vec<f64> {
        self.values.lock().iter().copied().collect()
    }

    fn spec(&self) -> ReservoirSpec {
        ReservoirSpec::SlidingCount { window_size: self.window_size }
    }
}
