//! Uniform random sample via Vitter's Algorithm R.
//!
//! [rs]: https://en.wikipedia.org/wiki/Reservoir_sampling
//! [vitter_paper]: https://www.cs.umd.edu/~samir/498/vitter.pdf

use parking_lot::Mutex;

use super::{fast_index, Reservoir, ReservoirSpec};

struct State {
    values: Vec<f64>,
    count: u64,
}

/// A random sampling reservoir of fixed capacity, producing a statistically
/// representative sample of the full stream via [Algorithm R][vitter_paper].
///
/// [vitter_paper]: https://www.cs.umd.edu/~samir/498/vitter.pdf
pub struct UniformReservoir {
    size: usize,
    state: Mutex<State>,
}

impl UniformReservoir {
    /// Creates a reservoir retaining up to `size` samples.
    pub fn new(size: usize) -> Self {
        Self { size, state: Mutex::new(State { values: Vec::with_capacity(size), count: 0 }) }
    }
}

impl Reservoir for UniformReservoir {
    fn add(&self, value: f64) -> bool {
        let mut state = self.state.lock();

        let changed = if (state.count as usize) < self.size {
            state.values.push(value);
            true
        } else {
            // The counter increment below stays inside this same critical
            // section: splitting it out (as one historical implementation
            // does) would let two concurrent admissions race on `count`
            // and violate the "each slot is a uniform sample of the
            // stream seen so far" invariant.
            let k = fast_index(state.count as usize);
            if k < self.size {
                state.values[k] = value;
                true
            } else {
                false
            }
        };
        state.count += 1;

        changed
    }

    fn values(&self) -> Vec<f64> {
        self.state.lock().values.clone()
    }

    fn spec(&self) -> ReservoirSpec {
        ReservoirSpec::Uniform { size: self.size }
    }
}
