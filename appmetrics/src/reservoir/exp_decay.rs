//! Forward-decaying weighted reservoir (Cormode et al.): older samples get
//! exponentially lower priority, so a read always favors recent activity
//! without needing a hard time window.

use std::time::Duration;

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use super::{fast_unit_f64, Reservoir, ReservoirSpec};

const RESCALE_THRESHOLD: Duration = Duration::from_secs(3600);
const EPSILON: f64 = 1e-12;

struct State {
    clock: Clock,
    alpha: f64,
    start: Instant,
    next_rescale: Instant,
    count: usize,
    // Sorted by priority ascending.
    entries: Vec<(f64, f64)>,
}

impl State {
    fn maybe_rescale(&mut self) {
        let now = self.clock.now();
        if now <= self.next_rescale {
            return;
        }
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let factor = (-self.alpha * elapsed).exp();
        for (priority, _) in self.entries.iter_mut() {
            *priority *= factor;
        }
        self.start = now;
        self.next_rescale = now + RESCALE_THRESHOLD;
        self.count = self.entries.len();
    }

    fn weighted_priority(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        // U ~ Uniform(0, 1]: 1 - X for X ~ Uniform[0, 1) avoids a division by zero.
        let u = 1.0 - fast_unit_f64();
        (self.alpha * elapsed).exp() / u
    }
}

/// Priority-ordered forward-decay sample of capacity `size` and decay rate
/// `alpha`. See the module documentation for the decay scheme.
pub struct ExponentialDecayReservoir {
    size: usize,
    alpha: f64,
    state: Mutex<State>,
}

impl ExponentialDecayReservoir {
    /// Creates a reservoir of the given capacity and decay rate, using the
    /// system's monotonic clock.
    pub fn new(size: usize, alpha: f64) -> Self {
        Self::with_clock(size, alpha, Clock::new())
    }

    /// Creates a reservoir driven by the given clock; used in tests to
    /// control the passage of time deterministically via `Clock::mock()`.
    pub fn with_clock(size: usize, alpha: f64, clock: Clock) -> Self {
        let now = clock.now();
        let state = State {
            clock,
            alpha,
            start: now,
            next_rescale: now + RESCALE_THRESHOLD,
            count: 0,
            entries: Vec::new(),
        };
        Self { size, alpha, state: Mutex::new(state) }
    }
}

impl Reservoir for ExponentialDecayReservoir {
    fn add(&self, value: f64) -> bool {
        let mut state = self.state.lock();
        state.maybe_rescale();

        let now = state.clock.now();
        let priority = state.weighted_priority(now);
        let existing = state.entries.iter().position(|(p, _)| (p - priority).abs() < EPSILON);

        let changed = if state.count < self.size {
            match existing {
                Some(idx) => state.entries[idx] = (priority, value),
                None => {
                    let pos = state.entries.partition_point(|(p, _)| *p < priority);
                    state.entries.insert(pos, (priority, value));
                }
            }
            true
        } else {
            let min_priority = state.entries.first().map(|(p, _)| *p).unwrap_or(f64::MIN);
            if priority > min_priority && existing.is_none() {
                state.entries.remove(0);
                let pos = state.entries.partition_point(|(p, _)| *p < priority);
                state.entries.insert(pos, (priority, value));
                true
            } else {
                false
            }
        };

        state.count += 1;
        changed
    }

    fn values(&self) -> Vec<f64> {
        self.state.lock().entries.iter().map(|(_, v)| *v).collect()
    }

    fn spec(&self) -> ReservoirSpec {
        ReservoirSpec::ExponentialDecay { size: self.size, alpha: self.alpha }
    }
}
