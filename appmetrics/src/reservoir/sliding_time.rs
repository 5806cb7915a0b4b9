//! Window over observations within the trailing `window` duration.

use std::time::Duration;

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use super::{Reservoir, ReservoirSpec};

struct Entry {
    at: Instant,
    value: f64,
}

struct State {
    clock: Clock,
    entries: Vec<Entry>,
}

impl State {
    /// Drops the prefix of entries older than `window`. Entries are kept
    /// sorted by timestamp ascending, so expiry is always a prefix drop.
    fn tick(&mut self, window: Duration) {
        let now = self.clock.now();
        let cutoff = now.checked_sub(window);
        let keep_from = match cutoff {
            Some(cutoff) => self.entries.partition_point(|e| e.at < cutoff),
            None => 0,
        };
        if keep_from > 0 {
            self.entries.drain(..keep_from);
        }
    }
}

/// Contents are `(timestamp, value)` pairs with `timestamp >= now - window`;
/// expired entries are purged on every `add` and on every read.
pub struct SlidingTimeReservoir {
    window: Duration,
    state: Mutex<State>,
}

impl SlidingTimeReservoir {
    /// Creates a reservoir retaining samples observed within the trailing
    /// `window`, using the system's monotonic clock.
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Clock::new())
    }

    /// Creates a reservoir driven by the given clock; used in tests to
    /// control the passage of time deterministically via `Clock::mock()`.
    pub fn with_clock(window: Duration, clock: Clock) -> Self {
        Self { window, state: Mutex::new(State { clock, entries: Vec::new() }) }
    }
}

impl Reservoir for SlidingTimeReservoir {
    fn add(&self, value: f64) -> bool {
        let mut state = self.state.lock();
        state.tick(self.window);
        let at = state.clock.now();
        state.entries.push(Entry { at, value });
        true
    }

    fn values(&self) -> Vec<f64> {
        let mut state = self.state.lock();
        state.tick(self.window);
        state.entries.iter().map(|e| e.value).collect()
    }

    fn spec(&self) -> ReservoirSpec {
        ReservoirSpec::SlidingTime { window: self.window }
    }
}
