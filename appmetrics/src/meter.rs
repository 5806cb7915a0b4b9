//! Event-rate meter: an observation count plus four EWMA throughput
//! estimates (1-minute, 5-minute, 15-minute, 1-day windows), ticked lazily
//! on read or write rather than by a background timer.

use std::time::Duration;

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use crate::snapshot::Snapshot;

/// Default interval between EWMA ticks, matching the reference
/// implementation's default meter construction.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

const ONE_MINUTE: f64 = 1.0;
const FIVE_MINUTES: f64 = 5.0;
const FIFTEEN_MINUTES: f64 = 15.0;
const ONE_DAY_MINUTES: f64 = 24.0 * 60.0;

struct Ewma {
    alpha: f64,
    interval_secs: f64,
    accumulator: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn new(period_minutes: f64, tick_interval: Duration) -> Self {
        let interval_secs = tick_interval.as_secs_f64();
        let alpha = 1.0 - (-interval_secs / (60.0 * period_minutes)).exp();
        Self { alpha, interval_secs, accumulator: 0.0, rate: 0.0, initialized: false }
    }

    fn update(&mut self, value: f64) {
        self.accumulator += value;
    }

    fn tick(&mut self) {
        let instant_rate = self.accumulator / self.interval_secs;
        self.accumulator = 0.0;
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}

struct State {
    count: f64,
    started_on: Instant,
    latest_tick: Instant,
    one: Ewma,
    five: Ewma,
    fifteen: Ewma,
    day: Ewma,
}

impl State {
    fn tick(&mut self, now: Instant, tick_interval: Duration) {
        let elapsed = now.saturating_duration_since(self.latest_tick);
        if elapsed <= tick_interval {
            return;
        }
        let ticks = (elapsed.as_secs_f64() / tick_interval.as_secs_f64()).floor() as u64;
        for _ in 0..ticks {
            self.one.tick();
            self.five.tick();
            self.fifteen.tick();
            self.day.tick();
        }
        self.latest_tick = now;
    }
}

/// Counts events and maintains 1-minute/5-minute/15-minute/1-day EWMAs.
pub struct Meter {
    tick_interval: Duration,
    clock: Clock,
    state: Mutex<State>,
}

impl Meter {
    /// Creates a meter ticking its EWMAs every `tick_interval`, using the
    /// system's monotonic clock.
    pub fn new(tick_interval: Duration) -> Self {
        Self::with_clock(tick_interval, Clock::new())
    }

    /// Creates a meter driven by the given clock; used in tests to control
    /// the passage of time deterministically via `Clock::mock()`.
    pub fn with_clock(tick_interval: Duration, clock: Clock) -> Self {
        let now = clock.now();
        let state = State {
            count: 0.0,
            started_on: now,
            latest_tick: now,
            one: Ewma::new(ONE_MINUTE, tick_interval),
            five: Ewma::new(FIVE_MINUTES, tick_interval),
            fifteen: Ewma::new(FIFTEEN_MINUTES, tick_interval),
            day: Ewma::new(ONE_DAY_MINUTES, tick_interval),
        };
        Self { tick_interval, clock, state: Mutex::new(state) }
    }

    /// The configured tick interval.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Records one observation of size `value` (usually `1.0` per event).
    /// `value` is added both to the EWMA accumulators and to the running
    /// count, so `count` is the sum of observed values, not the number of
    /// `observe` calls.
    pub fn observe(&self, value: f64) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.tick(now, self.tick_interval);
        state.count += value;
        state.one.update(value);
        state.five.update(value);
        state.fifteen.update(value);
        state.day.update(value);
    }

    /// Takes a point-in-time snapshot of the meter's count and rates.
    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.tick(now, self.tick_interval);

        let elapsed = now.saturating_duration_since(state.started_on).as_secs_f64();
        let mean = if elapsed == 0.0 { 0.0 } else { state.count / elapsed };

        Snapshot::Meter {
            count: state.count,
            mean,
            one: state.one.rate,
            five: state.five.rate,
            fifteen: state.fifteen.rate,
            day: state.day.rate,
        }
    }
}
