//! Bounded-memory sampling reservoirs.
//!
//! Four sampling disciplines share one trait: a uniform random sample
//! (Vitter's Algorithm R), a fixed-size sliding window over arrival order, a
//! sliding window over wall-clock time, and a forward-decaying weighted
//! sample. Each is internally synchronized with its own lock, so a
//! `Box<dyn Reservoir>` can be shared across threads behind an `Arc` without
//! any further wrapping.

mod exp_decay;
mod sliding_count;
mod sliding_time;
mod uniform;

use std::cell::UnsafeCell;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

pub use exp_decay::ExponentialDecayReservoir;
pub use sliding_count::SlidingCountReservoir;
pub use sliding_time::SlidingTimeReservoir;
pub use uniform::UniformReservoir;

use crate::error::RegistryError;

thread_local! {
    static FAST_RNG: UnsafeCell<Xoshiro256StarStar> =
        UnsafeCell::new(Xoshiro256StarStar::try_from_rng(&mut OsRng).unwrap());
}

/// Draws a uniformly-distributed index in `[0, upper)` from a fast,
/// per-thread RNG, used by Algorithm R's slot selection.
pub(crate) fn fast_index(upper: usize) -> usize {
    FAST_RNG.with(|rng| {
        // SAFETY: the pointer never outlives this closure, and the
        // thread-local guarantees no other thread observes it.
        let rng = unsafe { &mut *rng.get() };
        rng.random_range(0..upper)
    })
}

/// Draws a uniformly-distributed `f64` in `[0, 1)` from the same per-thread
/// RNG, used by the exponential-decay reservoir's `U ~ Uniform(0, 1]` draw.
pub(crate) fn fast_unit_f64() -> f64 {
    FAST_RNG.with(|rng| {
        let rng = unsafe { &mut *rng.get() };
        rng.random::<f64>()
    })
}

/// Default capacity of a [`UniformReservoir`] when none is specified.
pub const DEFAULT_UNIFORM_RESERVOIR_SIZE: usize = 1028;

/// Default decay rate `alpha` for [`ExponentialDecayReservoir`].
pub const DEFAULT_EXPONENTIAL_DECAY_ALPHA: f64 = 0.015;

/// Identifies a reservoir's concrete variant and its construction
/// parameters. Two reservoirs are [`Reservoir::same_kind`] iff their specs
/// are equal.
#[derive(Clone, Debug, PartialEq)]
pub enum ReservoirSpec {
    /// Vitter's Algorithm R over a fixed-size array.
    Uniform {
        /// Maximum number of retained samples.
        size: usize,
    },
    /// FIFO window over the last `window_size` observations.
    SlidingCount {
        /// Maximum number of retained samples.
        window_size: usize,
    },
    /// Window over observations within the trailing `window` duration.
    SlidingTime {
        /// Width of the retained time window.
        window: Duration,
    },
    /// Forward-decaying weighted sample.
    ExponentialDecay {
        /// Maximum number of retained samples.
        size: usize,
        /// Decay rate.
        alpha: f64,
    },
}

/// A bounded container of floating-point samples with a defined sampling
/// discipline.
pub trait Reservoir: Send + Sync {
    /// Adds a sample, returning whether reservoir state changed (i.e. the
    /// sample was admitted rather than discarded by the sampling
    /// discipline).
    fn add(&self, value: f64) -> bool;

    /// Current contents, in unspecified order.
    fn values(&self) -> Vec<f64>;

    /// Current contents, sorted ascending.
    fn sorted_values(&self) -> Vec<f64> {
        let mut v = self.values();
        v.sort_by(|a, b| a.partial_cmp(b).expect("reservoir samples are finite"));
        v
    }

    /// This reservoir's variant and construction parameters.
    fn spec(&self) -> ReservoirSpec;

    /// Whether `other` is the same concrete variant with the same
    /// construction parameters as `self`.
    fn same_kind(&self, other: &dyn Reservoir) -> bool {
        self.spec() == other.spec()
    }
}

/// Builds a boxed reservoir from a string tag and its parameters, per the
/// registry's reservoir factory (spec: `{"uniform", "sliding_window",
/// "sliding_time_window", "exp_decaying"}`).
#[derive(Clone, Debug, PartialEq)]
pub enum ReservoirBuilder {
    /// `"uniform"`
    Uniform {
        /// Capacity; defaults to [`DEFAULT_UNIFORM_RESERVOIR_SIZE`].
        size: usize,
    },
    /// `"sliding_window"`
    SlidingWindow {
        /// Capacity.
        window_size: usize,
    },
    /// `"sliding_time_window"`
    SlidingTimeWindow {
        /// Width of the retained time window.
        window: Duration,
    },
    /// `"exp_decaying"`
    ExponentialDecaying {
        /// Capacity; defaults to [`DEFAULT_UNIFORM_RESERVOIR_SIZE`].
        size: usize,
        /// Decay rate; defaults to [`DEFAULT_EXPONENTIAL_DECAY_ALPHA`].
        alpha: f64,
    },
}

impl ReservoirBuilder {
    /// The default uniform reservoir, matching the original implementation's
    /// default histogram construction.
    pub fn default_uniform() -> Self {
        ReservoirBuilder::Uniform { size: DEFAULT_UNIFORM_RESERVOIR_SIZE }
    }

    /// Parses a reservoir kind tag, pairing it with the given size/window
    /// parameter; `alpha` is only consulted for `exp_decaying`.
    pub fn from_tag(tag: &str, size: usize, window: Duration, alpha: f64) -> Result<Self, RegistryError> {
        match tag {
            "uniform" => Ok(ReservoirBuilder::Uniform { size }),
            "sliding_window" => Ok(ReservoirBuilder::SlidingWindow { window_size: size }),
            "sliding_time_window" => Ok(ReservoirBuilder::SlidingTimeWindow { window }),
            "exp_decaying" => Ok(ReservoirBuilder::ExponentialDecaying { size, alpha }),
            other => Err(RegistryError::UnknownKind { what: "reservoir", kind: other.to_string() }),
        }
    }

    /// The [`ReservoirSpec`] this builder describes, without instantiating a
    /// reservoir.
    pub fn spec(&self) -> ReservoirSpec {
        match *self {
            ReservoirBuilder::Uniform { size } => ReservoirSpec::Uniform { size },
            ReservoirBuilder::SlidingWindow { window_size } => ReservoirSpec::SlidingCount { window_size },
            ReservoirBuilder::SlidingTimeWindow { window } => ReservoirSpec::SlidingTime { window },
            ReservoirBuilder::ExponentialDecaying { size, alpha } => {
                ReservoirSpec::ExponentialDecay { size, alpha }
            }
        }
    }

    /// Instantiates the boxed reservoir this builder describes.
    pub fn build(&self) -> Box<dyn Reservoir> {
        match *self {
            ReservoirBuilder::Uniform { size } => Box::new(UniformReservoir::new(size)),
            ReservoirBuilder::SlidingWindow { window_size } => {
                Box::new(SlidingCountReservoir::new(window_size))
            }
            ReservoirBuilder::SlidingTimeWindow { window } => {
                Box::new(SlidingTimeReservoir::new(window))
            }
            ReservoirBuilder::ExponentialDecaying { size, alpha } => {
                Box::new(ExponentialDecayReservoir::new(size, alpha))
            }
        }
    }
}
