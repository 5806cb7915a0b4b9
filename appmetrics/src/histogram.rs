//! A metric that derives a rich statistical summary from a reservoir.

use crate::reservoir::{Reservoir, ReservoirSpec};
use crate::snapshot::{Snapshot, PERCENTILE_LEVELS};
use crate::statistics;

/// Couples a reservoir to the statistics kernel to produce a summary
/// snapshot. Individual statistic failures (e.g. variance on a single
/// sample) are swallowed and replaced by `0.0`; the auto-binned histogram
/// defaults to `[(0.0, 0)]` when there are too few points.
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
}

impl Histogram {
    /// Wraps the given reservoir as a histogram instrument.
    pub fn new(reservoir: Box<dyn Reservoir>) -> Self {
        Self { reservoir }
    }

    /// This histogram's backing reservoir's variant and parameters.
    pub fn reservoir_spec(&self) -> ReservoirSpec {
        self.reservoir.spec()
    }

    /// Whether `other`'s backing reservoir is the same kind as this one's.
    pub fn reservoir_same_kind(&self, other: &dyn Reservoir) -> bool {
        self.reservoir.same_kind(other)
    }

    /// Records an observation, delegating to the reservoir's admission
    /// rule. Returns whether the reservoir's state changed.
    pub fn observe(&self, value: f64) -> bool {
        self.reservoir.add(value)
    }

    /// Returns the raw, unsorted sample values currently retained.
    pub fn raw_data(&self) -> Vec<f64> {
        self.reservoir.values()
    }

    /// Computes the statistical summary over the currently retained
    /// samples.
    pub fn snapshot(&self) -> Snapshot {
        let values = self.reservoir.sorted_values();
        let n = values.len();

        let min = values.first().copied().unwrap_or(0.0);
        let max = values.last().copied().unwrap_or(0.0);

        let percentile = PERCENTILE_LEVELS
            .iter()
            .map(|&p| (p, statistics::percentile(&values, p).unwrap_or(0.0)))
            .collect();

        let histogram = statistics::auto_histogram(&values).unwrap_or_else(|_| vec![(0.0, 0)]);

        Snapshot::Histogram {
            min,
            max,
            arithmetic_mean: statistics::mean(&values).unwrap_or(0.0),
            geometric_mean: statistics::geometric_mean(&values).unwrap_or(0.0),
            harmonic_mean: statistics::harmonic_mean(&values).unwrap_or(0.0),
            median: statistics::median(&values).unwrap_or(0.0),
            variance: statistics::variance(&values, 1).unwrap_or(0.0),
            standard_deviation: statistics::stdev(&values).unwrap_or(0.0),
            skewness: statistics::skewness(&values).unwrap_or(0.0),
            kurtosis: statistics::kurtosis(&values).unwrap_or(0.0),
            percentile,
            histogram,
            n,
        }
    }
}
