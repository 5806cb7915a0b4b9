//! The canonical serializable form of an instrument's output. Stable and
//! consumed without further negotiation by the HTTP surface and the CSV
//! sink.

use serde::{Deserialize, Serialize};

/// The percentile levels a histogram snapshot always reports, in order.
pub const PERCENTILE_LEVELS: [f64; 6] = [50.0, 75.0, 90.0, 95.0, 99.0, 99.9];

/// A point-in-time, serializable value derived from an instrument's
/// internal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    /// A histogram instrument's derived statistical summary.
    Histogram {
        /// Smallest sample currently retained.
        min: f64,
        /// Largest sample currently retained.
        max: f64,
        /// Arithmetic mean.
        arithmetic_mean: f64,
        /// Geometric mean.
        geometric_mean: f64,
        /// Harmonic mean.
        harmonic_mean: f64,
        /// Median.
        median: f64,
        /// Sample variance.
        variance: f64,
        /// Sample standard deviation.
        standard_deviation: f64,
        /// Population skewness.
        skewness: f64,
        /// Excess population kurtosis.
        kurtosis: f64,
        /// `(level, value)` pairs for levels `[50, 75, 90, 95, 99, 99.9]`.
        percentile: Vec<(f64, f64)>,
        /// Auto-binned `(right_edge, count)` pairs.
        histogram: Vec<(f64, u64)>,
        /// Number of samples currently retained by the backing reservoir.
        n: usize,
    },
    /// A meter instrument's count and EWMA throughput rates.
    Meter {
        /// Sum of observed values recorded since creation (not the number of
        /// `observe` calls).
        count: f64,
        /// `count / (now - started_on)`.
        mean: f64,
        /// 1-minute EWMA rate.
        one: f64,
        /// 5-minute EWMA rate.
        five: f64,
        /// 15-minute EWMA rate.
        fifteen: f64,
        /// 1-day EWMA rate.
        day: f64,
    },
    /// A counter instrument's accumulated value.
    Counter {
        /// Current accumulated value.
        value: i64,
    },
    /// A gauge instrument's last-set value.
    Gauge {
        /// Current value, or `None` if never observed.
        value: Option<f64>,
    },
}

impl Snapshot {
    /// The `kind` discriminant string, as it appears in the JSON shape.
    pub fn kind(&self) -> &'static str {
        match self {
            Snapshot::Histogram { .. } => "histogram",
            Snapshot::Meter { .. } => "meter",
            Snapshot::Counter { .. } => "counter",
            Snapshot::Gauge { .. } => "gauge",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_json_shape_is_flat_with_kind_tag() {
        let snap = Snapshot::Histogram {
            min: 1.0,
            max: 2.0,
            arithmetic_mean: 1.5,
            geometric_mean: 1.4,
            harmonic_mean: 1.3,
            median: 1.5,
            variance: 0.25,
            standard_deviation: 0.5,
            skewness: 0.0,
            kurtosis: 0.0,
            percentile: vec![(50.0, 1.5)],
            histogram: vec![(2.0, 2)],
            n: 2,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["kind"], "histogram");
        assert_eq!(json["n"], 2);
        assert_eq!(json["percentile"][0][0], 50.0);
    }

    #[test]
    fn counter_and_gauge_kinds() {
        assert_eq!(Snapshot::Counter { value: 1 }.kind(), "counter");
        assert_eq!(Snapshot::Gauge { value: None }.kind(), "gauge");
    }
}
