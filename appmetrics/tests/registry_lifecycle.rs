//! End-to-end exercises of the registry across instrument kinds: the parts
//! of the contract that only show up once several operations compose.

use std::sync::Arc;
use std::thread;

use appmetrics::registry::{MetricKind, Registry};
use appmetrics::reservoir::ReservoirBuilder;
use appmetrics::Snapshot;

#[test]
fn histogram_snapshot_on_empty_data_is_all_zero() {
    let registry = Registry::new();
    registry
        .new_metric("latency", MetricKind::Histogram(ReservoirBuilder::default_uniform()))
        .unwrap();

    match registry.snapshot("latency").unwrap() {
        Snapshot::Histogram { min, max, n, histogram, percentile, .. } => {
            assert_eq!((min, max, n), (0.0, 0.0, 0));
            assert_eq!(histogram, vec![(0.0, 0)]);
            assert!(percentile.iter().all(|(_, v)| *v == 0.0));
        }
        _ => panic!("expected a histogram snapshot"),
    }
}

#[test]
fn meter_snapshot_immediately_after_creation_is_all_zero() {
    let registry = Registry::new();
    registry.new_metric("hits", MetricKind::Meter(std::time::Duration::from_secs(5))).unwrap();
    match registry.snapshot("hits").unwrap() {
        Snapshot::Meter { count, mean, one, five, fifteen, day } => {
            assert_eq!(count, 0.0);
            assert_eq!((mean, one, five, fifteen, day), (0.0, 0.0, 0.0, 0.0, 0.0));
        }
        _ => panic!("expected a meter snapshot"),
    }
}

#[test]
fn unknown_name_lookups_fail() {
    let registry = Registry::new();
    assert!(registry.metric("nope").is_err());
    assert!(registry.snapshot("nope").is_err());
    assert!(registry.observe("nope", 1.0).is_err());
}

#[test]
fn unknown_reservoir_or_metric_tag_fails() {
    assert!(ReservoirBuilder::from_tag("bogus", 10, std::time::Duration::from_secs(1), 0.015).is_err());
    assert!(
        MetricKind::from_tag("bogus", ReservoirBuilder::default_uniform(), std::time::Duration::from_secs(5))
            .is_err()
    );
}

#[test]
fn concurrent_observations_on_one_counter_are_all_accounted_for() {
    let registry = Arc::new(Registry::new());
    registry.new_metric("requests", MetricKind::Counter).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    registry.observe("requests", 1.0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    match registry.snapshot("requests").unwrap() {
        Snapshot::Counter { value } => assert_eq!(value, 8000),
        _ => panic!("expected a counter snapshot"),
    }
}

#[test]
fn reservoir_never_exceeds_capacity_under_concurrent_writers() {
    let registry = Arc::new(Registry::new());
    registry
        .new_metric("latency", MetricKind::Histogram(ReservoirBuilder::Uniform { size: 50 }))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            thread::spawn(move || {
                for j in 0..500 {
                    registry.observe("latency", (i * 1000 + j) as f64).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    match registry.snapshot("latency").unwrap() {
        Snapshot::Histogram { n, .. } => assert_eq!(n, 50),
        _ => panic!("expected a histogram snapshot"),
    }
}

#[test]
fn gauge_reads_last_observation_across_threads() {
    let registry = Arc::new(Registry::new());
    registry.new_metric("temperature", MetricKind::Gauge).unwrap();
    registry.observe("temperature", 21.0).unwrap();

    let writer_registry = registry.clone();
    let handle = thread::spawn(move || {
        writer_registry.observe("temperature", 22.5).unwrap();
    });
    handle.join().unwrap();

    match registry.snapshot("temperature").unwrap() {
        Snapshot::Gauge { value } => assert_eq!(value, Some(22.5)),
        _ => panic!("expected a gauge snapshot"),
    }
}
