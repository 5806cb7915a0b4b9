//! In-process application-metrics instrumentation.
//!
//! Records numeric observations into named, tagged instruments (histograms,
//! meters, counters, gauges), maintains statistical summaries over those
//! observations, and drives a scheduled reporter that periodically forwards
//! snapshots to a caller-supplied callback. Aimed at long-running server
//! processes that need low-overhead latency/throughput instrumentation
//! without an external agent.
//!
//! The [`Registry`] is the entry point: it owns every instrument by name,
//! supports tagging instruments into overlapping groups, and exposes a
//! scoped timer helper. A [`Reporter`] can be layered on top to push
//! snapshots of tagged instruments to a sink on a schedule.
//!
//! This crate deliberately carries no durable sample storage, no
//! cross-process aggregation, and no remote time-series export: snapshot
//! emission and the reporter's sink callback are the only outputs.

pub mod counter;
pub mod error;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod registry;
pub mod reporter;
pub mod reservoir;
pub mod snapshot;
pub mod statistics;

pub use counter::Counter;
pub use error::{RegistryError, StatisticsError, TypeCoercionError};
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use meter::Meter;
pub use registry::{Instrument, MetricKind, Registry};
pub use reporter::{CancelSignal, ExplicitSchedule, FixedInterval, Reporter, ReporterClock, Schedule};
pub use reservoir::{
    ExponentialDecayReservoir, Reservoir, ReservoirBuilder, ReservoirSpec, SlidingCountReservoir,
    SlidingTimeReservoir, UniformReservoir,
};
pub use snapshot::Snapshot;
