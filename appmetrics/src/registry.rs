//! Process-wide mapping of `{name -> instrument}` plus `{tag -> set-of-names}`,
//! under a single mutex covering both structural maps. Instrument-local
//! mutation is protected by the instrument's own lock, so the registry mutex
//! is only ever held for map bookkeeping, never while an instrument runs its
//! own `observe`/`snapshot` logic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use crate::counter::Counter;
use crate::error::RegistryError;
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::reservoir::ReservoirBuilder;
use crate::snapshot::Snapshot;

/// A named, typed object the registry can hold.
pub enum Instrument {
    /// A histogram instrument.
    Histogram(Histogram),
    /// A meter instrument.
    Meter(Meter),
    /// A counter instrument.
    Counter(Counter),
    /// A gauge instrument.
    Gauge(Gauge),
}

impl Instrument {
    /// The `kind` tag identifying this instrument's variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Instrument::Histogram(_) => "histogram",
            Instrument::Meter(_) => "meter",
            Instrument::Counter(_) => "counter",
            Instrument::Gauge(_) => "gauge",
        }
    }

    /// Records an observation, coerced to the receiving instrument's
    /// expectations. Returns whether the instrument's state changed (always
    /// `true` for meter/counter/gauge; reservoir admission result for
    /// histograms).
    pub fn observe(&self, value: f64) -> bool {
        match self {
            Instrument::Histogram(h) => h.observe(value),
            Instrument::Meter(m) => {
                m.observe(value);
                true
            }
            Instrument::Counter(c) => {
                c.observe(value);
                true
            }
            Instrument::Gauge(g) => {
                g.observe(value);
                true
            }
        }
    }

    /// Takes a point-in-time snapshot of this instrument.
    pub fn snapshot(&self) -> Snapshot {
        match self {
            Instrument::Histogram(h) => h.snapshot(),
            Instrument::Meter(m) => m.snapshot(),
            Instrument::Counter(c) => c.snapshot(),
            Instrument::Gauge(g) => g.snapshot(),
        }
    }

    fn describe_construction(&self) -> String {
        match self {
            Instrument::Histogram(h) => format!("histogram({:?})", h.reservoir_spec()),
            Instrument::Meter(m) => format!("meter(tick_interval={:?})", m.tick_interval()),
            Instrument::Counter(_) => "counter".to_string(),
            Instrument::Gauge(_) => "gauge".to_string(),
        }
    }
}

/// The kind and construction parameters to hand `new_metric`.
pub enum MetricKind {
    /// A histogram over the given reservoir.
    Histogram(ReservoirBuilder),
    /// A meter with the given EWMA tick interval.
    Meter(Duration),
    /// A counter.
    Counter,
    /// A gauge.
    Gauge,
}

impl MetricKind {
    /// Parses a metric kind tag (`{"histogram", "gauge", "counter", "meter"}`).
    pub fn from_tag(
        tag: &str,
        reservoir: ReservoirBuilder,
        tick_interval: Duration,
    ) -> Result<Self, RegistryError> {
        match tag {
            "histogram" => Ok(MetricKind::Histogram(reservoir)),
            "meter" => Ok(MetricKind::Meter(tick_interval)),
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(RegistryError::UnknownKind { what: "metric", kind: other.to_string() }),
        }
    }

    fn build(self, clock: &Clock) -> Instrument {
        match self {
            MetricKind::Histogram(builder) => Instrument::Histogram(Histogram::new(builder.build())),
            MetricKind::Meter(tick_interval) => {
                Instrument::Meter(Meter::with_clock(tick_interval, clock.clone()))
            }
            MetricKind::Counter => Instrument::Counter(Counter::new()),
            MetricKind::Gauge => Instrument::Gauge(Gauge::new()),
        }
    }
}

struct Inner {
    instruments: HashMap<String, Arc<Instrument>>,
    tags: HashMap<String, BTreeSet<String>>,
}

/// Process-wide registry of named, tagged instruments.
pub struct Registry {
    clock: Clock,
    inner: Mutex<Inner>,
}

impl Registry {
    /// Creates an empty registry using the system's monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    /// Creates an empty registry driven by the given clock; used in tests to
    /// control the passage of time deterministically.
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock, inner: Mutex::new(Inner { instruments: HashMap::new(), tags: HashMap::new() }) }
    }

    /// Registers a new instrument under `name`. Fails with
    /// [`RegistryError::Duplicate`] if `name` is already bound.
    pub fn new_metric(&self, name: &str, kind: MetricKind) -> Result<Arc<Instrument>, RegistryError> {
        let mut inner = self.inner.lock();
        if inner.instruments.contains_key(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
                reason: "a metric with this name already exists".to_string(),
            });
        }
        let instrument = Arc::new(kind.build(&self.clock));
        inner.instruments.insert(name.to_string(), instrument.clone());
        Ok(instrument)
    }

    /// Looks up an instrument by name.
    pub fn metric(&self, name: &str) -> Result<Arc<Instrument>, RegistryError> {
        self.inner
            .lock()
            .instruments
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Invalid { name: name.to_string() })
    }

    /// Removes an instrument and purges its name from every tag set; tags
    /// that become empty are dropped. Returns whether anything was removed.
    pub fn delete_metric(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.instruments.remove(name).is_some();
        if removed {
            inner.tags.retain(|_, names| {
                names.remove(name);
                !names.is_empty()
            });
        }
        removed
    }

    /// Ascending-sorted list of registered instrument names.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut names: Vec<String> = inner.instruments.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of currently registered instruments.
    pub fn metrics_count(&self) -> usize {
        self.inner.lock().instruments.len()
    }

    /// Alias for [`Registry::metrics_count`], matching the name the original
    /// implementation exposed alongside `metrics()`.
    pub fn len(&self) -> usize {
        self.metrics_count()
    }

    /// Whether the registry currently holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.metrics_count() == 0
    }

    /// Ascending-sorted list of tag names currently in use.
    pub fn tags(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut tags: Vec<String> = inner.tags.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Ascending-sorted names tagged with `tag_name`, or `None` if the tag
    /// is unknown.
    pub fn names_for_tag(&self, tag_name: &str) -> Option<Vec<String>> {
        let inner = self.inner.lock();
        let names = inner.tags.get(tag_name)?;
        Some(names.iter().cloned().collect())
    }

    /// Takes a snapshot of the named instrument.
    pub fn snapshot(&self, name: &str) -> Result<Snapshot, RegistryError> {
        Ok(self.metric(name)?.snapshot())
    }

    /// Records an observation on the named instrument.
    pub fn observe(&self, name: &str, value: f64) -> Result<bool, RegistryError> {
        Ok(self.metric(name)?.observe(value))
    }

    /// Associates `name` with `tag_name`. Fails if `name` is unknown.
    pub fn tag(&self, name: &str, tag_name: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if !inner.instruments.contains_key(name) {
            return Err(RegistryError::Invalid { name: name.to_string() });
        }
        inner.tags.entry(tag_name.to_string()).or_default().insert(name.to_string());
        Ok(())
    }

    /// Removes the association between `name` and `tag_name`. Returns
    /// whether a removal happened; drops the tag set if it becomes empty.
    pub fn untag(&self, name: &str, tag_name: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(names) = inner.tags.get_mut(tag_name) else {
            return false;
        };
        let removed = names.remove(name);
        if names.is_empty() {
            inner.tags.remove(tag_name);
        }
        removed
    }

    /// Takes a snapshot of every instrument tagged with `tag_name`. Names
    /// that raced with a concurrent deletion are silently skipped.
    pub fn snapshot_by_tag(&self, tag_name: &str) -> BTreeMap<String, Snapshot> {
        let names: Vec<String> = {
            let inner = self.inner.lock();
            match inner.tags.get(tag_name) {
                Some(names) => names.iter().cloned().collect(),
                None => return BTreeMap::new(),
            }
        };
        names
            .into_iter()
            .filter_map(|name| {
                let snap = self.snapshot(&name).ok()?;
                Some((name, snap))
            })
            .collect()
    }

    /// Idempotent construction: reuses an existing histogram whose reservoir
    /// spec matches `builder`; fails with [`RegistryError::Duplicate`] if a
    /// metric with this name exists but is not a histogram, or is a
    /// histogram over a different reservoir.
    pub fn get_or_create_histogram(
        &self,
        name: &str,
        builder: ReservoirBuilder,
    ) -> Result<Arc<Instrument>, RegistryError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.instruments.get(name) {
            return match existing.as_ref() {
                Instrument::Histogram(h) if h.reservoir_spec() == builder.spec() => {
                    Ok(existing.clone())
                }
                other => Err(RegistryError::Duplicate {
                    name: name.to_string(),
                    reason: format!("existing metric is {}", other.describe_construction()),
                }),
            };
        }
        let instrument = Arc::new(Instrument::Histogram(Histogram::new(builder.build())));
        inner.instruments.insert(name.to_string(), instrument.clone());
        Ok(instrument)
    }

    /// Records elapsed wall time between `start` and now into the named
    /// histogram (created lazily via [`Registry::get_or_create_histogram`]).
    /// Intended to be called on scope exit.
    pub fn record_elapsed(
        &self,
        name: &str,
        builder: ReservoirBuilder,
        start: Instant,
    ) -> Result<(), RegistryError> {
        let instrument = self.get_or_create_histogram(name, builder)?;
        let elapsed = self.clock.now().saturating_duration_since(start).as_secs_f64();
        instrument.observe(elapsed);
        Ok(())
    }

    /// Starts a scoped timer: on drop, records elapsed wall time into the
    /// named histogram.
    pub fn scoped_timer<'a>(&'a self, name: &'a str, builder: ReservoirBuilder) -> ScopedTimer<'a> {
        ScopedTimer { registry: self, name, builder: Some(builder), start: self.clock.now() }
    }

    /// Wraps `f`, recording its execution time into the named histogram on
    /// every call.
    pub fn measured<F, R>(&self, name: &str, builder: ReservoirBuilder, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _timer = self.scoped_timer(name, builder);
        f()
    }

    /// Idempotent construction: reuses an existing meter whose tick interval
    /// matches `tick_interval`; fails with [`RegistryError::Duplicate`] if a
    /// metric with this name exists but is not a meter, or is a meter ticking
    /// at a different interval.
    pub fn get_or_create_meter(
        &self,
        name: &str,
        tick_interval: Duration,
    ) -> Result<Arc<Instrument>, RegistryError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.instruments.get(name) {
            return match existing.as_ref() {
                Instrument::Meter(m) if m.tick_interval() == tick_interval => Ok(existing.clone()),
                other => Err(RegistryError::Duplicate {
                    name: name.to_string(),
                    reason: format!("existing metric is {}", other.describe_construction()),
                }),
            };
        }
        let instrument = Arc::new(Instrument::Meter(Meter::with_clock(tick_interval, self.clock.clone())));
        inner.instruments.insert(name.to_string(), instrument.clone());
        Ok(instrument)
    }

    /// Wraps `f`, incrementing the named meter (created lazily via
    /// [`Registry::get_or_create_meter`]) by one on every call. Fails with
    /// [`RegistryError::Duplicate`] without calling `f` if a metric with this
    /// name already exists but isn't a meter with this tick interval.
    pub fn counted<F, R>(&self, name: &str, tick_interval: Duration, f: F) -> Result<R, RegistryError>
    where
        F: FnOnce() -> R,
    {
        let instrument = self.get_or_create_meter(name, tick_interval)?;
        instrument.observe(1.0);
        Ok(f())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Records elapsed wall time into its histogram when dropped, per
/// [`Registry::scoped_timer`].
pub struct ScopedTimer<'a> {
    registry: &'a Registry,
    name: &'a str,
    builder: Option<ReservoirBuilder>,
    start: Instant,
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        if let Some(builder) = self.builder.take() {
            let _ = self.registry.record_elapsed(self.name, builder, self.start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn builder() -> ReservoirBuilder {
        ReservoirBuilder::default_uniform()
    }

    #[test]
    fn delete_then_recreate_succeeds_with_fresh_state() {
        let registry = Registry::new();
        registry.new_metric("requests", MetricKind::Counter).unwrap();
        registry.observe("requests", 5.0).unwrap();
        assert!(registry.delete_metric("requests"));
        registry.new_metric("requests", MetricKind::Counter).unwrap();
        match registry.snapshot("requests").unwrap() {
            Snapshot::Counter { value } => assert_eq!(value, 0),
            _ => panic!("expected counter"),
        }
    }

    #[test]
    fn delete_then_tag_fails() {
        let registry = Registry::new();
        registry.new_metric("requests", MetricKind::Counter).unwrap();
        registry.delete_metric("requests");
        assert!(registry.tag("requests", "web").is_err());
    }

    #[test]
    fn tag_untag_tag_round_trips() {
        let registry = Registry::new();
        registry.new_metric("latency", MetricKind::Histogram(builder())).unwrap();
        registry.tag("latency", "web").unwrap();
        registry.untag("latency", "web");
        registry.tag("latency", "web").unwrap();
        assert_eq!(registry.tags(), vec!["web".to_string()]);
        let snap = registry.snapshot_by_tag("web");
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key("latency"));
    }

    #[test]
    fn names_for_tag_is_none_for_unknown_tags_and_sorted_for_known_ones() {
        let registry = Registry::new();
        registry.new_metric("b", MetricKind::Counter).unwrap();
        registry.new_metric("a", MetricKind::Counter).unwrap();
        registry.tag("b", "web").unwrap();
        registry.tag("a", "web").unwrap();
        assert_eq!(registry.names_for_tag("web"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(registry.names_for_tag("nope"), None);
    }

    #[test]
    fn untagging_last_member_drops_the_tag() {
        let registry = Registry::new();
        registry.new_metric("latency", MetricKind::Histogram(builder())).unwrap();
        registry.tag("latency", "web").unwrap();
        assert!(registry.untag("latency", "web"));
        assert!(registry.tags().is_empty());
    }

    #[test]
    fn deleting_an_instrument_purges_its_tags() {
        let registry = Registry::new();
        registry.new_metric("latency", MetricKind::Histogram(builder())).unwrap();
        registry.tag("latency", "web").unwrap();
        registry.delete_metric("latency");
        assert!(registry.tags().is_empty());
    }

    #[test]
    fn get_or_create_histogram_is_idempotent_for_same_spec() {
        let registry = Registry::new();
        let first = registry.get_or_create_histogram("latency", builder()).unwrap();
        first.observe(1.0);
        let second = registry.get_or_create_histogram("latency", builder()).unwrap();
        match second.snapshot() {
            Snapshot::Histogram { n, .. } => assert_eq!(n, 1),
            _ => panic!("expected histogram"),
        }
    }

    #[test]
    fn get_or_create_histogram_fails_on_mismatched_spec() {
        let registry = Registry::new();
        registry.get_or_create_histogram("latency", ReservoirBuilder::Uniform { size: 10 }).unwrap();
        let result = registry.get_or_create_histogram("latency", ReservoirBuilder::Uniform { size: 20 });
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_metric_name_fails() {
        let registry = Registry::new();
        registry.new_metric("requests", MetricKind::Counter).unwrap();
        assert!(registry.new_metric("requests", MetricKind::Counter).is_err());
    }

    #[test]
    fn names_are_sorted_ascending() {
        let registry = Registry::new();
        registry.new_metric("zeta", MetricKind::Counter).unwrap();
        registry.new_metric("alpha", MetricKind::Counter).unwrap();
        assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
        assert_eq!(registry.metrics_count(), 2);
    }

    #[test]
    fn scoped_timer_records_elapsed_time_on_drop() {
        let (clock, ctl) = Clock::mock();
        let registry = Registry::with_clock(clock);
        {
            let _timer = registry.scoped_timer("work", builder());
            ctl.increment(StdDuration::from_millis(250));
        }
        match registry.snapshot("work").unwrap() {
            Snapshot::Histogram { n, min, .. } => {
                assert_eq!(n, 1);
                assert!((min - 0.25).abs() < 1e-9);
            }
            _ => panic!("expected histogram"),
        }
    }

    #[test]
    fn counted_increments_a_lazily_created_meter() {
        let registry = Registry::new();
        let result = registry.counted("calls", Duration::from_secs(5), || 42).unwrap();
        assert_eq!(result, 42);
        match registry.snapshot("calls").unwrap() {
            Snapshot::Meter { count, .. } => assert_eq!(count, 1.0),
            _ => panic!("expected meter"),
        }
    }

    #[test]
    fn counted_reuses_an_existing_meter_with_the_same_tick_interval() {
        let registry = Registry::new();
        registry.counted("calls", Duration::from_secs(5), || ()).unwrap();
        registry.counted("calls", Duration::from_secs(5), || ()).unwrap();
        match registry.snapshot("calls").unwrap() {
            Snapshot::Meter { count, .. } => assert_eq!(count, 2.0),
            _ => panic!("expected meter"),
        }
    }

    #[test]
    fn counted_rejects_a_tick_interval_mismatch_without_calling_f() {
        let registry = Registry::new();
        registry.counted("calls", Duration::from_secs(5), || ()).unwrap();

        let mut called = false;
        let err = registry.counted("calls", Duration::from_secs(1), || called = true).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        assert!(!called);
    }

    #[test]
    fn counted_rejects_reusing_a_non_meter_name() {
        let registry = Registry::new();
        registry.new_metric("calls", MetricKind::Counter).unwrap();

        let err = registry.counted("calls", Duration::from_secs(5), || ()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }

    #[test]
    fn snapshot_by_tag_silently_skips_racy_deletions() {
        let registry = Registry::new();
        registry.new_metric("a", MetricKind::Counter).unwrap();
        registry.new_metric("b", MetricKind::Counter).unwrap();
        registry.tag("a", "both").unwrap();
        registry.tag("b", "both").unwrap();
        registry.delete_metric("a");
        let snap = registry.snapshot_by_tag("both");
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key("b"));
    }
}
