//! A CSV sink consuming [`appmetrics::Snapshot`] values: one row per metric,
//! appended to `<directory>/<name>_<kind>.csv`. The header is written exactly
//! once, on file creation.
//!
//! Mirrors the original implementation's `CSVReporter`: only histogram and
//! meter snapshots have a tabular representation, so counter/gauge entries in
//! a snapshot map are silently skipped (logged at `debug`) rather than
//! erroring, matching the original's dynamic dispatch onto `dump_<kind>`
//! methods that simply don't exist for those two kinds.

mod error;

use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use appmetrics::snapshot::PERCENTILE_LEVELS;
use appmetrics::Snapshot;

pub use error::CsvSinkError;

const HISTOGRAM_HEADER: &[&str] = &[
    "time",
    "n",
    "min",
    "max",
    "arithmetic_mean",
    "median",
    "harmonic_mean",
    "geometric_mean",
    "standard_deviation",
    "variance",
    "percentile_50",
    "percentile_75",
    "percentile_90",
    "percentile_95",
    "percentile_99",
    "percentile_99.9",
    "kurtosis",
    "skewness",
];

const METER_HEADER: &[&str] = &["time", "count", "mean", "one", "five", "fifteen", "day"];

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Appends one CSV row per metric into a per-`<name>_<kind>` file under a
/// fixed directory. Safe to share across threads and across multiple
/// [`appmetrics::Reporter`] registrations.
pub struct CsvSink {
    directory: PathBuf,
    // Files we've already written a header into this process, so a sink
    // reused across many `record` calls doesn't re-stat every time.
    known_files: Mutex<HashSet<PathBuf>>,
}

impl CsvSink {
    /// Creates a sink writing into `directory`. The directory must already
    /// exist; this does not create it.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into(), known_files: Mutex::new(HashSet::new()) }
    }

    /// Writes one row per metric in `snapshots`. Failures are logged and
    /// skipped rather than propagated, so this can be used directly as a
    /// [`appmetrics::Reporter`] callback. Use [`CsvSink::try_record`] to
    /// observe failures instead.
    pub fn record(&self, snapshots: &BTreeMap<String, Snapshot>) {
        for (name, snapshot) in snapshots {
            if let Err(error) = self.dump_one(name, snapshot) {
                tracing::warn!(metric = %name, %error, "failed to write metric to csv");
            }
        }
    }

    /// Writes one row per metric in `snapshots`, stopping at the first
    /// failure.
    pub fn try_record(&self, snapshots: &BTreeMap<String, Snapshot>) -> Result<(), CsvSinkError> {
        for (name, snapshot) in snapshots {
            self.dump_one(name, snapshot)?;
        }
        Ok(())
    }

    fn dump_one(&self, name: &str, snapshot: &Snapshot) -> Result<(), CsvSinkError> {
        match snapshot {
            Snapshot::Histogram { .. } => self.dump_histogram(name, snapshot),
            Snapshot::Meter { .. } => self.dump_meter(name, snapshot),
            Snapshot::Counter { .. } | Snapshot::Gauge { .. } => {
                tracing::debug!(metric = %name, kind = snapshot.kind(), "no csv row shape for this kind");
                Ok(())
            }
        }
    }

    fn dump_histogram(&self, name: &str, snapshot: &Snapshot) -> Result<(), CsvSinkError> {
        let Snapshot::Histogram {
            min,
            max,
            arithmetic_mean,
            geometric_mean,
            harmonic_mean,
            median,
            variance,
            standard_deviation,
            skewness,
            kurtosis,
            percentile,
            n,
            ..
        } = snapshot
        else {
            unreachable!("dump_histogram only called for histogram snapshots");
        };

        let percentile_at = |level: f64| -> f64 {
            percentile
                .iter()
                .find(|(l, _)| (*l - level).abs() < 1e-9)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        };

        let row: Vec<String> = vec![
            now_secs().to_string(),
            n.to_string(),
            min.to_string(),
            max.to_string(),
            arithmetic_mean.to_string(),
            median.to_string(),
            harmonic_mean.to_string(),
            geometric_mean.to_string(),
            standard_deviation.to_string(),
            variance.to_string(),
            percentile_at(PERCENTILE_LEVELS[0]).to_string(),
            percentile_at(PERCENTILE_LEVELS[1]).to_string(),
            percentile_at(PERCENTILE_LEVELS[2]).to_string(),
            percentile_at(PERCENTILE_LEVELS[3]).to_string(),
            percentile_at(PERCENTILE_LEVELS[4]).to_string(),
            percentile_at(PERCENTILE_LEVELS[5]).to_string(),
            kurtosis.to_string(),
            skewness.to_string(),
        ];

        self.append_row(name, "histogram", HISTOGRAM_HEADER, &row)
    }

    fn dump_meter(&self, name: &str, snapshot: &Snapshot) -> Result<(), CsvSinkError> {
        let Snapshot::Meter { count, mean, one, five, fifteen, day } = snapshot else {
            unreachable!("dump_meter only called for meter snapshots");
        };

        let row: Vec<String> = vec![
            now_secs().to_string(),
            count.to_string(),
            mean.to_string(),
            one.to_string(),
            five.to_string(),
            fifteen.to_string(),
            day.to_string(),
        ];

        self.append_row(name, "meter", METER_HEADER, &row)
    }

    fn file_path(&self, name: &str, kind: &str) -> PathBuf {
        self.directory.join(format!("{name}_{kind}.csv"))
    }

    fn append_row(
        &self,
        name: &str,
        kind: &str,
        header: &[&str],
        row: &[String],
    ) -> Result<(), CsvSinkError> {
        let path = self.file_path(name, kind);
        let is_new = !self.is_known(&path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| CsvSinkError::Open { path: path.clone(), source })?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer
                .write_record(header)
                .map_err(|source| CsvSinkError::Write { path: path.clone(), source })?;
        }
        writer.write_record(row).map_err(|source| CsvSinkError::Write { path: path.clone(), source })?;
        writer.flush().map_err(|e| CsvSinkError::Write {
            path: path.clone(),
            source: csv::Error::from(e),
        })?;

        self.mark_known(path);
        Ok(())
    }

    fn is_known(&self, path: &Path) -> bool {
        self.known_files.lock().unwrap().contains(path) || path.exists()
    }

    fn mark_known(&self, path: PathBuf) {
        self.known_files.lock().unwrap().insert(path);
    }
}
