//! Failures writing a snapshot row to its CSV file.

use std::path::PathBuf;

use thiserror::Error;

/// A CSV row or header could not be written.
#[derive(Debug, Error)]
pub enum CsvSinkError {
    /// The per-metric file could not be opened for appending.
    #[error("failed to open {path:?}: {source}")]
    Open {
        /// The file that could not be opened.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The header or data row could not be written/flushed.
    #[error("failed to write to {path:?}: {source}")]
    Write {
        /// The file that failed to receive a write.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },
}
