//! Construction-time errors for the HTTP exporter.

use thiserror::Error;

/// Failure building or starting an [`crate::HttpExporter`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configured bind address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that failed to bind.
        addr: std::net::SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
