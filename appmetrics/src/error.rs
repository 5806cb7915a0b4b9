//! Error kinds shared across the core instrument family.
//!
//! These map 1:1 onto the error *kinds* of the library: a registry name
//! collision or miss, a statistics reduction that cannot be computed over the
//! given data, and a value that cannot be coerced into the floating-point
//! domain observations live in.

use thiserror::Error;

/// A registry operation failed because a name was already bound, or bound to
/// something incompatible with the request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// `new_metric`/`get_or_create_histogram` was called for a name that
    /// already exists with a different kind or construction.
    #[error("metric '{name}' already exists ({reason})")]
    Duplicate {
        /// The colliding metric name.
        name: String,
        /// Why the existing registration is incompatible with this request.
        reason: String,
    },

    /// A lookup (`metric`, `snapshot`, `observe`, `tag`) referenced a name
    /// that isn't registered.
    #[error("metric '{name}' not found")]
    Invalid {
        /// The missing metric name.
        name: String,
    },

    /// The reservoir/metric type tag passed to a factory function isn't one
    /// of the known variants.
    #[error("unknown {what} kind: '{kind}'")]
    UnknownKind {
        /// Which factory this was ("reservoir" or "metric").
        what: &'static str,
        /// The unrecognized tag.
        kind: String,
    },
}

/// A statistics reduction could not be computed over the given data.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsError {
    /// The input sequence had no elements.
    #[error("no data points")]
    Empty,
    /// The input sequence had fewer data points than the reduction requires.
    #[error("too few data points")]
    TooFewDataPoints,
    /// `mode` was asked for a value from data with more than one equally
    /// frequent value.
    #[error("no unique mode")]
    NoUniqueMode,
    /// The requested percentile/index falls outside `[0, n]`.
    #[error("percentile out of range")]
    OutOfRange,
}

/// An observed value could not be coerced into the domain the receiving
/// instrument expects (floating-point for reservoirs, a finite number for
/// the HTTP surface's JSON body, etc).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("cannot coerce value: {reason}")]
pub struct TypeCoercionError {
    /// Human-readable explanation of why the coercion failed.
    pub reason: String,
}

impl TypeCoercionError {
    /// Builds a coercion error with the given explanation.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}
