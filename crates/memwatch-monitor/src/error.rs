//! Error types for the memory monitor.
//!
//! Threshold violations are not errors: they come back as
//! [`Flow::Stop`](crate::Flow::Stop). Everything here means either the
//! configuration was rejected before the run, or the monitor itself broke.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Failures that terminate a monitored run.
///
/// Neither variant is retried. A stale or fabricated sample would let a
/// leak slip past the thresholds unnoticed.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Process memory metrics could not be read.
    #[error("memory sampling failed: {0}")]
    Sampling(String),

    /// The diagnostic sink rejected a trace line.
    #[error("trace output failed: {0}")]
    Trace(#[from] std::io::Error),
}

/// A human-readable size string could not be converted to bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    /// Empty input.
    #[error("empty size string")]
    Empty,

    /// Unknown unit suffix.
    #[error("unknown size unit '{unit}' in '{input}' (expected one of B, K, M, G, T, P, E, Z, Y)")]
    UnknownUnit {
        /// Full input string.
        input: String,
        /// Offending suffix.
        unit: String,
    },

    /// The numeric part is not a non-negative number.
    #[error("invalid size number in '{0}'")]
    InvalidNumber(String),

    /// The size does not fit in 64 bits.
    #[error("size '{0}' is out of range")]
    OutOfRange(String),
}

/// Rejected monitor configuration.
///
/// Raised at startup, before any event is delivered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A size option failed to parse.
    #[error("invalid value for {option}: {source}")]
    Size {
        /// Option name as it appears in the configuration surface.
        option: &'static str,
        /// Underlying parse failure.
        #[source]
        source: SizeError,
    },

    /// Percent threshold outside `0..=100` or not a number.
    #[error("maxPercent must be between 0 and 100, got {0}")]
    Percent(f64),

    /// `activateFrom` is not of the form `module[:line]`.
    #[error("invalid activation marker '{0}' (expected module[:line])")]
    Marker(String),
}
