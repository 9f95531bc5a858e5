//! Error types for battery telemetry handling.

use thiserror::Error;

/// Errors that can occur when recording battery telemetry.
#[derive(Debug, Error)]
pub enum Error {
    /// A reading failed validation before reaching the store
    /// (non-finite percentage, percentage outside 0..=100, negative
    /// timestamp, or non-finite voltage).
    #[error("invalid battery reading: {reason}")]
    InvalidReading {
        /// What was wrong with the reading
        reason: String,
    },
}
