//! Error types for the calibration pipeline.
//!
//! Everything that can fail funnels into [`CalError`]:
//!
//! - Transport faults: port errors, I/O failures, read timeouts, EOF.
//! - Protocol faults: printer responses whose fields do not parse
//!   (measurement lines, settings-dump lines), and probe grids with the
//!   wrong shape.
//! - Settings file read/write failures.
//!
//! Convergence failure and the error-limit abort are session outcomes, not
//! faults, and are reported through `session::Outcome` instead.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type CalResult<T> = std::result::Result<T, CalError>;

/// All error conditions the calibration pipeline can raise.
#[derive(Error, Debug)]
pub enum CalError {
    /// Serial port could not be opened or configured.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Read or write on an open channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete response line arrived within the deadline.
    #[error("Printer did not respond within {0:?}")]
    Timeout(Duration),

    /// The channel closed mid-session.
    #[error("Unexpected end of stream from printer")]
    UnexpectedEof,

    /// A printer response whose fields did not parse: a marked
    /// measurement line, or an `M666`/`M665` settings-dump line.
    #[error("Unparseable printer response: {0:?}")]
    MalformedResponse(String),

    /// A probe grid arrived with the wrong number of samples.
    #[error("Probe grid has {got} samples, expected {expected}")]
    MalformedGrid {
        /// Sample count the active layout defines.
        expected: usize,
        /// Sample count actually collected.
        got: usize,
    },

    /// Settings file contents could not be serialized or deserialized.
    #[error("Settings file error: {0}")]
    Settings(#[from] serde_json::Error),
}
