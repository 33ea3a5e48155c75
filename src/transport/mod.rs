//! Line-oriented transport to the printer.
//!
//! The calibration session talks to the machine through the [`Transport`]
//! trait: bare G-code lines out, response lines back. [`SerialTransport`]
//! is the production implementation over a USB-serial port;
//! [`MockTransport`] replays a canned script for tests.

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

use crate::error::CalResult;

/// Blocking line-oriented channel to the printer.
///
/// An implementation owns the channel exclusively for the life of a
/// calibration session. Lines are exchanged without terminators; the
/// implementation appends and strips them.
pub trait Transport {
    /// Send one command line. Callers pass bare G-code without a terminator.
    fn send_command(&mut self, command: &str) -> CalResult<()>;

    /// Read the next response line, blocking up to the configured deadline.
    /// The returned line has its terminator stripped.
    fn read_line(&mut self) -> CalResult<String>;
}
