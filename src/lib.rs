//! Closed-loop bed calibration for Monoprice Mini Delta printers.
//!
//! The library drives a delta printer over its serial console: it probes
//! the bed at fixed locations, estimates the per-axis geometric error,
//! writes corrected endstop and delta parameters back, and repeats until
//! the error falls inside tolerance or a budget runs out. The binary in
//! `main.rs` is a thin wrapper over [`session::Session`].

pub mod correction;
pub mod error;
pub mod estimator;
pub mod grid;
pub mod probe;
pub mod report;
pub mod session;
pub mod settings;
pub mod stats;
pub mod surface;
pub mod transport;
