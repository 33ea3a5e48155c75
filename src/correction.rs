//! Correction laws that turn an error vector into new geometry.
//!
//! Both laws share the tolerance gate and the run-scheduled tower gain;
//! they differ in how the radius responds to center error and whether the
//! rod length follows it. Updates are rounded to 4 decimals so repeated
//! passes cannot accumulate float noise in the G-code stream.

use crate::estimator::{Axis, ErrorVector};
use crate::stats::round4;

/// Error magnitude below which a component is left alone.
pub const CONVERGENCE_TOLERANCE: f64 = 0.02;

/// Basic-law radius divisor: `r_new = r + center_error / BASIC_RADIUS_DIVISOR`.
const BASIC_RADIUS_DIVISOR: f64 = -0.5;

/// Full-bed radius gain: `r_new = r - SURFACE_RADIUS_GAIN * center_error`.
const SURFACE_RADIUS_GAIN: f64 = 4.0;

/// Rod length change per unit of radius change in the full-bed law.
const ROD_COUPLING: f64 = 1.5;

/// Machine geometry under adjustment plus the session pass counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    /// X endstop adjustment (`M666 X`).
    pub x: f64,
    /// Y endstop adjustment (`M666 Y`).
    pub y: f64,
    /// Z endstop adjustment (`M666 Z`).
    pub z: f64,
    /// Delta radius (`M665 R`).
    pub r: f64,
    /// Diagonal rod length (`M665 L`).
    pub l: f64,
    /// Probe passes started this session.
    pub run_count: u32,
}

/// One correction step: the next geometry and whether the pass converged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Geometry to apply before the next pass.
    pub state: CalibrationState,
    /// True when every error component was inside tolerance.
    pub calibrated: bool,
}

/// Mapping from an error vector onto geometry updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionLaw {
    /// Four-point law: independent endstop nudges and the divisor radius
    /// gain. `normalize` shifts all three endstops after a correcting
    /// pass so their minimum returns to zero.
    Basic {
        /// Re-zero the endstop minimum after each correcting pass.
        normalize: bool,
    },
    /// Full-bed law: the reference tower is pinned to zero, the radius
    /// gain is steeper, and the rod length follows the radius.
    Surface {
        /// Tower held at zero for the whole session.
        reference: Axis,
    },
}

impl CorrectionLaw {
    /// Apply the law to one pass.
    ///
    /// Tower gain is full for the first half of the run budget and halves
    /// after, damping oscillation near convergence. A state whose errors
    /// are all inside tolerance comes back untouched.
    pub fn apply(
        &self,
        errors: &ErrorVector,
        state: &CalibrationState,
        max_runs: u32,
    ) -> Correction {
        let out_of_tolerance = |e: f64| e.abs() >= CONVERGENCE_TOLERANCE;
        if !out_of_tolerance(errors.x)
            && !out_of_tolerance(errors.y)
            && !out_of_tolerance(errors.z)
            && !out_of_tolerance(errors.center)
        {
            return Correction {
                state: *state,
                calibrated: true,
            };
        }

        let half_gain = 2 * state.run_count >= max_runs;
        let nudge = |error: f64, current: f64| {
            let scaled = if half_gain { error / 2.0 } else { error };
            round4(scaled + current)
        };

        let mut next = *state;
        if out_of_tolerance(errors.x) {
            next.x = match self {
                Self::Surface {
                    reference: Axis::X,
                } => 0.0,
                _ => nudge(errors.x, state.x),
            };
        }
        if out_of_tolerance(errors.y) {
            next.y = match self {
                Self::Surface {
                    reference: Axis::Y,
                } => 0.0,
                _ => nudge(errors.y, state.y),
            };
        }
        if out_of_tolerance(errors.z) {
            next.z = match self {
                Self::Surface {
                    reference: Axis::Z,
                } => 0.0,
                _ => nudge(errors.z, state.z),
            };
        }
        if out_of_tolerance(errors.center) {
            next.r = match self {
                Self::Basic { .. } => round4(state.r + errors.center / BASIC_RADIUS_DIVISOR),
                Self::Surface { .. } => round4(state.r - SURFACE_RADIUS_GAIN * errors.center),
            };
        }

        match self {
            Self::Surface { .. } => {
                next.l = round4(state.l + ROD_COUPLING * (next.r - state.r));
            }
            Self::Basic { normalize: true } => {
                let low = next.x.min(next.y).min(next.z);
                next.x = round4(next.x - low);
                next.y = round4(next.y - low);
                next.z = round4(next.z - low);
            }
            Self::Basic { normalize: false } => {}
        }

        Correction {
            state: next,
            calibrated: false,
        }
    }
}
