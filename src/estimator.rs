//! Error estimation from a probe grid.
//!
//! Two interchangeable strategies produce the [`ErrorVector`] the
//! correction law consumes: [`four_point_errors`] compares the tower and
//! center samples directly, while [`SurfaceEstimator`] reads tilt and bowl
//! metrics off the full-bed surface model. Both reference the tallest
//! tower so corrections only ever lower endstops.

use std::fmt;

use log::info;

use crate::error::CalResult;
use crate::grid::{Layout, ProbeGrid, FOUR_POINT, FULL_BED};
use crate::stats::round4;
use crate::surface::{InterpMethod, SurfaceMetrics, SurfaceModel, TowerLayout};

/// Tower axis identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X tower.
    X,
    /// Y tower.
    Y,
    /// Z tower.
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
            Self::Z => write!(f, "Z"),
        }
    }
}

/// Signed deviation of each tower and the bed center, in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorVector {
    /// X tower deviation from the reference.
    pub x: f64,
    /// Y tower deviation from the reference.
    pub y: f64,
    /// Z tower deviation from the reference.
    pub z: f64,
    /// Center deviation, positive when the center sits high.
    pub center: f64,
}

impl ErrorVector {
    /// Magnitude of the worst component.
    pub fn largest_magnitude(&self) -> f64 {
        [self.x, self.y, self.z, self.center]
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}

/// Which layout is probed and how errors are derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StrategyKind {
    /// Probe the three towers and the center, compare them directly.
    FourPoint,
    /// Survey the whole bed and read errors off the surface model.
    #[default]
    FullBed,
}

impl StrategyKind {
    /// Probe layout this strategy drives.
    pub fn layout(self) -> &'static Layout {
        match self {
            Self::FourPoint => &FOUR_POINT,
            Self::FullBed => &FULL_BED,
        }
    }
}

/// Direct estimation over the four-point grid.
///
/// Each tower is measured against the tallest tower average, the center
/// against the mean of the three towers.
pub fn four_point_errors(grid: &ProbeGrid) -> CalResult<ErrorVector> {
    grid.require_len(FOUR_POINT.points.len())?;
    // Layout order: Z tower, X tower, Y tower, center.
    let samples = grid.samples();
    let z_avg = samples[0].z_avg();
    let x_avg = samples[1].z_avg();
    let y_avg = samples[2].z_avg();
    let c_avg = samples[3].z_avg();

    let reference = z_avg.max(x_avg).max(y_avg);
    Ok(ErrorVector {
        x: round4(x_avg - reference),
        y: round4(y_avg - reference),
        z: round4(z_avg - reference),
        center: round4(c_avg - (z_avg + x_avg + y_avg) / 3.0),
    })
}

/// Full-bed estimation against a latched reference tower.
///
/// The strictly-tallest tower of the first pass is held as the reference
/// for the whole session; without a strict winner the Z tower is used.
#[derive(Debug)]
pub struct SurfaceEstimator {
    method: InterpMethod,
    towers: TowerLayout,
    reference: Option<Axis>,
}

impl SurfaceEstimator {
    /// Estimator with no reference latched yet.
    pub fn new(method: InterpMethod, towers: TowerLayout) -> Self {
        Self {
            method,
            towers,
            reference: None,
        }
    }

    /// Reference tower for corrections and reports; Z until latched.
    pub fn reference_tower(&self) -> Axis {
        self.reference.unwrap_or(Axis::Z)
    }

    /// Derive the error vector for one full-bed pass.
    pub fn estimate(&mut self, grid: &ProbeGrid) -> CalResult<ErrorVector> {
        grid.require_len(FULL_BED.points.len())?;
        let model = SurfaceModel::build(grid, self.method);
        let metrics = model.metrics(self.towers);

        if self.reference.is_none() {
            let latched = tallest_tower(&metrics).unwrap_or(Axis::Z);
            info!("Reference tower: {latched}");
            self.reference = Some(latched);
        }
        let reference_tilt = match self.reference_tower() {
            Axis::X => metrics.tilt_x,
            Axis::Y => metrics.tilt_y,
            Axis::Z => metrics.tilt_z,
        };

        Ok(ErrorVector {
            x: round4(metrics.tilt_x - reference_tilt),
            y: round4(metrics.tilt_y - reference_tilt),
            z: round4(metrics.tilt_z - reference_tilt),
            center: round4(metrics.bowl_center - metrics.bowl_outer),
        })
    }
}

/// Strictly-tallest tower by single-point height, if any.
fn tallest_tower(metrics: &SurfaceMetrics) -> Option<Axis> {
    if metrics.height_x > metrics.height_y && metrics.height_x > metrics.height_z {
        Some(Axis::X)
    } else if metrics.height_y > metrics.height_x && metrics.height_y > metrics.height_z {
        Some(Axis::Y)
    } else if metrics.height_z > metrics.height_x && metrics.height_z > metrics.height_y {
        Some(Axis::Z)
    } else {
        None
    }
}
