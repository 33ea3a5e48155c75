//! Probe layouts and bed-grid acquisition.
//!
//! A [`Layout`] is a fixed, ordered list of probe coordinates. The grid
//! builder walks it through the [`Printer`], pairing two taps per location,
//! and returns a [`ProbeGrid`] of averaged samples. Coordinates always come
//! from the layout; the firmware's echoed coordinates are ignored.

use log::debug;

use crate::error::{CalError, CalResult};
use crate::probe::{FirmwareDialect, Printer};
use crate::stats::{median, round3};
use crate::transport::Transport;

/// Fixed probe pattern for one strategy.
#[derive(Debug)]
pub struct Layout {
    /// `G29` program number the stock firmware runs for this pattern.
    pub program: u8,
    /// Probe coordinates in acquisition order.
    pub points: &'static [(f64, f64)],
    /// Summary lines the stock firmware appends after the pattern.
    pub trailing_lines: usize,
}

/// Tower-and-center pattern: Z tower, X tower, Y tower, bed center.
pub const FOUR_POINT: Layout = Layout {
    program: 2,
    points: &[(0.0, 50.0), (-43.3, -25.0), (43.3, -25.0), (0.0, 0.0)],
    trailing_lines: 0,
};

/// 21-point serpentine survey of the printable area, row by row from the
/// front of the bed to the back.
pub const FULL_BED: Layout = Layout {
    program: 5,
    points: &[
        (-25.0, -50.0),
        (0.0, -50.0),
        (25.0, -50.0),
        (50.0, -25.0),
        (25.0, -25.0),
        (0.0, -25.0),
        (-25.0, -25.0),
        (-50.0, -25.0),
        (-50.0, 0.0),
        (-25.0, 0.0),
        (0.0, 0.0),
        (25.0, 0.0),
        (50.0, 0.0),
        (50.0, 25.0),
        (25.0, 25.0),
        (0.0, 25.0),
        (-25.0, 25.0),
        (-50.0, 25.0),
        (-25.0, 50.0),
        (0.0, 50.0),
        (25.0, 50.0),
    ],
    trailing_lines: 6,
};

/// Two probe taps averaged at one layout location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Layout X coordinate.
    pub x: f64,
    /// Layout Y coordinate.
    pub y: f64,
    /// Height from the first tap.
    pub z1: f64,
    /// Height from the second tap.
    pub z2: f64,
}

impl Sample {
    /// Tap average at probe precision.
    pub fn z_avg(&self) -> f64 {
        round3((self.z1 + self.z2) / 2.0)
    }

    /// Spread between the two taps, a per-location probe repeatability
    /// figure.
    pub fn tap_diff(&self) -> f64 {
        self.z2 - self.z1
    }
}

/// One complete probe pass over a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeGrid {
    samples: Vec<Sample>,
}

impl ProbeGrid {
    /// Grid from already-collected samples.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Drive one probe pass over `layout` and collect its samples.
    ///
    /// Stock firmware streams the whole pattern after a single `G29`;
    /// Marlin needs an explicit move and two `G30` probes per location.
    pub fn acquire<T: Transport>(printer: &mut Printer<T>, layout: &Layout) -> CalResult<Self> {
        printer.home()?;
        match printer.dialect() {
            FirmwareDialect::Stock => printer.begin_auto_leveling(layout.program)?,
            FirmwareDialect::Marlin => printer.raise_to_safe_height()?,
        }

        let mut samples = Vec::with_capacity(layout.points.len());
        for &(x, y) in layout.points {
            let (first, second) = match printer.dialect() {
                FirmwareDialect::Stock => {
                    (printer.read_measurement()?, printer.read_measurement()?)
                }
                FirmwareDialect::Marlin => {
                    printer.move_to(x, y)?;
                    (printer.probe_point()?, printer.probe_point()?)
                }
            };
            let sample = Sample {
                x,
                y,
                z1: first.z,
                z2: second.z,
            };
            debug!(
                "Probe ({x}, {y}): z1={} z2={} avg={} spread={}",
                sample.z1,
                sample.z2,
                sample.z_avg(),
                sample.tap_diff()
            );
            samples.push(sample);
        }

        if printer.dialect() == FirmwareDialect::Stock {
            printer.drain_lines(layout.trailing_lines)?;
        }
        Ok(Self { samples })
    }

    /// Samples in layout order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples collected.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the grid holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Median of the tap averages, the per-pass reference plane.
    pub fn median_z(&self) -> f64 {
        let averages: Vec<f64> = self.samples.iter().map(Sample::z_avg).collect();
        median(&averages)
    }

    /// Signed deviation of every sample from the grid median, in layout
    /// order.
    pub fn deviations(&self) -> Vec<f64> {
        let reference = self.median_z();
        self.samples
            .iter()
            .map(|s| s.z_avg() - reference)
            .collect()
    }

    /// Error if the grid does not match the expected layout size.
    pub fn require_len(&self, expected: usize) -> CalResult<()> {
        if self.samples.len() == expected {
            Ok(())
        } else {
            Err(CalError::MalformedGrid {
                expected,
                got: self.samples.len(),
            })
        }
    }
}
