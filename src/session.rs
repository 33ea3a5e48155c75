//! The calibration session state machine.
//!
//! One session owns the printer channel for its whole lifetime and walks
//! probing, evaluation, and adjustment phases until the correction law
//! reports convergence or a budget trips. Budget exhaustion and the
//! anomaly limit are ordinary outcomes here, not errors; only transport
//! and protocol faults abort through `CalResult`.

use log::info;

use crate::correction::{CalibrationState, Correction, CorrectionLaw};
use crate::error::CalResult;
use crate::estimator::{four_point_errors, ErrorVector, StrategyKind, SurfaceEstimator};
use crate::grid::ProbeGrid;
use crate::probe::{FirmwareDialect, Printer};
use crate::report;
use crate::settings::Config;
use crate::surface::{InterpMethod, TowerLayout};
use crate::transport::Transport;

/// Terminal result of a calibration session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Every error component fell inside tolerance.
    Converged(CalibrationState),
    /// The pass budget ran out before convergence.
    MaxRunsExceeded {
        /// The exhausted budget.
        max_runs: u32,
    },
    /// An error on a pass after the first exceeded the anomaly limit,
    /// which points at a probe or hardware fault rather than ordinary
    /// miscalibration.
    ErrorLimitExceeded {
        /// Largest error component observed.
        magnitude: f64,
        /// The configured limit it exceeded.
        limit: f64,
        /// Pass on which the anomaly appeared.
        run: u32,
    },
}

enum Phase {
    Probing,
    Evaluating { grid: ProbeGrid },
    Adjusting { correction: Correction },
}

/// One closed-loop calibration session against one printer.
pub struct Session<'a, T> {
    printer: Printer<T>,
    config: &'a Config,
    state: CalibrationState,
    surface: Option<SurfaceEstimator>,
}

impl<'a, T: Transport> Session<'a, T> {
    /// Session over `transport`, starting from the configured geometry.
    pub fn new(transport: T, config: &'a Config) -> Self {
        let surface = match config.strategy {
            StrategyKind::FullBed => Some(SurfaceEstimator::new(config.interp, config.towers)),
            StrategyKind::FourPoint => None,
        };
        Session {
            printer: Printer::new(transport, config.dialect),
            config,
            state: config.state,
            surface,
        }
    }

    /// Geometry currently applied to the printer.
    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Shared access to the printer and its transport.
    pub fn printer(&self) -> &Printer<T> {
        &self.printer
    }

    /// Put the printer into a known state before the first pass.
    pub fn initialize(&mut self) -> CalResult<()> {
        match self.config.dialect {
            FirmwareDialect::Stock => info!("Using stock firmware"),
            FirmwareDialect::Marlin => info!("Using Marlin firmware"),
        }
        match self.config.towers {
            TowerLayout::XOpposite => info!("Tower setup: X opposite the LCD"),
            TowerLayout::YOpposite => info!("Tower setup: Y opposite the LCD"),
            TowerLayout::ZOpposite => info!("Tower setup: Z opposite the LCD"),
        }
        if self.config.strategy == StrategyKind::FullBed {
            match self.config.interp {
                InterpMethod::Plain => info!("Interpolation: plain triangulated surface"),
                InterpMethod::Densified => {
                    info!("Interpolation: densified grid with blended corners");
                }
            }
        }

        if self.config.load_eeprom {
            let geometry = self.printer.read_eeprom_geometry()?;
            info!(
                "Starting from EEPROM geometry X{} Y{} Z{} R{}",
                geometry.x, geometry.y, geometry.z, geometry.r
            );
            self.state.x = geometry.x;
            self.state.y = geometry.y;
            self.state.z = geometry.z;
            self.state.r = geometry.r;
        }

        if let Some(temp) = self.config.bed_temp {
            info!("Setting bed temperature to {temp} C");
            self.printer.set_bed_temperature(temp, true)?;
        }

        info!("Setting steps/mm to {}", self.config.step_mm);
        self.printer.set_axis_steps(self.config.step_mm)?;
        self.printer.set_delta_config(Some(self.state.l), None)?;

        if self.config.dialect == FirmwareDialect::Marlin {
            self.printer.clear_home_offsets()?;
            self.printer.clear_mesh()?;
        }

        self.apply_geometry()
    }

    /// Drive the loop to a terminal outcome.
    pub fn run(&mut self) -> CalResult<Outcome> {
        let max_runs = self.config.max_runs;
        let mut phase = Phase::Probing;
        loop {
            phase = match phase {
                Phase::Probing => {
                    self.state.run_count += 1;
                    if self.state.run_count > max_runs {
                        return Ok(Outcome::MaxRunsExceeded { max_runs });
                    }
                    info!(
                        "Calibration pass {}, run {} of {}",
                        self.state.run_count - 1,
                        self.state.run_count,
                        max_runs
                    );
                    // Keep the bed from cooling between passes.
                    if let Some(temp) = self.config.bed_temp {
                        self.printer.set_bed_temperature(temp, false)?;
                    }
                    let grid =
                        ProbeGrid::acquire(&mut self.printer, self.config.strategy.layout())?;
                    Phase::Evaluating { grid }
                }
                Phase::Evaluating { grid } => {
                    let errors = self.estimate(&grid)?;
                    if let Some(estimator) = &self.surface {
                        let pass = self.state.run_count - 1;
                        report::write_pass_report(
                            &self.config.report_dir,
                            pass,
                            &self.state,
                            estimator.reference_tower(),
                            &grid,
                        )?;
                    }
                    info!(
                        "Z-Error: {}  X-Error: {}  Y-Error: {}  C-Error: {}",
                        errors.z, errors.x, errors.y, errors.center
                    );

                    let magnitude = errors.largest_magnitude();
                    if self.state.run_count > 1 && magnitude > self.config.max_error {
                        return Ok(Outcome::ErrorLimitExceeded {
                            magnitude,
                            limit: self.config.max_error,
                            run: self.state.run_count,
                        });
                    }

                    let law = match &self.surface {
                        Some(estimator) => CorrectionLaw::Surface {
                            reference: estimator.reference_tower(),
                        },
                        None => CorrectionLaw::Basic {
                            normalize: self.config.normalize,
                        },
                    };
                    let correction = law.apply(&errors, &self.state, max_runs);
                    if correction.calibrated {
                        return self.finish(correction.state);
                    }
                    Phase::Adjusting { correction }
                }
                Phase::Adjusting { correction } => {
                    self.state = correction.state;
                    self.apply_geometry()?;
                    Phase::Probing
                }
            };
        }
    }

    fn estimate(&mut self, grid: &ProbeGrid) -> CalResult<ErrorVector> {
        match &mut self.surface {
            Some(estimator) => estimator.estimate(grid),
            None => four_point_errors(grid),
        }
    }

    /// Send the current geometry to the printer.
    ///
    /// The rod length only participates in the full-bed law, so the
    /// four-point strategy updates the radius alone.
    fn apply_geometry(&mut self) -> CalResult<()> {
        let state = self.state;
        info!(
            "Setting M666 X{} Y{} Z{}, M665 L{} R{}",
            state.x, state.y, state.z, state.l, state.r
        );
        self.printer
            .set_endstop_adjustments(state.x, state.y, state.z)?;
        let rod = match self.config.strategy {
            StrategyKind::FullBed => Some(state.l),
            StrategyKind::FourPoint => None,
        };
        self.printer.set_delta_config(rod, Some(state.r))
    }

    fn finish(&mut self, state: CalibrationState) -> CalResult<Outcome> {
        self.state = state;
        info!("Calibration complete");
        info!(
            "Final values: M666 X{} Y{} Z{}, M665 L{} R{}",
            state.x, state.y, state.z, state.l, state.r
        );
        if self.config.write_eeprom {
            self.printer.store_to_eeprom()?;
            info!("Stored geometry to printer EEPROM");
        }
        if self.config.dialect == FirmwareDialect::Marlin {
            info!("Run mesh bed leveling before printing: G29");
        }
        Ok(Outcome::Converged(state))
    }
}
