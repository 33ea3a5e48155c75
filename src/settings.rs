//! Command-line arguments, the persisted settings file, and the merged
//! session configuration.
//!
//! Geometry evolves across sessions, so the tool can carry it in a small
//! JSON file: the file is read leniently at startup (any key may be
//! absent, a corrupt file falls back to the command line) and rewritten
//! wholesale when a session converges.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::correction::CalibrationState;
use crate::error::CalResult;
use crate::estimator::StrategyKind;
use crate::probe::FirmwareDialect;
use crate::surface::{InterpMethod, TowerLayout};

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "deltacal")]
#[command(about = "Closed-loop delta printer bed calibration")]
#[command(version)]
pub struct Cli {
    /// Serial port of the printer
    #[arg(short, long)]
    pub port: String,

    /// Starting X endstop adjustment
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub x0: f64,

    /// Starting Y endstop adjustment
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub y0: f64,

    /// Starting Z endstop adjustment
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub z0: f64,

    /// Starting delta radius
    #[arg(short, long, default_value_t = 63.5)]
    pub r_value: f64,

    /// Starting diagonal rod length
    #[arg(short, long, default_value_t = 123.0)]
    pub l_value: f64,

    /// Steps per millimeter for all three axes
    #[arg(short, long, default_value_t = 57.14)]
    pub step_mm: f64,

    /// Largest error tolerated on any pass after the first
    #[arg(long, default_value_t = 1.0)]
    pub max_error: f64,

    /// Maximum calibration passes before giving up
    #[arg(long, default_value_t = 14)]
    pub max_runs: u32,

    /// Bed temperature in Celsius, held for the whole session
    #[arg(long)]
    pub bed_temp: Option<i32>,

    /// Firmware dialect the printer speaks
    #[arg(long, value_enum, default_value = "stock")]
    pub firmware: FirmwareDialect,

    /// Tower layout flag (0 = X opposite LCD, 1 = Y, 2 = Z)
    #[arg(long, default_value_t = 0)]
    pub tower: u8,

    /// Interpolation method flag (0 = plain, 1 = densified)
    #[arg(long, default_value_t = 0)]
    pub minterp: u8,

    /// Probe pattern and error derivation
    #[arg(long, value_enum, default_value = "full-bed")]
    pub strategy: StrategyKind,

    /// Re-zero the endstop minimum after each correcting pass
    #[arg(long)]
    pub normalize: bool,

    /// Read starting geometry from printer EEPROM instead of arguments
    #[arg(long)]
    pub load_eeprom: bool,

    /// Store the final geometry to printer EEPROM on convergence
    #[arg(long)]
    pub write_eeprom: bool,

    /// Settings file, read at startup and rewritten on convergence
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory for per-pass report files
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,
}

/// On-disk settings. Every key is optional so files written by older
/// runs, or by hand, keep loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedSettings {
    /// X endstop adjustment.
    pub x: Option<f64>,
    /// Y endstop adjustment.
    pub y: Option<f64>,
    /// Z endstop adjustment.
    pub z: Option<f64>,
    /// Delta radius.
    pub r: Option<f64>,
    /// Diagonal rod length.
    pub l: Option<f64>,
    /// Steps per millimeter for all three axes.
    pub step: Option<f64>,
    /// Calibration pass budget.
    pub max_runs: Option<u32>,
    /// Anomaly bound on per-pass error.
    pub max_error: Option<f64>,
    /// Target bed temperature; negative means no heating.
    pub bed_temp: Option<i32>,
    /// Firmware dialect flag (0 = stock, 1 = Marlin).
    #[serde(rename = "firmFlag")]
    pub firm_flag: Option<u8>,
    /// Interpolation method flag (0 = plain, 1 = densified).
    pub minterp: Option<u8>,
    /// Tower layout flag (0 = X opposite LCD, 1 = Y, 2 = Z).
    pub tower_flag: Option<u8>,
}

impl SavedSettings {
    /// Read and parse a settings file.
    pub fn load(path: &Path) -> CalResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Fully resolved session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial port of the printer.
    pub port: String,
    /// Starting geometry.
    pub state: CalibrationState,
    /// Steps per millimeter for all three axes.
    pub step_mm: f64,
    /// Maximum calibration passes.
    pub max_runs: u32,
    /// Largest error tolerated on any pass after the first.
    pub max_error: f64,
    /// Bed temperature to hold, if any.
    pub bed_temp: Option<i32>,
    /// Firmware dialect.
    pub dialect: FirmwareDialect,
    /// Physical tower arrangement.
    pub towers: TowerLayout,
    /// Surface interpolation method.
    pub interp: InterpMethod,
    /// Probe pattern and error derivation.
    pub strategy: StrategyKind,
    /// Re-zero the endstop minimum after each correcting pass.
    pub normalize: bool,
    /// Read starting geometry from printer EEPROM.
    pub load_eeprom: bool,
    /// Store final geometry to printer EEPROM on convergence.
    pub write_eeprom: bool,
    /// Settings file to rewrite on convergence.
    pub settings_path: Option<PathBuf>,
    /// Directory for per-pass report files.
    pub report_dir: PathBuf,
}

impl Config {
    /// Merge the command line with the optional settings file.
    ///
    /// A key present in the file wins over the corresponding argument; a
    /// missing or unreadable file leaves the arguments in force.
    pub fn resolve(cli: Cli) -> Self {
        let file = match &cli.file {
            Some(path) => match SavedSettings::load(path) {
                Ok(saved) => saved,
                Err(err) => {
                    warn!("Ignoring settings file {}: {err}", path.display());
                    SavedSettings::default()
                }
            },
            None => SavedSettings::default(),
        };

        let state = CalibrationState {
            x: file.x.unwrap_or(cli.x0),
            y: file.y.unwrap_or(cli.y0),
            z: file.z.unwrap_or(cli.z0),
            r: file.r.unwrap_or(cli.r_value),
            l: file.l.unwrap_or(cli.l_value),
            run_count: 0,
        };

        // The file keeps the traditional -1 "no heating" sentinel.
        let bed_temp = file
            .bed_temp
            .or(cli.bed_temp)
            .filter(|temp| *temp >= 0);

        Config {
            port: cli.port,
            state,
            step_mm: file.step.unwrap_or(cli.step_mm),
            max_runs: file.max_runs.unwrap_or(cli.max_runs),
            max_error: file.max_error.unwrap_or(cli.max_error),
            bed_temp,
            dialect: file
                .firm_flag
                .map(FirmwareDialect::from_flag)
                .unwrap_or(cli.firmware),
            towers: file
                .tower_flag
                .map(TowerLayout::from_flag)
                .unwrap_or_else(|| TowerLayout::from_flag(cli.tower)),
            interp: file
                .minterp
                .map(InterpMethod::from_flag)
                .unwrap_or_else(|| InterpMethod::from_flag(cli.minterp)),
            strategy: cli.strategy,
            normalize: cli.normalize,
            load_eeprom: cli.load_eeprom,
            write_eeprom: cli.write_eeprom,
            settings_path: cli.file,
            report_dir: cli.report_dir,
        }
    }

    /// Write the converged geometry and session parameters back to `path`.
    pub fn save(&self, path: &Path, state: &CalibrationState) -> CalResult<()> {
        let saved = SavedSettings {
            x: Some(state.x),
            y: Some(state.y),
            z: Some(state.z),
            r: Some(state.r),
            l: Some(state.l),
            step: Some(self.step_mm),
            max_runs: Some(self.max_runs),
            max_error: Some(self.max_error),
            bed_temp: Some(self.bed_temp.unwrap_or(-1)),
            firm_flag: Some(self.dialect.flag()),
            minterp: Some(self.interp.flag()),
            tower_flag: Some(self.towers.flag()),
        };
        let text = serde_json::to_string(&saved)?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["deltacal", "-p", "/dev/ttyACM0"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::resolve(cli(&[]));
        assert_eq!(config.state.r, 63.5);
        assert_eq!(config.state.l, 123.0);
        assert_eq!(config.step_mm, 57.14);
        assert_eq!(config.max_runs, 14);
        assert_eq!(config.max_error, 1.0);
        assert_eq!(config.bed_temp, None);
        assert_eq!(config.dialect, FirmwareDialect::Stock);
        assert_eq!(config.strategy, StrategyKind::FullBed);
        assert!(!config.normalize);
    }

    #[test]
    fn test_file_keys_win_per_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"r": 63.42, "firmFlag": 1}}"#).unwrap();

        let path = file.path().to_str().unwrap().to_owned();
        let config = Config::resolve(cli(&["-r", "60.0", "-l", "124.0", "-f", &path]));

        assert_eq!(config.state.r, 63.42);
        assert_eq!(config.dialect, FirmwareDialect::Marlin);
        // Keys absent from the file fall back to the command line.
        assert_eq!(config.state.l, 124.0);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let path = file.path().to_str().unwrap().to_owned();
        let config = Config::resolve(cli(&["-r", "60.0", "-f", &path]));

        assert_eq!(config.state.r, 60.0);
    }

    #[test]
    fn test_bed_temp_sentinel() {
        let mut cold = tempfile::NamedTempFile::new().unwrap();
        write!(cold, r#"{{"bed_temp": -1}}"#).unwrap();
        let path = cold.path().to_str().unwrap().to_owned();
        let config = Config::resolve(cli(&["--bed-temp", "60", "-f", &path]));
        assert_eq!(config.bed_temp, None);

        let config = Config::resolve(cli(&["--bed-temp", "60"]));
        assert_eq!(config.bed_temp, Some(60));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let config = Config::resolve(cli(&["--bed-temp", "60", "--tower", "1"]));
        let state = CalibrationState {
            x: -0.9,
            y: 0.0,
            z: -0.45,
            r: 63.42,
            l: 122.88,
            run_count: 3,
        };
        config.save(&path, &state).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"firmFlag\":0"));

        let saved = SavedSettings::load(&path).unwrap();
        assert_eq!(saved.x, Some(-0.9));
        assert_eq!(saved.r, Some(63.42));
        assert_eq!(saved.bed_temp, Some(60));
        assert_eq!(saved.tower_flag, Some(1));
    }
}
