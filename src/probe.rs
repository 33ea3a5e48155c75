//! G-code vocabulary and response parsing for the printer.
//!
//! [`Printer`] wraps a [`Transport`] with the small set of commands the
//! calibration loop needs: geometry writes (`M666`, `M665`, `M92`), homing
//! and moves, bed heating, probing, and the EEPROM dump/store pair. The two
//! supported firmware dialects differ only in how a probe pass is driven;
//! that choreography lives in the grid builder, which calls the primitives
//! defined here.

use log::{debug, warn};
use prse::try_parse;

use crate::error::{CalError, CalResult};
use crate::transport::Transport;

/// Marker every probe measurement line carries.
pub const BED_MARKER: &str = "Bed ";

/// Banner the stock firmware emits when a `G29` pattern starts.
pub const LEVELING_BANNER: &str = "G29 Auto Bed Leveling";

/// Acknowledgement the firmware emits after `M500` finishes.
const SETTINGS_STORED: &str = "Settings Stored";

/// G-code conversational style of the installed firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FirmwareDialect {
    /// Stock Monoprice firmware: one `G29 Pn V4` streams a whole pattern.
    #[default]
    Stock,
    /// Marlin: explicit moves with two `G30` probes per location.
    Marlin,
}

impl FirmwareDialect {
    /// Dialect encoded as the numeric flag the settings file uses.
    pub fn from_flag(flag: u8) -> Self {
        if flag == 1 {
            Self::Marlin
        } else {
            Self::Stock
        }
    }

    /// Numeric flag for the settings file.
    pub fn flag(self) -> u8 {
        match self {
            Self::Stock => 0,
            Self::Marlin => 1,
        }
    }
}

/// One probe touch reported by the printer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Reported probe X coordinate.
    pub x: f64,
    /// Reported probe Y coordinate.
    pub y: f64,
    /// Reported bed height at the probe point.
    pub z: f64,
}

/// Geometry values recovered from an `M503 S0` settings dump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EepromGeometry {
    /// X endstop adjustment from the `M666` line.
    pub x: f64,
    /// Y endstop adjustment from the `M666` line.
    pub y: f64,
    /// Z endstop adjustment from the `M666` line.
    pub z: f64,
    /// Delta radius from the `M665` line.
    pub r: f64,
}

/// Parse one measurement line.
///
/// The line may carry chatter before the marker; fields after it must
/// follow the `Bed X: <x> Y: <y> Z: <z>` shape. Tokens after the Z value
/// are ignored.
pub fn parse_measurement(line: &str) -> CalResult<Measurement> {
    let start = line
        .find(BED_MARKER)
        .ok_or_else(|| CalError::MalformedResponse(line.to_string()))?;
    let fields = line[start..].trim();
    let (x, y, z_field): (f64, f64, &str) = try_parse!(fields, "Bed X: {} Y: {} Z: {}")
        .map_err(|_| CalError::MalformedResponse(line.to_string()))?;
    let z = z_field
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| CalError::MalformedResponse(line.to_string()))?;
    Ok(Measurement { x, y, z })
}

/// First `<letter><number>` field of a G-code style line, if present.
fn axis_field(line: &str, letter: char) -> Option<f64> {
    line.split_whitespace()
        .find_map(|token| token.strip_prefix(letter).and_then(|v| v.parse().ok()))
}

/// Command-level view of the printer over a transport.
pub struct Printer<T> {
    transport: T,
    dialect: FirmwareDialect,
}

impl<T: Transport> Printer<T> {
    /// Wrap `transport` for a printer speaking `dialect`.
    pub fn new(transport: T, dialect: FirmwareDialect) -> Self {
        Self { transport, dialect }
    }

    /// Dialect this printer speaks.
    pub fn dialect(&self) -> FirmwareDialect {
        self.dialect
    }

    /// Shared access to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Home all axes. The firmware's homing chatter is left in the buffer;
    /// it falls out in the next measurement scan.
    pub fn home(&mut self) -> CalResult<()> {
        self.transport.send_command("G28")
    }

    /// Raise the effector clear of the bed before probing moves.
    pub fn raise_to_safe_height(&mut self) -> CalResult<()> {
        self.transport.send_command("G1 Z15 F6000")
    }

    /// Move the effector over a probe location.
    pub fn move_to(&mut self, x: f64, y: f64) -> CalResult<()> {
        self.transport.send_command(&format!("G1 X{x} Y{y}"))
    }

    /// Set identical steps/mm on all three axes.
    pub fn set_axis_steps(&mut self, steps_mm: f64) -> CalResult<()> {
        self.transport
            .send_command(&format!("M92 X{steps_mm} Y{steps_mm} Z{steps_mm}"))?;
        self.read_ack()
    }

    /// Write the per-tower endstop adjustments.
    pub fn set_endstop_adjustments(&mut self, x: f64, y: f64, z: f64) -> CalResult<()> {
        self.transport
            .send_command(&format!("M666 X{x} Y{y} Z{z}"))?;
        self.read_ack()
    }

    /// Write delta geometry. Either field may be omitted.
    pub fn set_delta_config(&mut self, l: Option<f64>, r: Option<f64>) -> CalResult<()> {
        let mut command = String::from("M665");
        if let Some(l) = l {
            command.push_str(&format!(" L{l}"));
        }
        if let Some(r) = r {
            command.push_str(&format!(" R{r}"));
        }
        self.transport.send_command(&command)?;
        self.read_ack()
    }

    /// Set the bed temperature target. `wait_ack` consumes the firmware's
    /// acknowledgement line; pass `false` to fire and forget mid-pass.
    pub fn set_bed_temperature(&mut self, temp: i32, wait_ack: bool) -> CalResult<()> {
        self.transport.send_command(&format!("M140 S{temp}"))?;
        if wait_ack {
            self.read_ack()?;
        }
        Ok(())
    }

    /// Zero the home offsets (Marlin only).
    pub fn clear_home_offsets(&mut self) -> CalResult<()> {
        self.transport.send_command("M206 X0 Y0 Z0")?;
        self.read_ack()
    }

    /// Discard any stored bed mesh (Marlin only).
    pub fn clear_mesh(&mut self) -> CalResult<()> {
        self.transport.send_command("M421 C")?;
        self.read_ack()
    }

    /// Start a stock-firmware leveling pattern and wait for its banner.
    pub fn begin_auto_leveling(&mut self, program: u8) -> CalResult<()> {
        self.transport
            .send_command(&format!("G29 P{program} V4"))?;
        loop {
            let line = self.transport.read_line()?;
            if line.contains(LEVELING_BANNER) {
                return Ok(());
            }
            debug!("Waiting for leveling banner, got: {line}");
        }
    }

    /// Probe the bed once at the current position (Marlin).
    pub fn probe_point(&mut self) -> CalResult<Measurement> {
        self.transport.send_command("G30")?;
        self.read_measurement()
    }

    /// Scan response lines until the next valid measurement.
    ///
    /// Chatter without the marker is skipped; marked lines that do not
    /// parse are logged and skipped. Only a transport fault ends the scan.
    pub fn read_measurement(&mut self) -> CalResult<Measurement> {
        loop {
            let line = self.transport.read_line()?;
            if !line.contains(BED_MARKER) {
                if !line.trim().is_empty() {
                    debug!("Skipping printer chatter: {line}");
                }
                continue;
            }
            match parse_measurement(&line) {
                Ok(measurement) => return Ok(measurement),
                Err(err) => warn!("Skipping malformed probe response: {err}"),
            }
        }
    }

    /// Read and discard `count` response lines.
    pub fn drain_lines(&mut self, count: usize) -> CalResult<()> {
        for _ in 0..count {
            let line = self.transport.read_line()?;
            debug!("Draining: {line}");
        }
        Ok(())
    }

    /// Recover endstop and radius values from the firmware's settings dump.
    pub fn read_eeprom_geometry(&mut self) -> CalResult<EepromGeometry> {
        self.transport.send_command("M503 S0")?;
        let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
        loop {
            let line = self.transport.read_line()?;
            if line.trim().is_empty() || line.contains("echo:") {
                continue;
            }
            if line.contains("M666") {
                let malformed = || CalError::MalformedResponse(line.clone());
                x = axis_field(&line, 'X').ok_or_else(malformed)?;
                y = axis_field(&line, 'Y').ok_or_else(malformed)?;
                z = axis_field(&line, 'Z').ok_or_else(malformed)?;
            } else if line.contains("M665") {
                // The M665 line closes the dump
                let r = axis_field(&line, 'R')
                    .ok_or_else(|| CalError::MalformedResponse(line.clone()))?;
                return Ok(EepromGeometry { x, y, z, r });
            }
        }
    }

    /// Persist the current geometry to EEPROM and wait for the firmware's
    /// confirmation.
    pub fn store_to_eeprom(&mut self) -> CalResult<()> {
        self.transport.send_command("M500")?;
        loop {
            let line = self.transport.read_line()?;
            if line.contains(SETTINGS_STORED) {
                debug!("EEPROM store confirmed: {line}");
                return Ok(());
            }
        }
    }

    /// Read one acknowledgement line and discard it.
    fn read_ack(&mut self) -> CalResult<()> {
        let line = self.transport.read_line()?;
        debug!("Ack: {line}");
        Ok(())
    }
}
