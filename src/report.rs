//! Per-pass report files in the bed-leveling spreadsheet import format.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::correction::CalibrationState;
use crate::error::CalResult;
use crate::estimator::Axis;
use crate::grid::ProbeGrid;

/// Fixed console-log prefix; the spreadsheet importer keys on it.
const LOG_PREFIX: &str = "< 01:02:03 PM: ";

/// Write the report for one full-bed pass into `dir` and return its path.
///
/// Pass numbering starts at 0. The file carries the geometry in effect
/// during the pass, the session's reference tower, and every raw tap in
/// CRLF-terminated console-log form.
pub fn write_pass_report(
    dir: &Path,
    pass: u32,
    state: &CalibrationState,
    reference: Axis,
    grid: &ProbeGrid,
) -> CalResult<PathBuf> {
    let path = dir.join(format!("auto_cal_p5_pass{pass}.txt"));
    let mut out = String::new();

    out.push_str(&format!(
        "M666 X{:.2} Y{:.2} Z{:.2}\r\n",
        state.x, state.y, state.z
    ));
    out.push_str(&format!("M665 L{:.4} R{:.4}\r\n", state.l, state.r));
    out.push_str("\r\n");
    out.push_str(&format!("Highest Tower: {reference}\r\n"));
    out.push_str("\r\n\r\n");
    out.push_str(&format!("{LOG_PREFIX}G29 Auto Bed Leveling\r\n"));
    for sample in grid.samples() {
        for z in [sample.z1, sample.z2] {
            out.push_str(&format!(
                "{LOG_PREFIX}Bed X: {:.3} Y: {:.3} Z: {:.3}\r\n",
                sample.x, sample.y, z
            ));
        }
    }

    fs::write(&path, &out)?;
    debug!("Wrote pass report {}", path.display());
    Ok(path)
}
