//! Command-line entry point for the calibration tool.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use deltacal::session::{Outcome, Session};
use deltacal::settings::{Cli, Config};
use deltacal::transport::SerialTransport;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::resolve(Cli::parse());

    let transport = SerialTransport::open(&config.port)
        .with_context(|| format!("Failed to open serial port {}", config.port))?;

    let mut session = Session::new(transport, &config);
    session.initialize().context("Printer setup failed")?;

    info!("Starting calibration");
    match session.run()? {
        Outcome::Converged(state) => {
            if let Some(path) = &config.settings_path {
                config
                    .save(path, &state)
                    .with_context(|| format!("Failed to update {}", path.display()))?;
                info!("Updated settings file {}", path.display());
            }
            Ok(())
        }
        Outcome::MaxRunsExceeded { max_runs } => {
            bail!("Too many calibration attempts: no convergence after {max_runs} runs")
        }
        Outcome::ErrorLimitExceeded {
            magnitude,
            limit,
            run,
        } => {
            bail!(
                "Calibration error {magnitude} on run {run} exceeds the {limit} limit; \
                 check the probe and bed before retrying"
            )
        }
    }
}
